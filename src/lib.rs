pub mod config;
pub mod constants;
pub mod disk;
pub mod error;
pub mod fifo;
pub mod index;
pub mod io;
pub mod logging;
pub mod manager;
pub mod memory;

// Re-export commonly used items for convenience
pub use config::{BandLayout, ManagerConfig};
pub use error::{BlockCacheError, Result};
pub use index::BlockIndex3D;
pub use manager::{BlockManager, CacheStats};
