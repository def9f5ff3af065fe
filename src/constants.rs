/// Largest scratch file created by the disk slot allocator unless configured otherwise.
pub const DEFAULT_MAX_DISK_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Byte written at the end of a fresh scratch file to pre-extend it.
pub const FILE_EXTEND_BYTE: u8 = 0;

/// Value resident buffers are filled with at initialization.
pub const FRESH_BLOCK_FILL: u8 = 0;

/// Default log filter for the library when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "raster_block_cache=info,block_cache=info";

/// Log filter used by `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "raster_block_cache=debug,block_cache=debug";
