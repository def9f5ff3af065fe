//! Error types for the block cache

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockCacheError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Block manager is not initialized")]
    NotInitialized,

    #[error("Block ({band}, {row}, {col}) is outside the current grid")]
    OutOfRange { band: usize, row: usize, col: usize },

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Scratch file {context} error: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl BlockCacheError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        BlockCacheError::Io { context, source }
    }

    /// True for failures that leave the manager unusable until re-initialized
    pub fn is_fatal(&self) -> bool {
        matches!(self, BlockCacheError::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, BlockCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_fatal() {
        let err = BlockCacheError::io("read", std::io::Error::other("boom"));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("read"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_other_errors_are_not_fatal() {
        assert!(!BlockCacheError::Config("empty".into()).is_fatal());
        assert!(!BlockCacheError::NotInitialized.is_fatal());
        assert!(!BlockCacheError::Allocation("oom".into()).is_fatal());

        let err = BlockCacheError::OutOfRange { band: 1, row: 2, col: 3 };
        assert_eq!(err.to_string(), "Block (1, 2, 3) is outside the current grid");
    }
}
