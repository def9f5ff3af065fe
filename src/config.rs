use crate::constants::DEFAULT_MAX_DISK_FILE_SIZE;
use crate::error::{BlockCacheError, Result};

/// Grid shape and block size of one band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLayout {
    pub blocks_x: usize,
    pub blocks_y: usize,
    pub block_size_bytes: usize,
}

impl BandLayout {
    pub fn new(blocks_x: usize, blocks_y: usize, block_size_bytes: usize) -> Self {
        BandLayout { blocks_x, blocks_y, block_size_bytes }
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks_x * self.blocks_y
    }
}

/// Everything `BlockManager::initialize` needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub max_ram_blocks: usize,
    pub bands: Vec<BandLayout>,
    pub max_disk_file_size: u64,
}

impl ManagerConfig {
    pub fn new(max_ram_blocks: usize, bands: Vec<BandLayout>) -> Self {
        ManagerConfig {
            max_ram_blocks,
            bands,
            max_disk_file_size: DEFAULT_MAX_DISK_FILE_SIZE,
        }
    }

    pub fn with_max_disk_file_size(mut self, size: u64) -> Self {
        self.max_disk_file_size = size;
        self
    }

    /// Build from parallel per-band vectors; lengths must agree.
    pub fn from_vectors(
        max_ram_blocks: usize,
        blocks_x: &[usize],
        blocks_y: &[usize],
        block_sizes: &[usize],
        max_disk_file_size: u64,
    ) -> Result<Self> {
        if blocks_x.len() != blocks_y.len() || blocks_y.len() != block_sizes.len() {
            return Err(BlockCacheError::Config(format!(
                "per-band vectors differ in length ({}, {}, {})",
                blocks_x.len(),
                blocks_y.len(),
                block_sizes.len()
            )));
        }
        let bands = blocks_x
            .iter()
            .zip(blocks_y)
            .zip(block_sizes)
            .map(|((&x, &y), &size)| BandLayout::new(x, y, size))
            .collect();
        Ok(ManagerConfig { max_ram_blocks, bands, max_disk_file_size })
    }

    /// Check every constraint and return the uniform block slot size
    /// (the largest per-band block size).
    pub fn validate(&self) -> Result<usize> {
        if self.bands.is_empty() {
            return Err(BlockCacheError::Config("at least one band is required".into()));
        }
        if self.max_ram_blocks == 0 {
            return Err(BlockCacheError::Config("max RAM blocks must be non-zero".into()));
        }

        let mut max_block_size = 0;
        for (band, layout) in self.bands.iter().enumerate() {
            if layout.block_size_bytes == 0 {
                return Err(BlockCacheError::Config(format!("band {} has zero block size", band)));
            }
            if layout.blocks_x == 0 || layout.blocks_y == 0 {
                return Err(BlockCacheError::Config(format!(
                    "band {} has an empty {}x{} grid",
                    band, layout.blocks_x, layout.blocks_y
                )));
            }
            if layout.block_size_bytes as u64 > self.max_disk_file_size {
                return Err(BlockCacheError::Config(format!(
                    "band {} block size {} exceeds max disk file size {}",
                    band, layout.block_size_bytes, self.max_disk_file_size
                )));
            }
            max_block_size = max_block_size.max(layout.block_size_bytes);
        }

        Ok(max_block_size)
    }

    pub fn total_blocks(&self) -> usize {
        self.bands.iter().map(BandLayout::block_count).sum()
    }
}

/// How many blocks of `block_size` fit in a RAM budget of `budget_bytes`,
/// keeping one block aside for the spare buffer. Never less than one.
pub fn max_ram_blocks_for_budget(budget_bytes: u64, block_size: usize) -> usize {
    if block_size == 0 {
        return 1;
    }
    let blocks = budget_bytes / block_size as u64;
    usize::try_from(blocks.saturating_sub(1))
        .unwrap_or(usize::MAX)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(x: usize, y: usize, size: usize) -> ManagerConfig {
        ManagerConfig::new(4, vec![BandLayout::new(x, y, size)])
    }

    #[test]
    fn test_validate_returns_max_block_size() {
        let config = ManagerConfig::new(
            2,
            vec![BandLayout::new(2, 2, 100), BandLayout::new(1, 3, 300)],
        );
        assert_eq!(config.validate().unwrap(), 300);
        assert_eq!(config.total_blocks(), 7);
    }

    #[test]
    fn test_validate_rejects_empty_bands() {
        let config = ManagerConfig::new(2, Vec::new());
        assert!(matches!(config.validate(), Err(BlockCacheError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(single(2, 2, 0).validate().is_err());
        assert!(single(0, 2, 10).validate().is_err());
        assert!(single(2, 0, 10).validate().is_err());

        let mut config = single(2, 2, 10);
        config.max_ram_blocks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_block_larger_than_file() {
        let config = single(2, 2, 1000).with_max_disk_file_size(999);
        assert!(config.validate().is_err());

        let config = single(2, 2, 1000).with_max_disk_file_size(1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vectors() {
        let config = ManagerConfig::from_vectors(3, &[2, 4], &[2, 1], &[10, 20], 500).unwrap();
        assert_eq!(config.bands[1], BandLayout::new(4, 1, 20));
        assert_eq!(config.max_disk_file_size, 500);
    }

    #[test]
    fn test_from_vectors_mismatched_lengths() {
        assert!(ManagerConfig::from_vectors(3, &[2, 4], &[2], &[10, 20], 500).is_err());
        assert!(ManagerConfig::from_vectors(3, &[2], &[2], &[10, 20], 500).is_err());
    }

    #[test]
    fn test_ram_budget() {
        // 10 blocks of 100 bytes, one kept for the spare
        assert_eq!(max_ram_blocks_for_budget(1000, 100), 9);
        assert_eq!(max_ram_blocks_for_budget(50, 100), 1);
        assert_eq!(max_ram_blocks_for_budget(1000, 0), 1);
    }
}
