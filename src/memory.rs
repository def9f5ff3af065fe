use crate::constants::FRESH_BLOCK_FILL;
use crate::error::{BlockCacheError, Result};

/// Handle of a RAM buffer inside [`BlockBuffers`]
pub type BufferId = usize;

/// Arena of fixed-size RAM buffers backing resident blocks.
///
/// Buffers are addressed by [`BufferId`] and never move or shrink, so an id
/// stored in the block index stays valid until [`BlockBuffers::clear`]. One
/// extra spare buffer sits outside the budget and turns an eviction into an
/// id swap.
#[derive(Debug, Default)]
pub struct BlockBuffers {
    buffers: Vec<Box<[u8]>>,
    inactive: Vec<BufferId>,
    spare: Option<BufferId>,
    block_size: usize,
    max_buffers: usize,
}

impl BlockBuffers {
    /// Create an empty arena; no memory is reserved until buffers are requested
    pub fn new(block_size: usize, max_buffers: usize) -> Self {
        BlockBuffers {
            buffers: Vec::new(),
            inactive: Vec::new(),
            spare: None,
            block_size,
            max_buffers,
        }
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Buffers counted against the budget (active + inactive)
    pub fn pooled_count(&self) -> usize {
        self.buffers.len() - usize::from(self.spare.is_some())
    }

    pub fn active_count(&self) -> usize {
        self.pooled_count() - self.inactive.len()
    }

    /// Hand out a buffer for a newly resident block.
    ///
    /// Inactive buffers are reused first; a new one is allocated only while the
    /// budget allows it. `Ok(None)` means the caller has to evict.
    pub fn acquire(&mut self) -> Result<Option<BufferId>> {
        if let Some(id) = self.inactive.pop() {
            return Ok(Some(id));
        }
        if self.pooled_count() >= self.max_buffers {
            return Ok(None);
        }
        self.allocate().map(Some)
    }

    /// Put a buffer back into the inactive list
    pub fn release(&mut self, id: BufferId) {
        debug_assert!(Some(id) != self.spare);
        debug_assert!(!self.inactive.contains(&id));
        self.inactive.push(id);
    }

    /// Allocate the spare buffer if it does not exist yet
    pub fn ensure_spare(&mut self) -> Result<BufferId> {
        match self.spare {
            Some(id) => Ok(id),
            None => {
                let id = self.allocate()?;
                self.spare = Some(id);
                Ok(id)
            }
        }
    }

    pub fn spare(&self) -> Option<BufferId> {
        self.spare
    }

    /// Make `victim` the new spare and return the previous spare.
    ///
    /// The caller must already have loaded the incoming block into the
    /// previous spare and flushed `victim` to disk.
    pub fn swap_spare(&mut self, victim: BufferId) -> Result<BufferId> {
        let previous = self.ensure_spare()?;
        self.spare = Some(victim);
        Ok(previous)
    }

    #[inline]
    pub fn buffer(&self, id: BufferId) -> &[u8] {
        &self.buffers[id]
    }

    #[inline]
    pub fn buffer_mut(&mut self, id: BufferId) -> &mut [u8] {
        &mut self.buffers[id]
    }

    /// Drop every buffer
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.inactive.clear();
        self.spare = None;
    }

    fn allocate(&mut self) -> Result<BufferId> {
        let mut data: Vec<u8> = reserve_vec(self.block_size, "block buffer")?;
        data.resize(self.block_size, FRESH_BLOCK_FILL);

        self.buffers.try_reserve(1).map_err(|e| {
            BlockCacheError::Allocation(format!("cannot grow buffer table: {}", e))
        })?;
        self.buffers.push(data.into_boxed_slice());
        Ok(self.buffers.len() - 1)
    }
}

/// Empty vector with room for exactly `len` items, or `Allocation` instead of
/// aborting when the memory is not there.
pub(crate) fn reserve_vec<T>(len: usize, what: &str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|e| {
        BlockCacheError::Allocation(format!("cannot reserve {} {}: {}", len, what, e))
    })?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_respects_budget() {
        let mut bufs = BlockBuffers::new(16, 2);

        let a = bufs.acquire().unwrap().unwrap();
        let b = bufs.acquire().unwrap().unwrap();
        assert_ne!(a, b);
        assert_eq!(bufs.active_count(), 2);

        // Budget used up, caller must evict
        assert!(bufs.acquire().unwrap().is_none());
    }

    #[test]
    fn test_new_buffers_are_zeroed() {
        let mut bufs = BlockBuffers::new(32, 1);
        let id = bufs.acquire().unwrap().unwrap();
        assert_eq!(bufs.buffer(id).len(), 32);
        assert!(bufs.buffer(id).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_release_then_acquire_reuses_buffer() {
        let mut bufs = BlockBuffers::new(8, 1);
        let id = bufs.acquire().unwrap().unwrap();
        bufs.buffer_mut(id)[0] = 42;

        bufs.release(id);
        assert_eq!(bufs.active_count(), 0);
        assert_eq!(bufs.pooled_count(), 1);

        let again = bufs.acquire().unwrap().unwrap();
        assert_eq!(again, id);
        assert_eq!(bufs.buffer(again)[0], 42);
    }

    #[test]
    fn test_spare_is_outside_budget() {
        let mut bufs = BlockBuffers::new(8, 1);
        let spare = bufs.ensure_spare().unwrap();
        assert_eq!(bufs.pooled_count(), 0);

        // Calling twice keeps the same spare
        assert_eq!(bufs.ensure_spare().unwrap(), spare);

        let id = bufs.acquire().unwrap().unwrap();
        assert_ne!(id, spare);
        assert_eq!(bufs.active_count(), 1);
    }

    #[test]
    fn test_swap_spare_exchanges_ids() {
        let mut bufs = BlockBuffers::new(4, 1);
        let spare = bufs.ensure_spare().unwrap();
        let victim = bufs.acquire().unwrap().unwrap();

        bufs.buffer_mut(spare).copy_from_slice(&[7, 7, 7, 7]);
        let incoming = bufs.swap_spare(victim).unwrap();

        assert_eq!(incoming, spare);
        assert_eq!(bufs.spare(), Some(victim));
        assert_eq!(bufs.buffer(incoming), &[7, 7, 7, 7]);
        assert_eq!(bufs.active_count(), 1);
    }

    #[test]
    fn test_reserve_vec_reports_overflow() {
        let ok: Vec<u64> = reserve_vec(16, "words").unwrap();
        assert!(ok.capacity() >= 16);

        let err = reserve_vec::<u64>(usize::MAX, "words").unwrap_err();
        assert!(matches!(err, BlockCacheError::Allocation(_)));
    }

    #[test]
    fn test_clear() {
        let mut bufs = BlockBuffers::new(4, 3);
        bufs.ensure_spare().unwrap();
        bufs.acquire().unwrap();
        bufs.clear();
        assert_eq!(bufs.pooled_count(), 0);
        assert_eq!(bufs.spare(), None);
    }
}
