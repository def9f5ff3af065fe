//! Scratch disk storage for evicted blocks.
//!
//! Every scratch file is a flat run of `block_size` slots with no header: slot `i`
//! lives at byte offset `i * block_size`. Files come from `tempfile::tempfile()`,
//! so the OS removes them once the handle is dropped.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use tracing::trace;

use crate::constants::FILE_EXTEND_BYTE;
use crate::error::{BlockCacheError, Result};
use crate::memory::reserve_vec;

/// Location of one block-sized region inside a scratch file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiskSlot {
    /// Index of the owning file inside the allocator
    pub file: usize,
    /// Byte offset of the slot within that file
    pub offset: u64,
}

/// Creates scratch files and hands out fixed-size slots inside them
#[derive(Debug)]
pub struct DiskSlotAllocator {
    files: Vec<File>,
    free_slots: Vec<DiskSlot>,
    block_size: usize,
    max_file_size: u64,
}

impl DiskSlotAllocator {
    /// Create an allocator without any files yet.
    ///
    /// `block_size` must be non-zero and no larger than `max_file_size`.
    pub fn new(block_size: usize, max_file_size: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(BlockCacheError::Config("block size must be non-zero".into()));
        }
        if block_size as u64 > max_file_size {
            return Err(BlockCacheError::Config(format!(
                "block size {} exceeds max disk file size {}",
                block_size, max_file_size
            )));
        }
        Ok(DiskSlotAllocator {
            files: Vec::new(),
            free_slots: Vec::new(),
            block_size,
            max_file_size,
        })
    }

    #[inline]
    pub fn blocks_per_file(&self) -> usize {
        usize::try_from(self.max_file_size / self.block_size as u64).unwrap_or(usize::MAX)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Allocate `n` slots in brand-new scratch files.
    ///
    /// Files created during a failed call are closed (and thereby deleted) before
    /// the error is returned.
    pub fn allocate(&mut self, n: usize) -> Result<Vec<DiskSlot>> {
        let per_file = self.blocks_per_file();
        let mut new_files = Vec::new();
        let mut slots = reserve_vec(n, "disk slots")?;
        let mut remaining = n;

        while remaining > 0 {
            let file_blocks = per_file.min(remaining);
            let file_size = file_blocks as u64 * self.block_size as u64;
            let file = create_scratch_file(file_size)?;
            let file_id = self.files.len() + new_files.len();
            new_files.push(file);

            for block in 0..file_blocks {
                slots.push(DiskSlot {
                    file: file_id,
                    offset: block as u64 * self.block_size as u64,
                });
            }
            remaining -= file_blocks;
        }

        trace!(slots = n, files = new_files.len(), "Allocated disk slots");
        self.files.extend(new_files);
        Ok(slots)
    }

    /// Take `n` slots, reusing recycled ones before creating new files.
    ///
    /// On failure the recycled slots taken by this call are returned to the free list.
    pub fn take(&mut self, n: usize) -> Result<Vec<DiskSlot>> {
        let reused = n.min(self.free_slots.len());
        let mut slots = self.free_slots.split_off(self.free_slots.len() - reused);
        slots.reverse();

        match self.allocate(n - reused) {
            Ok(fresh) => {
                slots.extend(fresh);
                Ok(slots)
            }
            Err(e) => {
                slots.reverse();
                self.free_slots.extend(slots);
                Err(e)
            }
        }
    }

    /// Return a slot that no coordinate owns anymore
    pub fn recycle(&mut self, slot: DiskSlot) {
        self.free_slots.push(slot);
    }

    /// Read one block from `slot` into `buf`
    pub fn read_slot(&mut self, slot: DiskSlot, buf: &mut [u8]) -> Result<()> {
        let file = self.file_mut(slot)?;
        file.seek(SeekFrom::Start(slot.offset))
            .map_err(|e| BlockCacheError::io("seek", e))?;
        file.read_exact(buf)
            .map_err(|e| BlockCacheError::io("read", e))
    }

    /// Write one block from `buf` into `slot`
    pub fn write_slot(&mut self, slot: DiskSlot, buf: &[u8]) -> Result<()> {
        let file = self.file_mut(slot)?;
        file.seek(SeekFrom::Start(slot.offset))
            .map_err(|e| BlockCacheError::io("seek", e))?;
        file.write_all(buf)
            .map_err(|e| BlockCacheError::io("write", e))
    }

    fn file_mut(&mut self, slot: DiskSlot) -> Result<&mut File> {
        self.files.get_mut(slot.file).ok_or_else(|| {
            BlockCacheError::io(
                "lookup",
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("scratch file {} is not open", slot.file),
                ),
            )
        })
    }

    /// Close every scratch file and forget all slots
    pub fn clear(&mut self) {
        self.files.clear();
        self.free_slots.clear();
    }
}

/// Create an anonymous scratch file pre-extended to `size` bytes
fn create_scratch_file(size: u64) -> Result<File> {
    let mut file = tempfile::tempfile()
        .map_err(|e| BlockCacheError::Allocation(format!("cannot create scratch file: {}", e)))?;

    if size > 0 {
        file.seek(SeekFrom::Start(size - 1))
            .and_then(|_| file.write_all(&[FILE_EXTEND_BYTE]))
            .map_err(|e| {
                BlockCacheError::Allocation(format!(
                    "cannot extend scratch file to {} bytes: {}",
                    size, e
                ))
            })?;
    }

    Ok(file)
}
