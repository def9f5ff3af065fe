//! Expansible band blocks manager.
//!
//! Holds at most `max_ram_blocks` blocks in RAM and keeps the rest in anonymous
//! scratch files. Blocks are evicted in strict FIFO order. The grid can grow at
//! any edge of a band, or gain whole bands, without disturbing cached data.
//!
//! Not thread-safe: callers sharing a manager must wrap it in their own lock.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::config::ManagerConfig;
use crate::disk::{DiskSlot, DiskSlotAllocator};
use crate::error::{BlockCacheError, Result};
use crate::fifo::SwapFifo;
use crate::index::{BandEdge, BlockIndex3D, BlockIndexSpace, Cell, Edge};
use crate::memory::BlockBuffers;

/// Access counters since the last `initialize`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served straight from RAM
    pub hits: u64,
    /// Requests that had to read from disk
    pub misses: u64,
    /// Misses served by a buffer that was still free in the budget
    pub activations: u64,
    /// Misses that pushed another block out to disk
    pub evictions: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} activations={} evictions={}",
            self.hits, self.misses, self.activations, self.evictions
        )
    }
}

#[derive(Default)]
pub struct BlockManager {
    state: Option<CacheState>,
}

struct CacheState {
    index: BlockIndexSpace,
    fifo: SwapFifo,
    buffers: BlockBuffers,
    disk: DiskSlotAllocator,
    max_ram_blocks: usize,
    stats: CacheStats,
}

impl BlockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manager and initialize it in one step
    pub fn with_config(config: &ManagerConfig) -> Result<Self> {
        let mut manager = Self::new();
        manager.initialize(config)?;
        Ok(manager)
    }

    /// Set up the cache for the given band layout.
    ///
    /// Any previous state is discarded first. The first `max_ram_blocks`
    /// coordinates (band, then row, then column order) start resident and
    /// zero-filled; all others get a disk slot. On error the manager is left
    /// empty and no scratch file survives.
    pub fn initialize(&mut self, config: &ManagerConfig) -> Result<()> {
        self.free();

        let block_size = config.validate()?;
        let total = config.total_blocks();
        let resident = config.max_ram_blocks.min(total);

        let mut buffers = BlockBuffers::new(block_size, config.max_ram_blocks);
        let mut resident_ids = Vec::with_capacity(resident);
        for _ in 0..resident {
            let id = buffers.acquire()?.ok_or_else(|| {
                BlockCacheError::Allocation("RAM block budget smaller than expected".into())
            })?;
            resident_ids.push(id);
        }
        buffers.ensure_spare()?;

        let mut disk = DiskSlotAllocator::new(block_size, config.max_disk_file_size)?;
        let slots = disk.allocate(total - resident)?;

        let shapes: Vec<(usize, usize)> = config
            .bands
            .iter()
            .map(|b| (b.blocks_y, b.blocks_x))
            .collect();
        let cells = resident_ids
            .into_iter()
            .map(Cell::Resident)
            .chain(slots.into_iter().map(Cell::OnDisk));
        let index = BlockIndexSpace::new(&shapes, cells);

        let mut fifo = SwapFifo::new();
        for coord in coords_in_order(&shapes).take(resident) {
            fifo.push(coord);
        }
        debug_assert_eq!(index.resident_count(), fifo.len());

        debug!(
            bands = shapes.len(),
            total_blocks = total,
            resident_blocks = resident,
            block_size,
            scratch_files = disk.file_count(),
            "Block manager initialized"
        );

        self.state = Some(CacheState {
            index,
            fifo,
            buffers,
            disk,
            max_ram_blocks: config.max_ram_blocks,
            stats: CacheStats::default(),
        });
        Ok(())
    }

    /// Same as [`initialize`](Self::initialize) but from parallel per-band vectors
    pub fn initialize_with_vectors(
        &mut self,
        max_ram_blocks: usize,
        blocks_x: &[usize],
        blocks_y: &[usize],
        block_sizes: &[usize],
        max_disk_file_size: u64,
    ) -> Result<()> {
        self.free();
        let config = ManagerConfig::from_vectors(
            max_ram_blocks,
            blocks_x,
            blocks_y,
            block_sizes,
            max_disk_file_size,
        )?;
        self.initialize(&config)
    }

    /// Release every RAM buffer and scratch file. Safe to call repeatedly.
    pub fn free(&mut self) {
        if let Some(mut state) = self.state.take() {
            debug!(
                scratch_files = state.disk.file_count(),
                stats = %state.stats,
                "Block manager freed"
            );
            state.clear();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Mutable access to the bytes of block `(band, row, col)`.
    ///
    /// The slice is always `max_block_size_bytes()` long. A miss reads the
    /// block from its scratch file and may push the oldest resident block out
    /// to disk. Fresh blocks hold whatever the disk slot held; callers
    /// initialize them. An `Io` error leaves the manager unusable until it is
    /// re-initialized.
    pub fn get_block_pointer(&mut self, band: usize, row: usize, col: usize) -> Result<&mut [u8]> {
        self.state_mut()?.get_block(BlockIndex3D::new(band, row, col))
    }

    /// Insert `expansion_size` rows above `band`; existing rows shift down
    pub fn add_top_blocks(&mut self, expansion_size: usize, band: usize) -> Result<Vec<BlockIndex3D>> {
        self.state_mut()?.grow(band, Edge::Top, expansion_size)
    }

    /// Append `expansion_size` rows below `band`
    pub fn add_bottom_blocks(&mut self, expansion_size: usize, band: usize) -> Result<Vec<BlockIndex3D>> {
        self.state_mut()?.grow(band, Edge::Bottom, expansion_size)
    }

    /// Insert `expansion_size` columns left of `band`; existing columns shift right
    pub fn add_left_blocks(&mut self, expansion_size: usize, band: usize) -> Result<Vec<BlockIndex3D>> {
        self.state_mut()?.grow(band, Edge::Left, expansion_size)
    }

    /// Append `expansion_size` columns right of `band`
    pub fn add_right_blocks(&mut self, expansion_size: usize, band: usize) -> Result<Vec<BlockIndex3D>> {
        self.state_mut()?.grow(band, Edge::Right, expansion_size)
    }

    /// Insert `expansion_size` bands before band 0; existing bands shift up
    pub fn add_top_bands(&mut self, expansion_size: usize) -> Result<Vec<BlockIndex3D>> {
        self.state_mut()?.add_bands(BandEdge::Top, expansion_size)
    }

    /// Append `expansion_size` bands after the last one
    pub fn add_bottom_bands(&mut self, expansion_size: usize) -> Result<Vec<BlockIndex3D>> {
        self.state_mut()?.add_bands(BandEdge::Bottom, expansion_size)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn band_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.index.band_count())
    }

    pub fn blocks_x(&self, band: usize) -> Option<usize> {
        self.state.as_ref()?.index.shape(band).map(|(_, cols)| cols)
    }

    pub fn blocks_y(&self, band: usize) -> Option<usize> {
        self.state.as_ref()?.index.shape(band).map(|(rows, _)| rows)
    }

    pub fn max_block_size_bytes(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.buffers.block_size())
    }

    pub fn max_ram_blocks(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.max_ram_blocks)
    }

    pub fn is_resident(&self, band: usize, row: usize, col: usize) -> Result<bool> {
        let cell = self.state_ref()?.index.get(BlockIndex3D::new(band, row, col))?;
        Ok(matches!(cell, Cell::Resident(_)))
    }

    pub fn resident_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.fifo.len())
    }

    /// Coordinate the next eviction will push to disk
    pub fn next_victim(&self) -> Option<BlockIndex3D> {
        self.state.as_ref()?.fifo.peek_victim()
    }

    pub fn disk_file_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.disk.file_count())
    }

    /// Disk slots recycled by activations and not yet reused by growth
    pub fn free_disk_slot_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.disk.free_count())
    }

    pub fn stats(&self) -> CacheStats {
        self.state.as_ref().map(|s| s.stats).unwrap_or_default()
    }

    fn state_ref(&self) -> Result<&CacheState> {
        self.state.as_ref().ok_or(BlockCacheError::NotInitialized)
    }

    fn state_mut(&mut self) -> Result<&mut CacheState> {
        self.state.as_mut().ok_or(BlockCacheError::NotInitialized)
    }
}

impl Drop for BlockManager {
    fn drop(&mut self) {
        self.free();
    }
}

impl CacheState {
    fn get_block(&mut self, coord: BlockIndex3D) -> Result<&mut [u8]> {
        let slot = match self.index.get(coord)? {
            Cell::Resident(id) => {
                self.stats.hits += 1;
                trace!(%coord, "Block cache hit");
                return Ok(self.buffers.buffer_mut(id));
            }
            Cell::OnDisk(slot) => slot,
        };
        self.stats.misses += 1;

        if let Some(id) = self.buffers.acquire()? {
            // Budget not used up yet: load into a free buffer, nothing to evict
            if let Err(e) = self.disk.read_slot(slot, self.buffers.buffer_mut(id)) {
                self.buffers.release(id);
                return Err(e);
            }
            self.index.set_resident(coord, id)?;
            self.fifo.push(coord);
            self.disk.recycle(slot);
            self.stats.activations += 1;
            trace!(%coord, buffer = id, "Block activated");
            return Ok(self.buffers.buffer_mut(id));
        }

        let victim = self
            .fifo
            .peek_victim()
            .ok_or_else(|| inconsistent("eviction queue is empty"))?;
        let victim_id = match self.index.get(victim)? {
            Cell::Resident(id) => id,
            Cell::OnDisk(_) => return Err(inconsistent("eviction victim is not resident")),
        };

        // Incoming block goes into the spare, the victim takes over its slot
        let spare = self.buffers.ensure_spare()?;
        self.disk.read_slot(slot, self.buffers.buffer_mut(spare))?;
        self.disk.write_slot(slot, self.buffers.buffer(victim_id))?;

        self.index.set_not_resident(victim, slot)?;
        let incoming = self.buffers.swap_spare(victim_id)?;
        self.index.set_resident(coord, incoming)?;
        self.fifo.rotate(coord);
        self.stats.evictions += 1;
        trace!(%coord, %victim, "Block swapped in");

        Ok(self.buffers.buffer_mut(incoming))
    }

    fn grow(&mut self, band: usize, edge: Edge, n: usize) -> Result<Vec<BlockIndex3D>> {
        let count = self.index.grow_band_len(band, edge, n)?;
        if n == 0 {
            return Ok(Vec::new());
        }

        // Slots first: a failure here leaves the grid untouched
        let mut slots = self.disk.take(count).inspect_err(|e| {
            warn!(band, ?edge, n, error = %e, "Band growth rolled back");
        })?;
        let added = match self.index.grow_band(band, edge, n, &mut slots) {
            Ok(added) => added,
            Err(e) => {
                warn!(band, ?edge, n, error = %e, "Band growth rolled back");
                self.return_slots(slots);
                return Err(e);
            }
        };

        match edge {
            Edge::Top => self.fifo.shift_rows(band, n),
            Edge::Left => self.fifo.shift_cols(band, n),
            Edge::Bottom | Edge::Right => {}
        }
        self.check_invariants();

        debug!(
            band,
            ?edge,
            n,
            added = added.len(),
            total_blocks = self.index.total_blocks(),
            "Band grown"
        );
        Ok(added)
    }

    fn add_bands(&mut self, edge: BandEdge, n: usize) -> Result<Vec<BlockIndex3D>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let count = self.index.add_bands_len(edge, n)?;

        let mut slots = self.disk.take(count).inspect_err(|e| {
            warn!(?edge, n, error = %e, "Band addition rolled back");
        })?;
        let added = match self.index.add_bands(edge, n, &mut slots) {
            Ok(added) => added,
            Err(e) => {
                warn!(?edge, n, error = %e, "Band addition rolled back");
                self.return_slots(slots);
                return Err(e);
            }
        };

        if edge == BandEdge::Top {
            self.fifo.shift_bands(n);
        }
        self.check_invariants();

        debug!(
            ?edge,
            n,
            bands = self.index.band_count(),
            total_blocks = self.index.total_blocks(),
            "Bands added"
        );
        Ok(added)
    }

    /// Hand back slots taken for a growth that did not happen
    fn return_slots(&mut self, slots: Vec<DiskSlot>) {
        for slot in slots.into_iter().rev() {
            self.disk.recycle(slot);
        }
    }

    /// Cross-check the index, FIFO and buffer pool; debug builds only
    fn check_invariants(&self) {
        debug_assert_eq!(self.index.resident_count(), self.fifo.len());
        debug_assert_eq!(self.buffers.active_count(), self.fifo.len());
        debug_assert!(self.fifo.len() <= self.max_ram_blocks);
        debug_assert!(self.buffers.spare().is_some());
        debug_assert!(!self.fifo.is_empty() || self.index.total_blocks() == 0);
    }

    fn clear(&mut self) {
        self.fifo.clear();
        self.index.clear();
        self.buffers.clear();
        self.disk.clear();
    }
}

/// Every coordinate of the given `(rows, cols)` shapes in band/row/col order
fn coords_in_order(shapes: &[(usize, usize)]) -> impl Iterator<Item = BlockIndex3D> + '_ {
    shapes.iter().enumerate().flat_map(|(band, &(rows, cols))| {
        (0..rows).flat_map(move |row| (0..cols).map(move |col| BlockIndex3D::new(band, row, col)))
    })
}

fn inconsistent(msg: &str) -> BlockCacheError {
    BlockCacheError::io(
        "index",
        std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string()),
    )
}
