//! Eviction order of resident blocks (strict FIFO, hits do not reorder)

use std::collections::VecDeque;

use crate::index::BlockIndex3D;

#[derive(Debug, Clone, Default)]
pub struct SwapFifo {
    queue: VecDeque<BlockIndex3D>,
}

impl SwapFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Record a newly resident block as the youngest entry
    pub fn push(&mut self, coord: BlockIndex3D) {
        self.queue.push_back(coord);
    }

    /// Next eviction victim without removing it
    pub fn peek_victim(&self) -> Option<BlockIndex3D> {
        self.queue.front().copied()
    }

    /// Replace the oldest entry with `incoming` and return the evicted coordinate.
    ///
    /// Equivalent to advancing the round-robin cursor over a fixed ring.
    pub fn rotate(&mut self, incoming: BlockIndex3D) -> Option<BlockIndex3D> {
        let victim = self.queue.pop_front()?;
        self.queue.push_back(incoming);
        Some(victim)
    }

    /// Move every row of `band` down by `by`
    pub fn shift_rows(&mut self, band: usize, by: usize) {
        for c in self.queue.iter_mut().filter(|c| c.band == band) {
            c.row += by;
        }
    }

    /// Move every column of `band` right by `by`
    pub fn shift_cols(&mut self, band: usize, by: usize) {
        for c in self.queue.iter_mut().filter(|c| c.band == band) {
            c.col += by;
        }
    }

    /// Move every band index up by `by`
    pub fn shift_bands(&mut self, by: usize) {
        for c in self.queue.iter_mut() {
            c.band += by;
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
