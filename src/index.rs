//! Three-dimensional block index: `(band, row, col)` -> resident buffer or disk slot.
//!
//! Each band keeps a dense row-major cell vector plus its own shape, so growing
//! one band never touches the storage of another.

use std::fmt;

use crate::disk::DiskSlot;
use crate::error::{BlockCacheError, Result};
use crate::memory::{reserve_vec, BufferId};

/// Coordinate of a block in the tiled grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex3D {
    pub band: usize,
    pub row: usize,
    pub col: usize,
}

impl BlockIndex3D {
    pub fn new(band: usize, row: usize, col: usize) -> Self {
        BlockIndex3D { band, row, col }
    }
}

impl fmt::Display for BlockIndex3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(b={}, r={}, c={})", self.band, self.row, self.col)
    }
}

/// Where a block's bytes currently live. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Resident(BufferId),
    OnDisk(DiskSlot),
}

/// Edge of a band where new rows or columns are inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

/// Side of the band stack where new bands are inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone)]
struct BandGrid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

impl BandGrid {
    #[inline]
    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockIndexSpace {
    bands: Vec<BandGrid>,
}

impl BlockIndexSpace {
    /// Build the index from per-band `(rows, cols)` shapes and the cells of
    /// every coordinate in band/row/col order.
    pub fn new(shapes: &[(usize, usize)], cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut cells = cells.into_iter();
        let bands = shapes
            .iter()
            .map(|&(rows, cols)| BandGrid {
                rows,
                cols,
                cells: cells.by_ref().take(rows * cols).collect(),
            })
            .collect();
        BlockIndexSpace { bands }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// `(rows, cols)` of a band
    pub fn shape(&self, band: usize) -> Option<(usize, usize)> {
        self.bands.get(band).map(|g| (g.rows, g.cols))
    }

    pub fn total_blocks(&self) -> usize {
        self.bands.iter().map(|g| g.cells.len()).sum()
    }

    pub fn resident_count(&self) -> usize {
        self.bands
            .iter()
            .flat_map(|g| g.cells.iter())
            .filter(|c| matches!(c, Cell::Resident(_)))
            .count()
    }

    pub fn get(&self, coord: BlockIndex3D) -> Result<Cell> {
        let grid = self.bands.get(coord.band).ok_or(out_of_range(coord))?;
        let off = grid.offset(coord.row, coord.col).ok_or(out_of_range(coord))?;
        Ok(grid.cells[off])
    }

    pub fn set(&mut self, coord: BlockIndex3D, cell: Cell) -> Result<()> {
        let grid = self.bands.get_mut(coord.band).ok_or(out_of_range(coord))?;
        let off = grid.offset(coord.row, coord.col).ok_or(out_of_range(coord))?;
        grid.cells[off] = cell;
        Ok(())
    }

    #[inline]
    pub fn set_resident(&mut self, coord: BlockIndex3D, buffer: BufferId) -> Result<()> {
        self.set(coord, Cell::Resident(buffer))
    }

    #[inline]
    pub fn set_not_resident(&mut self, coord: BlockIndex3D, slot: DiskSlot) -> Result<()> {
        self.set(coord, Cell::OnDisk(slot))
    }

    /// Number of cells `grow_band` will add for `n` rows/cols at `edge`
    pub fn grow_band_len(&self, band: usize, edge: Edge, n: usize) -> Result<usize> {
        let grid = self
            .bands
            .get(band)
            .ok_or(out_of_range(BlockIndex3D::new(band, 0, 0)))?;
        let (along, across) = match edge {
            Edge::Top | Edge::Bottom => (grid.rows, grid.cols),
            Edge::Left | Edge::Right => (grid.cols, grid.rows),
        };
        along
            .checked_add(n)
            .and_then(|_| n.checked_mul(across))
            .filter(|&count| grid.cells.len().checked_add(count).is_some())
            .ok_or_else(|| too_large(n))
    }

    /// Insert `n` rows (Top/Bottom) or columns (Left/Right) into `band`.
    ///
    /// `slots` backs the new coordinates in the returned order, which is
    /// row-major over the inserted region. They are drained only once every
    /// allocation has succeeded; on error the grid and `slots` are untouched.
    /// Existing cells after a Top or Left insertion move by `n` in that axis;
    /// callers holding coordinates must shift them the same way.
    pub fn grow_band(
        &mut self,
        band: usize,
        edge: Edge,
        n: usize,
        slots: &mut Vec<DiskSlot>,
    ) -> Result<Vec<BlockIndex3D>> {
        let expected = self.grow_band_len(band, edge, n)?;
        debug_assert_eq!(slots.len(), expected);

        let grid = &mut self.bands[band];
        let mut added = reserve_vec(expected, "grown coordinates")?;
        let mut cells = reserve_vec(grid.cells.len() + expected, "grown band cells")?;
        let mut fresh = slots.drain(..).map(Cell::OnDisk);

        match edge {
            Edge::Top | Edge::Bottom => {
                let first_row = if edge == Edge::Top { 0 } else { grid.rows };
                for row in first_row..first_row + n {
                    for col in 0..grid.cols {
                        added.push(BlockIndex3D::new(band, row, col));
                    }
                }
                if edge == Edge::Top {
                    cells.extend(fresh);
                    cells.extend_from_slice(&grid.cells);
                } else {
                    cells.extend_from_slice(&grid.cells);
                    cells.extend(fresh);
                }
                grid.rows += n;
            }
            Edge::Left | Edge::Right => {
                let first_col = if edge == Edge::Left { 0 } else { grid.cols };
                for (row, old_row) in grid.cells.chunks(grid.cols.max(1)).enumerate() {
                    if edge == Edge::Right {
                        cells.extend_from_slice(old_row);
                    }
                    cells.extend(fresh.by_ref().take(n));
                    if edge == Edge::Left {
                        cells.extend_from_slice(old_row);
                    }
                    for col in first_col..first_col + n {
                        added.push(BlockIndex3D::new(band, row, col));
                    }
                }
                grid.cols += n;
            }
        }
        grid.cells = cells;

        Ok(added)
    }

    /// Shape new bands inherit: the first band for Top, the last for Bottom
    pub fn template_shape(&self, edge: BandEdge) -> Option<(usize, usize)> {
        let grid = match edge {
            BandEdge::Top => self.bands.first(),
            BandEdge::Bottom => self.bands.last(),
        }?;
        Some((grid.rows, grid.cols))
    }

    /// Number of cells `add_bands` will add for `n` bands at `edge`
    pub fn add_bands_len(&self, edge: BandEdge, n: usize) -> Result<usize> {
        let (rows, cols) = self
            .template_shape(edge)
            .ok_or_else(|| BlockCacheError::Config("no band to copy the shape from".into()))?;
        self.bands
            .len()
            .checked_add(n)
            .and_then(|_| n.checked_mul(rows * cols))
            .ok_or_else(|| too_large(n))
    }

    /// Insert `n` whole bands at `edge`, each shaped like the nearest existing band.
    ///
    /// Same draining rule for `slots` as [`grow_band`](Self::grow_band).
    /// A Top insertion shifts every existing band index by `n`.
    pub fn add_bands(
        &mut self,
        edge: BandEdge,
        n: usize,
        slots: &mut Vec<DiskSlot>,
    ) -> Result<Vec<BlockIndex3D>> {
        let expected = self.add_bands_len(edge, n)?;
        debug_assert_eq!(slots.len(), expected);
        let (rows, cols) = self
            .template_shape(edge)
            .ok_or_else(|| BlockCacheError::Config("no band to copy the shape from".into()))?;
        let per_band = rows * cols;

        let mut added = reserve_vec(expected, "added band coordinates")?;
        let mut bands = reserve_vec(self.bands.len() + n, "band table")?;
        let mut grids = reserve_vec(n, "added bands")?;
        for _ in 0..n {
            grids.push(BandGrid {
                rows,
                cols,
                cells: reserve_vec(per_band, "added band cells")?,
            });
        }

        let first_band = match edge {
            BandEdge::Top => 0,
            BandEdge::Bottom => self.bands.len(),
        };
        let mut fresh = slots.drain(..).map(Cell::OnDisk);
        for (band, grid) in (first_band..).zip(grids.iter_mut()) {
            grid.cells.extend(fresh.by_ref().take(per_band));
            for row in 0..rows {
                for col in 0..cols {
                    added.push(BlockIndex3D::new(band, row, col));
                }
            }
        }

        match edge {
            BandEdge::Top => {
                bands.append(&mut grids);
                bands.append(&mut self.bands);
            }
            BandEdge::Bottom => {
                bands.append(&mut self.bands);
                bands.append(&mut grids);
            }
        }
        self.bands = bands;
        Ok(added)
    }

    pub fn clear(&mut self) {
        self.bands.clear();
    }
}

fn too_large(n: usize) -> BlockCacheError {
    BlockCacheError::Allocation(format!("expansion by {} overflows the grid size", n))
}

#[inline]
fn out_of_range(coord: BlockIndex3D) -> BlockCacheError {
    BlockCacheError::OutOfRange {
        band: coord.band,
        row: coord.row,
        col: coord.col,
    }
}
