// Walkability grid for formation pathfinding.
//
// The world plane is XZ; Y is up and never affects cell lookup.
// Cells are created once and only their walkable flag changes afterwards.
// Search bookkeeping (g/h cost, parent) lives on the cells and is reset at
// the start of every search, see `astar::find_path`.

use glam::{UVec2, Vec2, Vec3};
use log::debug;

use super::scene::ObstacleField;
use crate::{NavError, NavResult};

/// (dx, dz) of the eight surrounding cells.
#[rustfmt::skip]
const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1), (0, -1), (1, -1),
    (-1,  0),          (1,  0),
    (-1,  1), (0,  1), (1,  1),
];

// ============================================================================
// CELL
// ============================================================================

/// One grid square.
#[derive(Debug, Clone)]
pub struct Cell {
    /// False once an obstacle body overlaps the cell.
    pub walkable: bool,
    /// Cell centre on the ground plane (y = grid origin y).
    pub world_position: Vec3,
    pub grid_x: u32,
    pub grid_y: u32,

    pub(crate) g_cost: u32,
    pub(crate) h_cost: u32,
    /// Index of the predecessor cell. Only meaningful during or right after a search.
    pub(crate) parent: Option<usize>,
}

impl Cell {
    fn new(walkable: bool, world_position: Vec3, grid_x: u32, grid_y: u32) -> Self {
        Self {
            walkable,
            world_position,
            grid_x,
            grid_y,
            g_cost: u32::MAX,
            h_cost: 0,
            parent: None,
        }
    }

    #[inline]
    pub fn coord(&self) -> UVec2 {
        UVec2::new(self.grid_x, self.grid_y)
    }

    /// Cost from the start of the last search. `u32::MAX` if never reached.
    pub fn g_cost(&self) -> u32 {
        self.g_cost
    }

    pub fn h_cost(&self) -> u32 {
        self.h_cost
    }

    #[inline]
    pub fn f_cost(&self) -> u32 {
        self.g_cost.saturating_add(self.h_cost)
    }
}

// ============================================================================
// GRID MAP
// ============================================================================

/// Row-major grid of cells plus the world <-> cell mapping.
/// Cell (cx, cz) covers [origin + c * cell_size, origin + (c + 1) * cell_size) on X and Z.
pub struct GridMap {
    cells: Vec<Cell>,
    width: u32,
    height: u32,
    cell_size: f32,
    /// Bottom-left corner (min X, min Z) of the grid in world space.
    origin: Vec3,
    /// Incremented whenever a walkable flag changes.
    revision: u64,
}

impl GridMap {
    /// Fully open grid of `width` x `height` cells whose bottom-left corner is `origin`.
    pub fn new_open(width: u32, height: u32, cell_size: f32, origin: Vec3) -> Self {
        assert!(width > 0 && height > 0, "grid must have at least one cell");
        assert!(cell_size > 0.0, "cell size must be positive");

        let mut cells = Vec::with_capacity((width * height) as usize);
        for cz in 0..height {
            for cx in 0..width {
                let center = Self::center_of(origin, cell_size, UVec2::new(cx, cz));
                cells.push(Cell::new(true, center, cx, cz));
            }
        }

        Self {
            cells,
            width,
            height,
            cell_size,
            origin,
            revision: 0,
        }
    }

    /// Open grid covering `world_size` (X, Z) centred on `center`.
    /// Cell counts are rounded to the nearest whole cell.
    pub fn centered(center: Vec3, world_size: Vec2, cell_size: f32) -> Self {
        let width = ((world_size.x / cell_size).round() as u32).max(1);
        let height = ((world_size.y / cell_size).round() as u32).max(1);
        let origin = center - Vec3::new(world_size.x * 0.5, 0.0, world_size.y * 0.5);
        Self::new_open(width, height, cell_size, origin)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Convert a world-space position (XZ plane) to the grid cell that contains it.
    /// Returns `None` if the position is outside the grid.
    pub fn world_to_cell(&self, pos: Vec3) -> Option<UVec2> {
        let x = ((pos.x - self.origin.x) / self.cell_size).floor();
        let z = ((pos.z - self.origin.z) / self.cell_size).floor();
        // Negated comparison also rejects NaN.
        if !(x >= 0.0 && z >= 0.0) {
            return None;
        }
        let (cx, cz) = (x as u32, z as u32);
        if cx >= self.width || cz >= self.height {
            return None;
        }
        Some(UVec2::new(cx, cz))
    }

    /// The cell containing `pos`, or `OutOfBounds`.
    pub fn cell_at(&self, pos: Vec3) -> NavResult<&Cell> {
        self.world_to_cell(pos)
            .map(|c| &self.cells[self.idx(c)])
            .ok_or(NavError::OutOfBounds { x: pos.x, z: pos.z })
    }

    /// Cell by grid coordinate. Panics if `coord` is out of range.
    pub fn cell(&self, coord: UVec2) -> &Cell {
        assert!(self.in_bounds(coord), "cell {coord} outside {}x{} grid", self.width, self.height);
        &self.cells[self.idx(coord)]
    }

    /// World-space center of a grid cell (on the ground plane).
    pub fn cell_center(&self, cell: UVec2) -> Vec3 {
        Self::center_of(self.origin, self.cell_size, cell)
    }

    fn center_of(origin: Vec3, cell_size: f32, cell: UVec2) -> Vec3 {
        origin
            + Vec3::new(
                (cell.x as f32 + 0.5) * cell_size,
                0.0,
                (cell.y as f32 + 0.5) * cell_size,
            )
    }

    #[inline]
    pub fn in_bounds(&self, cell: UVec2) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    #[inline]
    pub(crate) fn idx(&self, cell: UVec2) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    #[inline]
    pub(crate) fn coord_of(&self, idx: usize) -> UVec2 {
        let idx = idx as u32;
        UVec2::new(idx % self.width, idx / self.width)
    }

    pub fn is_walkable(&self, cell: UVec2) -> bool {
        self.cells[self.idx(cell)].walkable
    }

    /// Force a cell's walkable flag. The next `update_grid` rescans and may overwrite it.
    pub fn set_walkable(&mut self, cell: UVec2, walkable: bool) {
        let idx = self.idx(cell);
        if self.cells[idx].walkable != walkable {
            self.cells[idx].walkable = walkable;
            self.revision += 1;
        }
    }

    /// All eight (cardinal + diagonal) neighbors, clamped to bounds.
    /// Walkability is not checked here; the search filters it.
    pub fn neighbors(&self, pos: UVec2) -> impl Iterator<Item = UVec2> + use<> {
        let (x, z) = (pos.x as i64, pos.y as i64);
        let (wi, hi) = (self.width as i64, self.height as i64);
        NEIGHBOR_OFFSETS
            .into_iter()
            .filter(move |&(dx, dz)| {
                let nx = x + dx;
                let nz = z + dz;
                nx >= 0 && nz >= 0 && nx < wi && nz < hi
            })
            .map(move |(dx, dz)| UVec2::new((x + dx) as u32, (z + dz) as u32))
    }

    /// Re-scan `field` and refresh every cell's walkable flag.
    ///
    /// A cell is blocked when a body overlaps any part of its square.
    /// Returns how many cells changed; calling twice with an unchanged field
    /// returns 0 the second time.
    pub fn update_grid(&mut self, field: &dyn ObstacleField) -> usize {
        let half_extent = self.cell_size * 0.5;
        let mut changed = 0;
        for cell in &mut self.cells {
            let walkable = !field.overlaps_square(cell.world_position, half_extent);
            if cell.walkable != walkable {
                cell.walkable = walkable;
                changed += 1;
            }
        }
        if changed > 0 {
            self.revision += 1;
        }
        debug!(
            "grid update: {changed} cells changed, {} blocked, revision {}",
            self.cells.iter().filter(|c| !c.walkable).count(),
            self.revision
        );
        changed
    }

    /// Clear search bookkeeping left behind by a previous search.
    pub(crate) fn reset_search(&mut self) {
        for cell in &mut self.cells {
            cell.g_cost = u32::MAX;
            cell.h_cost = 0;
            cell.parent = None;
        }
    }

    #[inline]
    pub(crate) fn cell_by_idx(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    #[inline]
    pub(crate) fn cell_by_idx_mut(&mut self, idx: usize) -> &mut Cell {
        &mut self.cells[idx]
    }

    /// Text dump of the grid, top row = highest Z.
    /// `#` blocked, `*` a cell on `path`, `.` free.
    pub fn ascii_map(&self, path: &[Vec3]) -> String {
        let on_path: Vec<UVec2> = path.iter().filter_map(|p| self.world_to_cell(*p)).collect();
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for cz in (0..self.height).rev() {
            for cx in 0..self.width {
                let c = UVec2::new(cx, cz);
                let symbol = if on_path.contains(&c) {
                    '*'
                } else if !self.is_walkable(c) {
                    '#'
                } else {
                    '.'
                };
                out.push(symbol);
            }
            out.push('\n');
        }
        out
    }
}
