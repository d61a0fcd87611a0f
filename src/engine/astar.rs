// A* over the walkability grid.
//
// 8-connected, integer step costs (straight 10, diagonal 14) with the octile
// heuristic in the same units, which never overestimates.
// Open set order: lowest f, then lowest h, then lowest cell index.
// Returned waypoints are cell centres from the first step up to and including
// the goal cell; the start cell is never part of the path.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{UVec2, Vec3};
use log::debug;

use super::navigation::GridMap;
use crate::NavResult;

// ============================================================================
// COSTS
// ============================================================================

/// Cost of one axis-aligned step.
pub const STRAIGHT_COST: u32 = 10;
/// Cost of one diagonal step (~10 * sqrt(2), rounded down).
pub const DIAGONAL_COST: u32 = 14;

/// Octile distance between two cells in step-cost units.
/// Exact remaining cost on an obstacle-free grid.
pub fn octile_distance(a: UVec2, b: UVec2) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dz = a.y.abs_diff(b.y);
    let (lo, hi) = (dx.min(dz), dx.max(dz));
    DIAGONAL_COST * lo + STRAIGHT_COST * (hi - lo)
}

/// Cost of moving between two adjacent cells.
#[inline]
pub fn step_cost(from: UVec2, to: UVec2) -> u32 {
    if from.x != to.x && from.y != to.y {
        DIAGONAL_COST
    } else {
        STRAIGHT_COST
    }
}

// ============================================================================
// OPEN SET ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    f: u32,
    h: u32,
    idx: usize,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on every key: BinaryHeap is a max-heap.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Find a path from `start` to `goal` (world positions).
///
/// `Err(OutOfBounds)` if either point is off the grid. `Ok(empty)` when
/// either end cell is blocked, when no walkable route exists, or when both
/// points fall in the same cell.
///
/// Search bookkeeping is written into the grid's cells; it is reset on entry,
/// so results never depend on an earlier search.
pub fn find_path(grid: &mut GridMap, start: Vec3, goal: Vec3) -> NavResult<Vec<Vec3>> {
    let start_cell = grid.cell_at(start)?.coord();
    let goal_cell = grid.cell_at(goal)?.coord();

    if !grid.is_walkable(start_cell) || !grid.is_walkable(goal_cell) {
        debug!("A* {start_cell} -> {goal_cell}: endpoint blocked");
        return Ok(Vec::new());
    }

    grid.reset_search();
    let start_idx = grid.idx(start_cell);
    let goal_idx = grid.idx(goal_cell);

    let mut closed = vec![false; grid.len()];
    let mut open = BinaryHeap::new();

    let h = octile_distance(start_cell, goal_cell);
    {
        let cell = grid.cell_by_idx_mut(start_idx);
        cell.g_cost = 0;
        cell.h_cost = h;
    }
    open.push(OpenEntry {
        f: h,
        h,
        idx: start_idx,
    });

    let mut expanded = 0usize;
    while let Some(OpenEntry { f, idx, .. }) = open.pop() {
        // Lazy deletion: skip finalized cells and superseded entries.
        if closed[idx] || f != grid.cell_by_idx(idx).f_cost() {
            continue;
        }
        closed[idx] = true;
        expanded += 1;

        if idx == goal_idx {
            let path = retrace(grid, start_idx, goal_idx);
            debug!(
                "A* {start_cell} -> {goal_cell}: {} waypoints, cost {}, {expanded} expanded",
                path.len(),
                grid.cell_by_idx(goal_idx).g_cost()
            );
            return Ok(path);
        }

        let current = grid.coord_of(idx);
        let current_g = grid.cell_by_idx(idx).g_cost;

        for nb in grid.neighbors(current) {
            let ni = grid.idx(nb);
            if closed[ni] || !grid.cell_by_idx(ni).walkable {
                continue;
            }

            let tentative = current_g + step_cost(current, nb);
            let neighbor = grid.cell_by_idx_mut(ni);
            if tentative < neighbor.g_cost {
                neighbor.g_cost = tentative;
                neighbor.h_cost = octile_distance(nb, goal_cell);
                neighbor.parent = Some(idx);
                open.push(OpenEntry {
                    f: neighbor.f_cost(),
                    h: neighbor.h_cost,
                    idx: ni,
                });
            }
        }
    }

    debug!("A* {start_cell} -> {goal_cell}: no route, {expanded} expanded");
    Ok(Vec::new())
}

/// Walk parent links from goal back to start, then reverse. Start excluded.
fn retrace(grid: &GridMap, start_idx: usize, goal_idx: usize) -> Vec<Vec3> {
    let mut path = Vec::new();
    let mut current = goal_idx;
    while current != start_idx {
        let cell = grid.cell_by_idx(current);
        path.push(cell.world_position);
        match cell.parent {
            Some(parent) => current = parent,
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center(grid: &GridMap, x: u32, z: u32) -> Vec3 {
        grid.cell_center(UVec2::new(x, z))
    }

    #[test]
    fn octile_is_exact_on_open_ground() {
        assert_eq!(octile_distance(UVec2::new(0, 0), UVec2::new(9, 9)), 9 * DIAGONAL_COST);
        assert_eq!(octile_distance(UVec2::new(0, 0), UVec2::new(5, 0)), 5 * STRAIGHT_COST);
        assert_eq!(
            octile_distance(UVec2::new(2, 1), UVec2::new(7, 3)),
            2 * DIAGONAL_COST + 3 * STRAIGHT_COST
        );
    }

    #[test]
    fn open_ten_by_ten_is_nine_diagonals() {
        let mut grid = GridMap::new_open(10, 10, 1.0, Vec3::ZERO);
        let (start, goal) = (center(&grid, 0, 0), center(&grid, 9, 9));
        let path = find_path(&mut grid, start, goal).unwrap();

        assert_eq!(path.len(), 9);
        for (i, wp) in path.iter().enumerate() {
            let c = grid.world_to_cell(*wp).unwrap();
            assert_eq!(c, UVec2::new(i as u32 + 1, i as u32 + 1));
        }
        assert_eq!(*path.last().unwrap(), goal);
    }

    #[test]
    fn same_cell_yields_empty_path() {
        let mut grid = GridMap::new_open(4, 4, 1.0, Vec3::ZERO);
        let (start, goal) = (Vec3::new(1.2, 0.0, 1.2), Vec3::new(1.8, 0.0, 1.7));
        let path = find_path(&mut grid, start, goal).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn blocked_endpoint_is_no_route() {
        let mut grid = GridMap::new_open(5, 5, 1.0, Vec3::ZERO);
        grid.set_walkable(UVec2::new(4, 4), false);
        let (start, goal) = (center(&grid, 0, 0), center(&grid, 4, 4));
        assert!(find_path(&mut grid, start, goal).unwrap().is_empty());
        assert!(find_path(&mut grid, goal, start).unwrap().is_empty());
    }

    #[test]
    fn out_of_bounds_endpoint_is_an_error() {
        let mut grid = GridMap::new_open(5, 5, 1.0, Vec3::ZERO);
        assert!(find_path(&mut grid, Vec3::new(-1.0, 0.0, 0.5), Vec3::new(2.5, 0.0, 2.5)).is_err());
        assert!(find_path(&mut grid, Vec3::new(0.5, 0.0, 0.5), Vec3::new(2.5, 0.0, 9.5)).is_err());
    }

    #[test]
    fn detours_around_wall() {
        // Wall on x = 2 from z = 0..=3, gap at z = 4.
        let mut grid = GridMap::new_open(5, 5, 1.0, Vec3::ZERO);
        for z in 0..4 {
            grid.set_walkable(UVec2::new(2, z), false);
        }
        let (start, goal) = (center(&grid, 0, 0), center(&grid, 4, 0));
        let path = find_path(&mut grid, start, goal).unwrap();

        assert!(!path.is_empty(), "\n{}", grid.ascii_map(&path));
        assert!(path.iter().any(|p| grid.world_to_cell(*p) == Some(UVec2::new(2, 4))));
        for wp in &path {
            assert!(grid.is_walkable(grid.world_to_cell(*wp).unwrap()));
        }
        // (0,0) -> (1,3) -> (2,4) -> (3,3) -> (4,0)
        assert_eq!(grid.cell(UVec2::new(4, 0)).g_cost(), 4 * DIAGONAL_COST + 4 * STRAIGHT_COST);
    }

    #[test]
    fn stale_parents_do_not_leak_between_searches() {
        let mut grid = GridMap::new_open(6, 6, 1.0, Vec3::ZERO);
        let (start, goal) = (center(&grid, 0, 0), center(&grid, 5, 5));
        let first = find_path(&mut grid, start, goal).unwrap();
        assert_eq!(first.len(), 5);

        let (start, goal) = (center(&grid, 5, 0), center(&grid, 5, 3));
        let second = find_path(&mut grid, start, goal).unwrap();
        let cells: Vec<UVec2> = second.iter().map(|p| grid.world_to_cell(*p).unwrap()).collect();
        assert_eq!(cells, vec![UVec2::new(5, 1), UVec2::new(5, 2), UVec2::new(5, 3)]);
    }

    #[test]
    fn results_are_deterministic() {
        let mut grid = GridMap::new_open(12, 8, 1.0, Vec3::ZERO);
        grid.set_walkable(UVec2::new(5, 4), false);
        let (start, goal) = (center(&grid, 0, 4), center(&grid, 11, 4));
        let a = find_path(&mut grid, start, goal).unwrap();
        let b = find_path(&mut grid, start, goal).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn open_set_pops_lowest_f_then_h_then_index() {
        let mut open = BinaryHeap::new();
        for (f, h, idx) in [(30, 10, 4), (20, 14, 9), (20, 6, 7), (20, 6, 2), (10, 10, 5)] {
            open.push(OpenEntry { f, h, idx });
        }
        let order: Vec<(u32, u32, usize)> =
            std::iter::from_fn(|| open.pop()).map(|e| (e.f, e.h, e.idx)).collect();
        assert_eq!(
            order,
            vec![(10, 10, 5), (20, 6, 2), (20, 6, 7), (20, 14, 9), (30, 10, 4)]
        );
    }
}
