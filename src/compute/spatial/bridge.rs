//! Breadth-first search for edge candidates around cells that hold none.

use super::geohash_grid;
use super::grid_index::GridIndex;
use crate::error::{GeoMatchError, Result};
use crate::model::EdgeId;
use rustc_hash::FxHashSet;

/// Candidate edges found by [`find_reachable_edges`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOutcome {
    /// Distinct edge ids in discovery order
    pub edges: Vec<EdgeId>,
    /// Ring at which the edges were found; 0 means the seeds held edges
    pub depth: usize,
    /// Cells examined, seeds included
    pub visited: usize,
}

/// Collect the edges of the nearest non-empty ring of grid cells around
/// `seeds`.
///
/// The seeds are checked first. After that the search expands one ring at a
/// time: the next frontier is every neighbour of the current frontier that
/// exists in the grid and has not been visited. A ring is always examined in
/// full before stopping, so every edge at the winning depth is returned.
///
/// Seeds need not exist in the grid themselves; their neighbours are still
/// expanded. Fails with [`GeoMatchError::NoReachableEdges`] once the frontier
/// runs dry, or `max_depth` rings have been searched, without finding an edge.
pub fn find_reachable_edges<S: AsRef<str>>(
    grid: &GridIndex,
    seeds: &[S],
    max_depth: Option<usize>,
) -> Result<BridgeOutcome> {
    let origin = seeds
        .first()
        .map(|s| s.as_ref().to_string())
        .ok_or_else(|| GeoMatchError::InvalidCell("bridge search needs a seed cell".to_string()))?;

    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut frontier: Vec<String> = Vec::new();
    for seed in seeds {
        let seed = seed.as_ref();
        if visited.insert(seed.to_string()) {
            frontier.push(seed.to_string());
        }
    }

    let mut found = Vec::new();
    let mut seen = FxHashSet::default();
    collect_edges(grid, &frontier, &mut found, &mut seen);

    let mut depth = 0;
    while found.is_empty() {
        if max_depth.is_some_and(|max| depth >= max) {
            log::debug!("Bridge search from {} hit depth cap {}", origin, depth);
            break;
        }

        let mut next = Vec::new();
        for cell in &frontier {
            for neighbour in geohash_grid::neighbors(cell)? {
                if grid.contains_cell(&neighbour) && !visited.contains(&neighbour) {
                    visited.insert(neighbour.clone());
                    next.push(neighbour);
                }
            }
        }

        if next.is_empty() {
            break;
        }
        depth += 1;
        collect_edges(grid, &next, &mut found, &mut seen);
        frontier = next;
    }

    if found.is_empty() {
        return Err(GeoMatchError::NoReachableEdges { cell: origin });
    }

    log::debug!(
        "Bridge search from {} found {} edges at depth {} ({} cells visited)",
        origin,
        found.len(),
        depth,
        visited.len()
    );

    Ok(BridgeOutcome {
        edges: found,
        depth,
        visited: visited.len(),
    })
}

fn collect_edges(
    grid: &GridIndex,
    cells: &[String],
    found: &mut Vec<EdgeId>,
    seen: &mut FxHashSet<EdgeId>,
) {
    for cell in cells {
        for edge in grid.edges_in_cell(cell) {
            if seen.insert(edge.clone()) {
                found.push(edge);
            }
        }
    }
}
