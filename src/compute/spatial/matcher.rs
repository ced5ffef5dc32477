//! Nearest-edge map matching.

use super::bridge::find_reachable_edges;
use super::grid_index::GridIndex;
use crate::compute::geometry;
use crate::compute::validation::validate_coordinate;
use crate::error::{GeoMatchError, Result};
use crate::model::{EdgeCollection, EdgeId};
use geo::Point;
use rustc_hash::FxHashSet;

/// Closest edge to a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMatch {
    pub edge: EdgeId,
    /// Planar distance in degrees, used for ranking
    pub distance: f64,
    /// Great-circle distance from the query point to `point`
    pub distance_meters: f64,
    /// Projection of the query point onto the edge, rounded
    pub point: Point<f64>,
}

/// Outcome of matching one point against the grid.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched(EdgeMatch),
    /// The point's neighbourhood holds edges, but none could be scored
    NotFound,
    /// Bridging search exhausted the grid from this cell
    NoReachableEdges { cell: String },
}

impl MatchResult {
    pub fn as_match(&self) -> Option<&EdgeMatch> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_match(self) -> Option<EdgeMatch> {
        match self {
            Self::Matched(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

/// Score candidate edges against `point` and keep the closest.
///
/// An edge whose reverse was already scored is skipped. Ties keep the edge
/// seen first. Returns `None` for an empty candidate list; a candidate
/// missing from `edges` is an [`InconsistentIndex`](GeoMatchError::InconsistentIndex).
pub fn nearest_edge<'a, I>(
    point: Point<f64>,
    candidates: I,
    edges: &EdgeCollection,
    decimals: u32,
) -> Result<Option<EdgeMatch>>
where
    I: IntoIterator<Item = &'a EdgeId>,
{
    let mut scored: FxHashSet<(&str, &str)> = FxHashSet::default();
    let mut best: Option<(f64, &EdgeId, Point<f64>)> = None;

    for id in candidates {
        if !scored.insert(id.unordered()) {
            continue;
        }

        let line = edges.require(id)?.line()?;
        let distance = geometry::distance(&point, line);
        if best.as_ref().is_some_and(|(min, ..)| distance >= *min) {
            continue;
        }

        let projected = geometry::nearest_point_on(line, &point).ok_or_else(|| {
            GeoMatchError::InvalidGeometry(format!("no closest point on edge {}", id))
        })?;
        best = Some((distance, id, projected));
    }

    Ok(best.map(|(distance, id, projected)| {
        let point_on_edge = Point::new(
            geometry::round_to(projected.x(), decimals),
            geometry::round_to(projected.y(), decimals),
        );
        EdgeMatch {
            edge: id.clone(),
            distance,
            distance_meters: geometry::haversine_meters(point, point_on_edge),
            point: point_on_edge,
        }
    }))
}

/// Match a coordinate to the nearest edge recorded in the grid.
///
/// Candidates are the edges in the point's own cell; when that cell holds
/// none, the bridging search supplies the nearest ring that does.
pub fn match_point(
    grid: &GridIndex,
    edges: &EdgeCollection,
    lon: f64,
    lat: f64,
    decimals: u32,
    max_bridge_depth: Option<usize>,
) -> Result<MatchResult> {
    validate_coordinate(lon, lat)?;
    let cell = grid.cell_of(lon, lat)?;

    let mut candidates = grid.edges_in_cell(&cell);
    if candidates.is_empty() {
        match find_reachable_edges(grid, &[cell.as_str()], max_bridge_depth) {
            Ok(outcome) => candidates = outcome.edges,
            Err(GeoMatchError::NoReachableEdges { cell }) => {
                return Ok(MatchResult::NoReachableEdges { cell });
            }
            Err(err) => return Err(err),
        }
    }

    let point = Point::new(lon, lat);
    Ok(match nearest_edge(point, &candidates, edges, decimals)? {
        Some(found) => MatchResult::Matched(found),
        None => MatchResult::NotFound,
    })
}
