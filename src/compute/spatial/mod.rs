//! Spatial indexing: the geohash cell grid, the searches built on it, and
//! the envelope tree used for zone and proximity queries.

pub mod bridge;
pub mod geohash_grid;
pub mod grid_index;
pub mod matcher;
pub mod rtree;

pub use bridge::{BridgeOutcome, find_reachable_edges};
pub use grid_index::{CellClassification, GridIndex, GridStats, classify_cells, classify_line_cells};
pub use matcher::{EdgeMatch, MatchResult, match_point, nearest_edge};
pub use rtree::{EntityHandle, ProbeGuard, SpatialTreeIndex, TreeEntry};
