//! Geohash-grid and R-tree indexing for road networks, with nearest-edge map
//! matching and zone membership queries.
//!
//! ```rust
//! use geomatch::prelude::*;
//! use geomatch::model::{Edge, EdgeCollection};
//! use geo::line_string;
//!
//! let edges: EdgeCollection = [Edge::from_line(
//!     "1",
//!     "2",
//!     line_string![(x: 114.30, y: 22.60), (x: 114.31, y: 22.60)],
//! )]
//! .into_iter()
//! .collect();
//!
//! let network = NetworkBuilder::new().edges(edges).build()?;
//! let found = network
//!     .match_point_to_nearest_edge(114.305, 22.601)?
//!     .into_match()
//!     .expect("edge in the same cell");
//! assert!((found.point.y() - 22.60).abs() < 1e-6);
//! # Ok::<(), geomatch::GeoMatchError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod model;
pub mod network;

#[cfg(feature = "sync")]
pub mod sync;

pub use builder::NetworkBuilder;
pub use config::Config;
pub use error::{AssignReport, GeoMatchError, Result};
pub use network::SpatialNetwork;

#[cfg(feature = "sync")]
pub use sync::SyncNetwork;

pub use geo::{LineString, Point, Polygon, Rect};

pub use compute::spatial::{
    EdgeMatch, EntityHandle, GridIndex, MatchResult, SpatialTreeIndex, geohash_grid,
};

pub use model::{
    Edge, EdgeCollection, EdgeId, ElementRef, EntityKind, Node, NodeCollection, Zone,
    ZoneCollection,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Config, GeoMatchError, NetworkBuilder, Result, SpatialNetwork};

    pub use geo::{LineString, Point, Polygon, Rect};

    pub use crate::compute::spatial::{EdgeMatch, MatchResult};

    pub use crate::model::{EdgeId, ElementRef, EntityKind};

    #[cfg(feature = "sync")]
    pub use crate::SyncNetwork;
}
