//! Thread-safe handle for sharing a network between threads.
//!
//! `SyncNetwork` wraps a [`SpatialNetwork`] in `Arc<RwLock<_>>`. Matching and
//! zone queries take the read lock and run in parallel; probing, node
//! circles and zone membership updates take the write lock.
//!
//! Enable the `sync` feature to use this module:
//!
//! ```toml
//! [dependencies]
//! geomatch = { version = "0.1", features = ["sync"] }
//! ```
//!
//! # Examples
//!
//! ```rust
//! use geomatch::SyncNetwork;
//! use geomatch::model::{Edge, EdgeCollection};
//! use geo::line_string;
//! use std::thread;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let edges: EdgeCollection = [Edge::from_line(
//!     "1",
//!     "2",
//!     line_string![(x: 114.30, y: 22.60), (x: 114.31, y: 22.60)],
//! )]
//! .into_iter()
//! .collect();
//! let network = SyncNetwork::new(geomatch::NetworkBuilder::new().edges(edges).build()?);
//!
//! let reader = network.clone();
//! let handle = thread::spawn(move || reader.match_point_to_nearest_edge(114.305, 22.601));
//!
//! assert!(handle.join().unwrap()?.is_matched());
//! # Ok(())
//! # }
//! ```

use crate::compute::spatial::MatchResult;
use crate::error::{AssignReport, Result};
use crate::model::{EdgeId, ElementRef, EntityKind};
use crate::network::SpatialNetwork;
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable, lock-protected [`SpatialNetwork`].
#[derive(Clone)]
pub struct SyncNetwork {
    inner: Arc<RwLock<SpatialNetwork>>,
}

impl SyncNetwork {
    pub fn new(network: SpatialNetwork) -> Self {
        Self {
            inner: Arc::new(RwLock::new(network)),
        }
    }

    pub fn match_point_to_nearest_edge(&self, lon: f64, lat: f64) -> Result<MatchResult> {
        self.inner.read().match_point_to_nearest_edge(lon, lat)
    }

    pub fn match_points(&self, points: &[(f64, f64)]) -> Vec<Result<MatchResult>> {
        self.inner.read().match_points(points)
    }

    pub fn zone_containing(&self, lon: f64, lat: f64) -> Result<Option<String>> {
        self.inner.read().zone_containing(lon, lat)
    }

    pub fn neighboring_zones(&self, zone_id: &str) -> Result<Vec<String>> {
        self.inner.read().neighboring_zones(zone_id)
    }

    pub fn entities_in_zone(&self, zone_id: &str, kind: EntityKind) -> Result<Vec<ElementRef>> {
        self.inner.read().entities_in_zone(zone_id, kind)
    }

    pub fn nearest_nodes(&self, node_id: &str, k: usize) -> Result<Vec<String>> {
        self.inner.read().nearest_nodes(node_id, k)
    }

    /// Probes the edge tree, so this takes the write lock.
    pub fn nearest_edges(&self, lon: f64, lat: f64, k: usize) -> Result<Vec<EdgeId>> {
        self.inner.write().nearest_edges(lon, lat, k)
    }

    /// Probes with the configured `probe_neighbors`; takes the write lock.
    pub fn probe_edges(&self, lon: f64, lat: f64) -> Result<Vec<EdgeId>> {
        self.inner.write().probe_edges(lon, lat)
    }

    pub fn nodes_near(&self, node_id: &str, meters: f64) -> Result<Vec<String>> {
        self.inner.write().nodes_near(node_id, meters)
    }

    pub fn assign_node_zones(&self) -> AssignReport {
        self.inner.write().assign_node_zones()
    }

    /// Acquires a read lock for several queries under one guard.
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, SpatialNetwork> {
        self.inner.read()
    }

    /// Acquires a write lock for several updates under one guard.
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, SpatialNetwork> {
        self.inner.write()
    }
}

impl From<SpatialNetwork> for SyncNetwork {
    fn from(network: SpatialNetwork) -> Self {
        Self::new(network)
    }
}

// Ensure SyncNetwork is Send + Sync
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<SyncNetwork>;
};
