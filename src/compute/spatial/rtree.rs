//! Bounding-box tree over network entities.
//!
//! Entries are indexed by envelope only, so every query here is a filtering
//! stage: callers (and the helpers at the bottom of this module) re-check the
//! exact geometry on the candidates. Nodes, edges and zones can share one
//! tree; each entry carries an [`EntityHandle`] saying what it points at.
//!
//! ## Transient probes
//!
//! Some queries insert a temporary point, ask for its neighbours and remove
//! it again. [`SpatialTreeIndex::probe`] returns a [`ProbeGuard`] that removes
//! the probe when dropped, so the tree is restored even if the query bails
//! out early.
//!
//! ```rust
//! use geomatch::compute::spatial::{EntityHandle, SpatialTreeIndex};
//! use geomatch::model::{Node, NodeCollection};
//!
//! let nodes: NodeCollection = [Node::new("a", 114.30, 22.60), Node::new("b", 114.40, 22.60)]
//!     .into_iter()
//!     .collect();
//! let mut tree = SpatialTreeIndex::for_nodes(&nodes);
//!
//! let nearest = tree.probe_nearest(114.31, 22.60, None, 1).unwrap();
//! assert_eq!(nearest, vec![EntityHandle::Node("a".into())]);
//! assert_eq!(tree.len(), 2);
//! ```

use crate::compute::geometry;
use crate::compute::validation::validate_coordinate;
use crate::error::Result;
use crate::model::{
    EdgeCollection, EdgeId, EntityKind, NodeCollection, Zone, ZoneCollection,
};
use geo::{BoundingRect, Point, Rect};
use rstar::{AABB, Envelope, PointDistance, RTree, RTreeObject};
use rustc_hash::FxHashSet;
use std::fmt;

/// What a tree entry refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityHandle {
    Node(String),
    Edge(EdgeId),
    Zone(String),
    /// Temporary query point owned by a [`ProbeGuard`]
    Probe,
}

impl EntityHandle {
    /// Entity kind, or `None` for a probe.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            Self::Node(_) => Some(EntityKind::Node),
            Self::Edge(_) => Some(EntityKind::Edge),
            Self::Zone(_) => Some(EntityKind::Zone),
            Self::Probe => None,
        }
    }

    pub fn is_kind(&self, kind: EntityKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn as_node(&self) -> Option<&str> {
        match self {
            Self::Node(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeId> {
        match self {
            Self::Edge(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_zone(&self) -> Option<&str> {
        match self {
            Self::Zone(id) => Some(id),
            _ => None,
        }
    }
}

/// An envelope plus the entity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEntry {
    envelope: AABB<[f64; 2]>,
    pub handle: EntityHandle,
}

impl TreeEntry {
    pub fn new(rect: Rect<f64>, handle: EntityHandle) -> Self {
        Self {
            envelope: to_envelope(rect),
            handle,
        }
    }

    pub fn at_point(lon: f64, lat: f64, handle: EntityHandle) -> Self {
        Self {
            envelope: AABB::from_point([lon, lat]),
            handle,
        }
    }
}

impl RTreeObject for TreeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for TreeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// R-tree of entity envelopes.
#[derive(Debug, Default)]
pub struct SpatialTreeIndex {
    tree: RTree<TreeEntry>,
}

impl SpatialTreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load a tree from prepared entries.
    pub fn from_entries(entries: Vec<TreeEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn insert(&mut self, rect: Rect<f64>, handle: EntityHandle) {
        self.tree.insert(TreeEntry::new(rect, handle));
    }

    /// Remove the entry with exactly this box and handle.
    pub fn remove(&mut self, rect: Rect<f64>, handle: &EntityHandle) -> bool {
        self.tree
            .remove(&TreeEntry::new(rect, handle.clone()))
            .is_some()
    }

    /// Up to `k` handles ordered by envelope distance from the box centre.
    pub fn nearest_k(&self, rect: Rect<f64>, k: usize) -> Vec<&EntityHandle> {
        let centre = rect.center();
        self.tree
            .nearest_neighbor_iter(&[centre.x, centre.y])
            .take(k)
            .map(|entry| &entry.handle)
            .collect()
    }

    /// Handles whose envelope lies entirely inside the box.
    pub fn containing(&self, rect: Rect<f64>) -> Vec<&EntityHandle> {
        self.tree
            .locate_in_envelope(&to_envelope(rect))
            .map(|entry| &entry.handle)
            .collect()
    }

    /// Handles whose envelope overlaps or touches the box.
    pub fn intersecting(&self, rect: Rect<f64>) -> Vec<&EntityHandle> {
        self.tree
            .locate_in_envelope_intersecting(&to_envelope(rect))
            .map(|entry| &entry.handle)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.tree.iter()
    }

    /// Insert a transient point. It stays in the tree until the guard drops.
    pub fn probe(&mut self, lon: f64, lat: f64) -> ProbeGuard<'_> {
        let entry = TreeEntry::at_point(lon, lat, EntityHandle::Probe);
        self.tree.insert(entry.clone());
        ProbeGuard { index: self, entry }
    }

    /// Nearest `k` entities to a coordinate, optionally of one kind, found by
    /// probing the tree with a transient point.
    pub fn probe_nearest(
        &mut self,
        lon: f64,
        lat: f64,
        kind: Option<EntityKind>,
        k: usize,
    ) -> Result<Vec<EntityHandle>> {
        validate_coordinate(lon, lat)?;
        let guard = self.probe(lon, lat);
        Ok(guard.nearest(kind, k))
    }

    /// Tree over zone bounding boxes.
    pub fn for_zones(zones: &ZoneCollection) -> Result<Self> {
        let mut entries = Vec::with_capacity(zones.len());
        push_zones(&mut entries, zones, OnInvalid::Fail)?;
        Ok(Self::from_entries(entries))
    }

    /// Tree over node points.
    pub fn for_nodes(nodes: &NodeCollection) -> Self {
        let mut entries = Vec::with_capacity(nodes.len());
        push_nodes(&mut entries, nodes);
        Self::from_entries(entries)
    }

    /// Tree over edge segments; an edge appears once per segment.
    pub fn for_edges(edges: &EdgeCollection) -> Result<Self> {
        let mut entries = Vec::new();
        push_edges(&mut entries, edges, OnInvalid::Fail)?;
        Ok(Self::from_entries(entries))
    }

    /// Like [`for_edges`](Self::for_edges), but edges without a usable line
    /// are logged and left out.
    pub fn for_edges_skip_invalid(edges: &EdgeCollection) -> Self {
        let mut entries = Vec::new();
        let _ = push_edges(&mut entries, edges, OnInvalid::Skip);
        Self::from_entries(entries)
    }

    pub fn for_zones_and_nodes(zones: &ZoneCollection, nodes: &NodeCollection) -> Result<Self> {
        let mut entries = Vec::with_capacity(zones.len() + nodes.len());
        push_zones(&mut entries, zones, OnInvalid::Fail)?;
        push_nodes(&mut entries, nodes);
        Ok(Self::from_entries(entries))
    }

    /// Like [`for_zones_and_nodes`](Self::for_zones_and_nodes), but zones
    /// without a usable polygon are logged and left out.
    pub fn for_zones_and_nodes_skip_invalid(zones: &ZoneCollection, nodes: &NodeCollection) -> Self {
        let mut entries = Vec::with_capacity(zones.len() + nodes.len());
        let _ = push_zones(&mut entries, zones, OnInvalid::Skip);
        push_nodes(&mut entries, nodes);
        Self::from_entries(entries)
    }

    pub fn for_zones_and_edges(zones: &ZoneCollection, edges: &EdgeCollection) -> Result<Self> {
        let mut entries = Vec::with_capacity(zones.len());
        push_zones(&mut entries, zones, OnInvalid::Fail)?;
        push_edges(&mut entries, edges, OnInvalid::Fail)?;
        Ok(Self::from_entries(entries))
    }

    /// Zone strictly containing the coordinate. With overlapping zones the
    /// lowest id wins.
    pub fn zone_containing_point(
        &self,
        lon: f64,
        lat: f64,
        zones: &ZoneCollection,
    ) -> Result<Option<String>> {
        validate_coordinate(lon, lat)?;
        let point = Point::new(lon, lat);

        let mut candidates: Vec<&str> = self
            .intersecting(Rect::new(point.0, point.0))
            .into_iter()
            .filter_map(EntityHandle::as_zone)
            .collect();
        candidates.sort_unstable();

        for id in candidates {
            if geometry::within(&point, zones.require(id)?.polygon()?) {
                return Ok(Some(id.to_string()));
            }
        }
        Ok(None)
    }

    /// Nodes strictly inside the zone polygon, in id order.
    pub fn zone_inner_nodes(&self, zone: &Zone, nodes: &NodeCollection) -> Result<Vec<String>> {
        let polygon = zone.polygon()?;
        let mut inner = Vec::new();
        for id in self
            .containing(geometry::bounds(polygon)?)
            .into_iter()
            .filter_map(EntityHandle::as_node)
        {
            if nodes.require(id)?.is_in_polygon(polygon) {
                inner.push(id.to_string());
            }
        }
        inner.sort();
        Ok(inner)
    }

    /// Edges inside or crossing the zone polygon, in id order.
    pub fn zone_inner_edges(&self, zone: &Zone, edges: &EdgeCollection) -> Result<Vec<EdgeId>> {
        let polygon = zone.polygon()?;
        let candidates: FxHashSet<&EdgeId> = self
            .intersecting(geometry::bounds(polygon)?)
            .into_iter()
            .filter_map(EntityHandle::as_edge)
            .collect();

        let mut inner = Vec::new();
        for id in candidates {
            if geometry::intersects(edges.require(id)?.line()?, polygon) {
                inner.push(id.clone());
            }
        }
        inner.sort();
        Ok(inner)
    }

    /// Zones sharing a boundary with `zone` without overlapping it.
    pub fn neighbour_zones(&self, zone: &Zone, zones: &ZoneCollection) -> Result<Vec<String>> {
        let polygon = zone.polygon()?;
        let mut neighbours = Vec::new();
        for id in self
            .intersecting(geometry::bounds(polygon)?)
            .into_iter()
            .filter_map(EntityHandle::as_zone)
        {
            if id == zone.id() {
                continue;
            }
            if geometry::touches(polygon, zones.require(id)?.polygon()?) {
                neighbours.push(id.to_string());
            }
        }
        neighbours.sort();
        Ok(neighbours)
    }

    /// Up to `k` nodes nearest to a coordinate, closest first, skipping
    /// `exclude`.
    pub fn nearest_nodes(&self, lon: f64, lat: f64, k: usize, exclude: Option<&str>) -> Vec<String> {
        self.tree
            .nearest_neighbor_iter(&[lon, lat])
            .filter_map(|entry| entry.handle.as_node())
            .filter(|id| Some(*id) != exclude)
            .take(k)
            .map(str::to_string)
            .collect()
    }
}

/// Keeps a probe point in the tree; removes it on drop.
pub struct ProbeGuard<'a> {
    index: &'a mut SpatialTreeIndex,
    entry: TreeEntry,
}

impl ProbeGuard<'_> {
    /// Distinct entities nearest to the probe, closest first. Edges indexed
    /// by several segments are reported once.
    pub fn nearest(&self, kind: Option<EntityKind>, k: usize) -> Vec<EntityHandle> {
        let centre = self.entry.envelope.center();
        let mut seen = FxHashSet::default();
        self.index
            .tree
            .nearest_neighbor_iter(&centre)
            .map(|entry| &entry.handle)
            .filter(|handle| match kind {
                Some(kind) => handle.is_kind(kind),
                None => handle.kind().is_some(),
            })
            .filter(|handle| seen.insert(*handle))
            .take(k)
            .cloned()
            .collect()
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.index.tree.remove(&self.entry).is_none() {
            log::warn!("Probe entry was already gone from the spatial tree");
        }
    }
}

fn to_envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// What to do with an entity whose geometry cannot be indexed.
#[derive(Debug, Clone, Copy)]
enum OnInvalid {
    Fail,
    Skip,
}

impl OnInvalid {
    fn check<T>(self, kind: EntityKind, id: &dyn fmt::Display, result: Result<T>) -> Result<Option<T>> {
        match (result, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(err), Self::Fail) => Err(err),
            (Err(err), Self::Skip) => {
                log::warn!("{} {} left out of spatial tree: {}", kind, id, err);
                Ok(None)
            }
        }
    }
}

fn push_zones(
    entries: &mut Vec<TreeEntry>,
    zones: &ZoneCollection,
    on_invalid: OnInvalid,
) -> Result<()> {
    for zone in zones.values() {
        let rect = zone.polygon().and_then(geometry::bounds);
        if let Some(rect) = on_invalid.check(EntityKind::Zone, &zone.id(), rect)? {
            entries.push(TreeEntry::new(rect, EntityHandle::Zone(zone.id().to_string())));
        }
    }
    Ok(())
}

fn push_nodes(entries: &mut Vec<TreeEntry>, nodes: &NodeCollection) {
    for node in nodes.values() {
        entries.push(TreeEntry::at_point(
            node.lon(),
            node.lat(),
            EntityHandle::Node(node.id().to_string()),
        ));
    }
}

fn push_edges(
    entries: &mut Vec<TreeEntry>,
    edges: &EdgeCollection,
    on_invalid: OnInvalid,
) -> Result<()> {
    for edge in edges.values() {
        let id = edge.id();
        let Some(line) = on_invalid.check(EntityKind::Edge, &id, edge.line())? else {
            continue;
        };
        for segment in line.lines() {
            entries.push(TreeEntry::new(
                segment.bounding_rect(),
                EntityHandle::Edge(id.clone()),
            ));
        }
    }
    Ok(())
}
