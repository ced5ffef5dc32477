//! The assembled network and its query entry points.

use crate::builder::NetworkBuilder;
use crate::compute::spatial::{
    EdgeMatch, EntityHandle, GridIndex, MatchResult, SpatialTreeIndex, match_point,
};
use crate::compute::{cut, geometry};
use crate::config::Config;
use crate::error::{AssignReport, GeoMatchError, Result};
use crate::model::{
    EdgeCollection, EdgeId, ElementRef, EntityKind, NetworkDocument, NodeCollection,
    ZoneCollection, category,
};
use geo::LineString;
use std::path::Path;

/// Nodes, edges and zones indexed for matching and zone queries.
///
/// Built once by [`NetworkBuilder`]; after that, point matching and zone
/// lookups only need `&self` and can run from any number of threads. The few
/// operations that touch an index (probing, node circles, zone membership)
/// take `&mut self`.
#[derive(Debug)]
pub struct SpatialNetwork {
    pub(crate) config: Config,
    pub(crate) nodes: NodeCollection,
    pub(crate) edges: EdgeCollection,
    pub(crate) zones: ZoneCollection,
    pub(crate) grid: GridIndex,
    /// Zones and nodes
    pub(crate) zone_tree: SpatialTreeIndex,
    /// Edge segments
    pub(crate) edge_tree: SpatialTreeIndex,
    pub(crate) report: AssignReport,
}

impl SpatialNetwork {
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    /// Index a loaded document with default settings.
    pub fn from_document(document: NetworkDocument) -> Result<Self> {
        NetworkBuilder::new().document(document).build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn nodes(&self) -> &NodeCollection {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeCollection {
        &self.edges
    }

    pub fn zones(&self) -> &ZoneCollection {
        &self.zones
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    /// Entities that failed to index while building.
    pub fn build_report(&self) -> &AssignReport {
        &self.report
    }

    /// Match a coordinate to the closest edge in the grid.
    pub fn match_point_to_nearest_edge(&self, lon: f64, lat: f64) -> Result<MatchResult> {
        match_point(
            &self.grid,
            &self.edges,
            lon,
            lat,
            self.config.projection_decimals,
            self.config.max_bridge_depth,
        )
    }

    /// Match many coordinates. A failing point does not stop the batch.
    pub fn match_points(&self, points: &[(f64, f64)]) -> Vec<Result<MatchResult>> {
        let results: Vec<_> = points
            .iter()
            .map(|&(lon, lat)| self.match_point_to_nearest_edge(lon, lat))
            .collect();

        let matched = results
            .iter()
            .filter(|r| matches!(r, Ok(MatchResult::Matched(_))))
            .count();
        log::info!("Matched {} of {} points", matched, points.len());
        results
    }

    /// Split the matched edge's line at the projected point.
    ///
    /// Fails when the projection falls on one of the line's ends.
    pub fn split_at_match(&self, found: &EdgeMatch) -> Result<(LineString<f64>, LineString<f64>)> {
        let line = self.edges.require(&found.edge)?.line()?;
        cut::split_at_point(line, found.point)
    }

    /// Zone strictly containing the coordinate, looked up through its grid
    /// cell.
    pub fn zone_containing(&self, lon: f64, lat: f64) -> Result<Option<String>> {
        self.grid.zone_of_point(lon, lat, &self.zones)
    }

    /// Zones sharing a boundary with `zone_id`.
    pub fn neighboring_zones(&self, zone_id: &str) -> Result<Vec<String>> {
        let zone = self.zones.require(zone_id)?;
        self.zone_tree.neighbour_zones(zone, &self.zones)
    }

    /// Entities of one kind inside a zone.
    ///
    /// Nodes must lie strictly inside; edges may also cross the boundary.
    /// For [`EntityKind::Zone`] the result is the other zones lying within
    /// this one.
    pub fn entities_in_zone(&self, zone_id: &str, kind: EntityKind) -> Result<Vec<ElementRef>> {
        let zone = self.zones.require(zone_id)?;
        match kind {
            EntityKind::Node => Ok(self
                .grid
                .zone_inner_nodes(zone, &self.nodes)?
                .into_iter()
                .map(ElementRef::from)
                .collect()),
            EntityKind::Edge => Ok(self
                .grid
                .zone_inner_edges(zone, &self.edges)?
                .into_iter()
                .map(ElementRef::from)
                .collect()),
            EntityKind::Zone => {
                let polygon = zone.polygon()?;
                let mut inner = Vec::new();
                for id in self
                    .zone_tree
                    .containing(geometry::bounds(polygon)?)
                    .into_iter()
                    .filter_map(EntityHandle::as_zone)
                {
                    if id != zone_id
                        && geometry::within(self.zones.require(id)?.polygon()?, polygon)
                    {
                        inner.push(id.to_string());
                    }
                }
                inner.sort();
                Ok(inner.into_iter().map(ElementRef::from).collect())
            }
        }
    }

    /// Record each node's containing zone on the node (`belong_zone_id`) and
    /// the node on the zone (`inner_node_id`). Nodes outside every zone are
    /// left alone.
    pub fn assign_node_zones(&mut self) -> AssignReport {
        let mut report = AssignReport::new();
        let mut located = Vec::new();

        for node in self.nodes.values() {
            let found = self.grid.zone_of_point(node.lon(), node.lat(), &self.zones);
            if let Some(Some(zone_id)) = report.record(node.id(), found) {
                located.push((node.id().to_string(), zone_id));
            }
        }

        for (node_id, zone_id) in &located {
            if let Some(node) = self.nodes.get_mut(node_id.as_str()) {
                node.add_belonging(category::BELONG_ZONE_ID, zone_id.as_str());
            }
            if let Some(zone) = self.zones.get_mut(zone_id.as_str()) {
                zone.inner.add_inner_element(category::INNER_NODE_ID, node_id.as_str());
            }
        }

        log::info!(
            "Placed {} of {} nodes in zones ({} failed)",
            located.len(),
            self.nodes.len(),
            report.failures.len()
        );
        report
    }

    /// The `k` edges whose segments lie nearest to a coordinate, by probing
    /// the edge tree. Closest first, each edge once.
    pub fn nearest_edges(&mut self, lon: f64, lat: f64, k: usize) -> Result<Vec<EdgeId>> {
        let handles = self
            .edge_tree
            .probe_nearest(lon, lat, Some(EntityKind::Edge), k)?;
        Ok(handles
            .into_iter()
            .filter_map(|handle| match handle {
                EntityHandle::Edge(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    /// [`nearest_edges`](Self::nearest_edges) with `k` taken from
    /// [`Config::probe_neighbors`].
    pub fn probe_edges(&mut self, lon: f64, lat: f64) -> Result<Vec<EdgeId>> {
        let k = self.config.probe_neighbors;
        self.nearest_edges(lon, lat, k)
    }

    /// Nodes within `meters` of a node, the node itself included. The
    /// search circle is added to the grid as a zone named `<id>_circle`.
    pub fn nodes_near(&mut self, node_id: &str, meters: f64) -> Result<Vec<String>> {
        let node = self.nodes.require(node_id)?;
        self.grid.nodes_near(node, meters, &self.nodes)
    }

    /// Up to `k` other nodes nearest to a node.
    pub fn nearest_nodes(&self, node_id: &str, k: usize) -> Result<Vec<String>> {
        let node = self.nodes.require(node_id)?;
        Ok(self
            .zone_tree
            .nearest_nodes(node.lon(), node.lat(), k, Some(node_id)))
    }

    /// Current entities as one document.
    pub fn to_document(&self) -> NetworkDocument {
        NetworkDocument {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            zones: self.zones.clone(),
        }
    }

    /// Write the grid cells so a later build can skip grid construction.
    pub fn save_grid_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.grid.cells().save_json(path.as_ref())?;
        log::info!(
            "Saved {} grid cells to {}",
            self.grid.cell_count(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Like [`match_point_to_nearest_edge`](Self::match_point_to_nearest_edge),
    /// but a bridging failure becomes an error.
    pub fn require_match(&self, lon: f64, lat: f64) -> Result<Option<EdgeMatch>> {
        match self.match_point_to_nearest_edge(lon, lat)? {
            MatchResult::Matched(found) => Ok(Some(found)),
            MatchResult::NotFound => Ok(None),
            MatchResult::NoReachableEdges { cell } => Err(GeoMatchError::NoReachableEdges { cell }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::geometry::rect_polygon;
    use crate::model::{Edge, Node, Zone};
    use geo::line_string;

    fn network() -> SpatialNetwork {
        let nodes: NodeCollection = [
            Node::new("1", 114.30, 22.60),
            Node::new("2", 114.31, 22.60),
            Node::new("3", 114.305, 22.605),
            Node::new("4", 114.325, 22.605),
        ]
        .into_iter()
        .collect();
        let edges: EdgeCollection = [
            Edge::from_line("1", "2", line_string![(x: 114.30, y: 22.60), (x: 114.31, y: 22.60)]),
            Edge::from_line("2", "1", line_string![(x: 114.31, y: 22.60), (x: 114.30, y: 22.60)]),
        ]
        .into_iter()
        .collect();
        let zones: ZoneCollection = [
            Zone::from_polygon("west", rect_polygon(114.29, 22.59, 114.32, 22.62)),
            Zone::from_polygon("east", rect_polygon(114.32, 22.59, 114.35, 22.62)),
            Zone::from_polygon("inner", rect_polygon(114.30, 22.60, 114.31, 22.61)),
        ]
        .into_iter()
        .collect();

        NetworkBuilder::new()
            .nodes(nodes)
            .edges(edges)
            .zones(zones)
            .build()
            .unwrap()
    }

    #[test]
    fn test_match_point() {
        let network = network();
        let result = network.match_point_to_nearest_edge(114.305, 22.601).unwrap();
        let found = result.into_match().unwrap();

        assert_eq!(found.edge.unordered(), ("1", "2"));
        assert!((found.point.y() - 22.60).abs() < 1e-6);
        assert!((114.30..=114.31).contains(&found.point.x()));
    }

    #[test]
    fn test_match_points_batch() {
        let network = network();
        let results = network.match_points(&[(114.305, 22.601), (200.0, 0.0)]);
        assert!(matches!(results[0], Ok(MatchResult::Matched(_))));
        assert!(matches!(
            results[1],
            Err(GeoMatchError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_split_at_match() {
        let network = network();
        let found = network.require_match(114.305, 22.601).unwrap().unwrap();
        let (head, tail) = network.split_at_match(&found).unwrap();
        assert_eq!(head.0.last(), tail.0.first());
    }

    #[test]
    fn test_zone_queries() {
        let network = network();
        assert_eq!(
            network.zone_containing(114.33, 22.60).unwrap().as_deref(),
            Some("east")
        );
        assert_eq!(network.neighboring_zones("west").unwrap(), vec!["east"]);

        let nodes = network.entities_in_zone("east", EntityKind::Node).unwrap();
        assert_eq!(nodes, vec![ElementRef::from("4")]);

        let zones = network.entities_in_zone("west", EntityKind::Zone).unwrap();
        assert_eq!(zones, vec![ElementRef::from("inner")]);

        let edges = network.entities_in_zone("west", EntityKind::Edge).unwrap();
        assert_eq!(edges.len(), 2);

        assert!(matches!(
            network.entities_in_zone("nowhere", EntityKind::Node),
            Err(GeoMatchError::InconsistentIndex { .. })
        ));
    }

    #[test]
    fn test_assign_node_zones() {
        let mut network = network();
        let report = network.assign_node_zones();
        assert!(report.is_clean());

        let node = network.nodes().get("4").unwrap();
        assert_eq!(node.belonging_of(category::BELONG_ZONE_ID), ["east".to_string()]);
        assert!(network
            .zones()
            .get("east")
            .unwrap()
            .inner
            .contains(category::INNER_NODE_ID, &ElementRef::from("4")));
    }

    #[test]
    fn test_nearest_edges_and_nodes() {
        let mut network = network();
        let edges = network.nearest_edges(114.305, 22.601, 1).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].unordered(), ("1", "2"));

        assert_eq!(network.nearest_nodes("1", 1).unwrap(), vec!["3"]);

        let near = network.nodes_near("3", 1_000.0).unwrap();
        assert!(near.contains(&"3".to_string()));
        assert!(!near.contains(&"4".to_string()));
    }

    #[test]
    fn test_probe_edges_uses_configured_k() {
        let edges: EdgeCollection = [
            Edge::from_line("1", "2", line_string![(x: 114.30, y: 22.60), (x: 114.31, y: 22.60)]),
            Edge::from_line("2", "3", line_string![(x: 114.30, y: 22.602), (x: 114.31, y: 22.602)]),
            Edge::from_line("3", "4", line_string![(x: 114.30, y: 22.605), (x: 114.31, y: 22.605)]),
        ]
        .into_iter()
        .collect();

        let mut network = NetworkBuilder::new().edges(edges.clone()).build().unwrap();
        assert_eq!(network.config().probe_neighbors, 2);
        assert_eq!(
            network.probe_edges(114.305, 22.6005).unwrap(),
            vec![EdgeId::new("1", "2"), EdgeId::new("2", "3")]
        );

        let mut single = NetworkBuilder::new()
            .config(Config::default().with_probe_neighbors(1))
            .edges(edges)
            .build()
            .unwrap();
        assert_eq!(single.probe_edges(114.305, 22.6005).unwrap(), vec![EdgeId::new("1", "2")]);
    }
}
