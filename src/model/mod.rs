//! Entity model: nodes, edges and zones, plus the id-keyed collections that
//! own them.
//!
//! Entities never hold references to each other. A node that belongs to a
//! zone records the zone id, a zone that contains an edge records the edge's
//! endpoint pair, and every lookup goes back through the owning collection.

mod collection;
mod edge;
mod node;
mod zone;

pub use collection::{
    EdgeCollection, ElementCollection, Entity, NetworkDocument, NodeCollection, ZoneCollection,
    decode_document,
};
pub use edge::{Edge, EdgeId};
pub use node::Node;
pub use zone::{InnerIndex, Zone};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category names used in node belonging maps and zone inner indexes.
pub mod category {
    /// Geohash cell of a node
    pub const GEO_HASH_CODE: &str = "geo_hash_code";
    /// Zones a node or grid cell belongs to
    pub const BELONG_ZONE_ID: &str = "belong_zone_id";
    /// Grid cells lying entirely inside a zone
    pub const ZONE_CONTAINS_GEO_HASH_CODE: &str = "zone_contains_geo_hash_code";
    /// Grid cells crossing a zone's boundary
    pub const ZONE_INTERSECTS_GEO_HASH_CODE: &str = "zone_intersects_geo_hash_code";
    /// Edges passing through a grid cell
    pub const INNER_LINK_EDGE: &str = "inner_link_edge";
    /// Adjacent grid cells present in the grid
    pub const NEIGHBOUR_ZONE_ID_LIST: &str = "neighbour_zone_id_list";
    /// Nodes located in a grid cell
    pub const INNER_NODE_ID: &str = "inner_node_id";
}

/// Zone type given to geohash grid cells.
pub const GEO_HASH_BOX: &str = "geo_hash_box";

/// Closed set of entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Edge,
    Zone,
}

impl EntityKind {
    /// Resolve a document tag to its kind.
    ///
    /// Besides the canonical tags this accepts the class names written by
    /// older exporters, which encoded each attribute set as its own type.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Node"
            | "NodeWithGPS"
            | "NodeWithGPSAndName"
            | "NodeWithGPSAndSpecificType"
            | "NodeWithGPSAndTypeAndNeighborSet"
            | "NodeWithGPSAndTypeAndNeighborSetAndBelonging" => Some(Self::Node),
            "Edge"
            | "EdgeWithResCost"
            | "EdgeWithResCostAndFixCost"
            | "EdgeWithResCostAndFixCostAndEdgeType"
            | "EdgeWithResCostAndFixCostAndEdgeTypeAndRouteID"
            | "EdgeWithResCostAndFixCostAndEdgeTypeAndRouteIDAndRouteName"
            | "EdgeWithResCostAndFixCostAndEdgeTypeAndRouteIDAndRoutePriority" => Some(Self::Edge),
            "Zone" => Some(Self::Zone),
            _ => None,
        }
    }

    /// Canonical tag written to documents.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Node => "Node",
            Self::Edge => "Edge",
            Self::Zone => "Zone",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Edge => write!(f, "edge"),
            Self::Zone => write!(f, "zone"),
        }
    }
}

/// An entry in an inner index or belonging list.
///
/// Plain ids serialise as strings; edge endpoint pairs as two-element arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementRef {
    Id(String),
    Pair(String, String),
}

impl ElementRef {
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Pair(..) => None,
        }
    }

    pub fn as_edge_id(&self) -> Option<EdgeId> {
        match self {
            Self::Pair(from, to) => Some(EdgeId::new(from.as_str(), to.as_str())),
            Self::Id(_) => None,
        }
    }
}

impl From<&str> for ElementRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for ElementRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<EdgeId> for ElementRef {
    fn from(id: EdgeId) -> Self {
        Self::Pair(id.from, id.to)
    }
}

impl From<&EdgeId> for ElementRef {
    fn from(id: &EdgeId) -> Self {
        Self::Pair(id.from.clone(), id.to.clone())
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Pair(from, to) => write!(f, "({}, {})", from, to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_tags() {
        assert_eq!(
            EntityKind::from_tag("NodeWithGPSAndTypeAndNeighborSetAndBelonging"),
            Some(EntityKind::Node)
        );
        assert_eq!(
            EntityKind::from_tag("EdgeWithResCostAndFixCost"),
            Some(EntityKind::Edge)
        );
        assert_eq!(EntityKind::from_tag("Zone"), Some(EntityKind::Zone));
        assert_eq!(EntityKind::from_tag("Route"), None);
    }

    #[test]
    fn test_element_ref_serialisation() {
        let id = ElementRef::from("zone-1");
        let pair = ElementRef::from(EdgeId::new("a", "b"));

        assert_eq!(serde_json::to_string(&id).unwrap(), r#""zone-1""#);
        assert_eq!(serde_json::to_string(&pair).unwrap(), r#"["a","b"]"#);

        let back: Vec<ElementRef> = serde_json::from_str(r#"["x", ["a", "b"]]"#).unwrap();
        assert_eq!(back, vec![ElementRef::from("x"), pair]);
        assert_eq!(id.as_id(), Some("zone-1"));
    }
}
