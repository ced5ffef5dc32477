use crate::compute::geometry;
use geo::{Point, Polygon};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A graph vertex with a fixed WGS84 position.
///
/// The coordinate is set once at construction. Everything the index learns
/// about a node (its geohash cell, the zones it falls in) goes into the
/// belonging map, which only grows until a category is explicitly reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "node_id")]
    id: String,

    #[serde(rename = "node_coord")]
    coord: (f64, f64),

    #[serde(rename = "node_name", default)]
    pub name: Option<String>,

    #[serde(default)]
    pub node_type: Option<String>,

    #[serde(
        rename = "neighbor_node_id_set",
        default,
        deserialize_with = "deserialize_neighbors"
    )]
    neighbors: BTreeSet<String>,

    #[serde(
        rename = "belong_element_id_dict",
        default,
        deserialize_with = "deserialize_belonging"
    )]
    belonging: BTreeMap<String, Vec<String>>,

    /// Fields without a dedicated slot, kept so documents survive a round trip
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: id.into(),
            coord: (lon, lat),
            name: None,
            node_type: None,
            neighbors: BTreeSet::new(),
            belonging: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn coord(&self) -> (f64, f64) {
        self.coord
    }

    pub fn lon(&self) -> f64 {
        self.coord.0
    }

    pub fn lat(&self) -> f64 {
        self.coord.1
    }

    pub fn point(&self) -> Point<f64> {
        Point::new(self.coord.0, self.coord.1)
    }

    pub fn neighbors(&self) -> &BTreeSet<String> {
        &self.neighbors
    }

    pub fn add_neighbor(&mut self, node_id: impl Into<String>) {
        self.neighbors.insert(node_id.into());
    }

    pub fn belonging(&self) -> &BTreeMap<String, Vec<String>> {
        &self.belonging
    }

    /// Ids recorded under `category`, in insertion order.
    pub fn belonging_of(&self, category: &str) -> &[String] {
        self.belonging
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Append `element_id` under `category` unless it is already listed.
    ///
    /// Returns `true` if the id was added.
    pub fn add_belonging(&mut self, category: &str, element_id: impl Into<String>) -> bool {
        let element_id = element_id.into();
        let ids = self.belonging.entry(category.to_string()).or_default();
        if ids.contains(&element_id) {
            false
        } else {
            ids.push(element_id);
            true
        }
    }

    /// Drop every id recorded under `category`.
    pub fn reset_belonging(&mut self, category: &str) {
        self.belonging.remove(category);
    }

    /// Strictly inside the polygon; points on the boundary are outside.
    pub fn is_in_polygon(&self, polygon: &Polygon<f64>) -> bool {
        geometry::within(&self.point(), polygon)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NeighborRepr {
    List(Vec<String>),
    Literal(String),
}

/// Neighbour sets arrive either as a JSON array or as a set literal string
/// such as `{'12', '13'}` (with `set()` for the empty set).
fn deserialize_neighbors<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<NeighborRepr>::deserialize(deserializer)?;
    Ok(match repr {
        None => BTreeSet::new(),
        Some(NeighborRepr::List(ids)) => ids.into_iter().collect(),
        Some(NeighborRepr::Literal(text)) => parse_set_literal(&text),
    })
}

fn parse_set_literal(text: &str) -> BTreeSet<String> {
    let trimmed = text.trim();
    if trimmed == "set()" {
        return BTreeSet::new();
    }

    trimmed
        .trim_start_matches(['{', '['])
        .trim_end_matches(['}', ']'])
        .split(',')
        .map(|item| item.trim().trim_matches(['\'', '"']).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn deserialize_belonging<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Vec<Value>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(category, ids)| {
            let ids = ids
                .into_iter()
                .filter_map(|id| match id {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            (category, ids)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::geometry::rect_polygon;

    #[test]
    fn test_belonging_is_append_only_and_deduplicated() {
        let mut node = Node::new("n1", 114.0, 22.0);
        assert!(node.add_belonging("belong_zone_id", "z1"));
        assert!(node.add_belonging("belong_zone_id", "z2"));
        assert!(!node.add_belonging("belong_zone_id", "z1"));
        assert_eq!(node.belonging_of("belong_zone_id"), ["z1", "z2"]);

        node.reset_belonging("belong_zone_id");
        assert!(node.belonging_of("belong_zone_id").is_empty());
    }

    #[test]
    fn test_is_in_polygon() {
        let square = rect_polygon(114.0, 22.0, 114.1, 22.1);
        assert!(Node::new("a", 114.05, 22.05).is_in_polygon(&square));
        assert!(!Node::new("b", 114.2, 22.05).is_in_polygon(&square));
    }

    #[test]
    fn test_deserialize_legacy_node() {
        let json = r#"{
            "node_id": "17",
            "node_coord": [114.05, 22.54],
            "node_name": "Stop 17",
            "node_type": "Walk",
            "neighbor_node_id_set": "{'18', '16'}",
            "belong_element_id_dict": {"geo_hash_code": ["ws10k0"], "belong_zone_id": [null]}
        }"#;

        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.id(), "17");
        assert_eq!(node.coord(), (114.05, 22.54));
        assert_eq!(node.neighbors().len(), 2);
        assert!(node.neighbors().contains("16"));
        assert_eq!(node.belonging_of("geo_hash_code"), ["ws10k0"]);
        assert!(node.belonging_of("belong_zone_id").is_empty());
        assert!(node.attributes.is_empty());
    }

    #[test]
    fn test_deserialize_minimal_node_keeps_extra_fields() {
        let json = r#"{"node_id": "a", "node_coord": [1.0, 2.0], "neighbor_node_id_set": "set()", "platform": 3}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert!(node.neighbors().is_empty());
        assert_eq!(node.attributes.get("platform"), Some(&Value::from(3)));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["platform"], Value::from(3));
        assert_eq!(back["neighbor_node_id_set"], Value::Array(vec![]));
    }
}
