use crate::compute::geometry;
use crate::error::{GeoMatchError, Result};
use crate::model::{Edge, EdgeId, ElementRef, EntityKind, Node, Zone};
use geo::{Point, Polygon};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Something stored in an [`ElementCollection`].
pub trait Entity: Clone + Serialize + DeserializeOwned {
    type Id: Ord + Clone + fmt::Display + fmt::Debug;

    const KIND: EntityKind;

    fn entity_id(&self) -> Self::Id;
}

impl Entity for Node {
    type Id = String;
    const KIND: EntityKind = EntityKind::Node;

    fn entity_id(&self) -> String {
        self.id().to_string()
    }
}

impl Entity for Edge {
    type Id = EdgeId;
    const KIND: EntityKind = EntityKind::Edge;

    fn entity_id(&self) -> EdgeId {
        self.id()
    }
}

impl Entity for Zone {
    type Id = String;
    const KIND: EntityKind = EntityKind::Zone;

    fn entity_id(&self) -> String {
        self.id().to_string()
    }
}

/// Id-keyed owner of one entity kind. Iteration is in id order.
#[derive(Debug, Clone)]
pub struct ElementCollection<E: Entity> {
    elements: BTreeMap<E::Id, E>,
}

pub type NodeCollection = ElementCollection<Node>;
pub type EdgeCollection = ElementCollection<Edge>;
pub type ZoneCollection = ElementCollection<Zone>;

impl<E: Entity> Default for ElementCollection<E> {
    fn default() -> Self {
        Self {
            elements: BTreeMap::new(),
        }
    }
}

impl<E: Entity> ElementCollection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Insert or replace. Returns the entity previously stored under the id.
    pub fn add(&mut self, element: E) -> Option<E> {
        self.elements.insert(element.entity_id(), element)
    }

    pub fn get<Q>(&self, id: &Q) -> Option<&E>
    where
        E::Id: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.elements.get(id)
    }

    pub fn get_mut<Q>(&mut self, id: &Q) -> Option<&mut E>
    where
        E::Id: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.elements.get_mut(id)
    }

    /// Like [`get`](Self::get), but a missing id is an index inconsistency.
    pub fn require<Q>(&self, id: &Q) -> Result<&E>
    where
        E::Id: Borrow<Q>,
        Q: Ord + fmt::Display + ?Sized,
    {
        self.elements
            .get(id)
            .ok_or_else(|| GeoMatchError::inconsistent(E::KIND, id))
    }

    pub fn require_mut<Q>(&mut self, id: &Q) -> Result<&mut E>
    where
        E::Id: Borrow<Q>,
        Q: Ord + fmt::Display + ?Sized,
    {
        self.elements
            .get_mut(id)
            .ok_or_else(|| GeoMatchError::inconsistent(E::KIND, id))
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        E::Id: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.elements.contains_key(id)
    }

    /// Add entities from `other` whose ids are not present yet.
    /// Returns how many were added.
    pub fn merge(&mut self, other: &Self) -> usize {
        let mut added = 0;
        for (id, element) in &other.elements {
            if !self.elements.contains_key(id) {
                self.elements.insert(id.clone(), element.clone());
                added += 1;
            }
        }
        added
    }

    /// Copy holding only the listed ids.
    pub fn select_by_ids<'a, I>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = &'a E::Id>,
        E::Id: 'a,
    {
        ids.into_iter()
            .filter_map(|id| self.elements.get(id))
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &E::Id> {
        self.elements.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &E> {
        self.elements.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.elements.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&E::Id, &E)> {
        self.elements.iter()
    }

    /// `{ "<tag>": [entity, ...] }`
    pub fn to_document(&self) -> Result<Value> {
        let list = self
            .elements
            .values()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut doc = Map::new();
        doc.insert(E::KIND.tag().to_string(), Value::Array(list));
        Ok(Value::Object(doc))
    }

    /// Decode a document holding only this collection's entity kind.
    pub fn from_document(doc: &Value) -> Result<Self> {
        let mut collection = Self::new();
        for (tag, list) in document_sections(doc)? {
            match EntityKind::from_tag(tag) {
                Some(kind) if kind == E::KIND => collection.extend_from_values(list)?,
                _ => {
                    return Err(GeoMatchError::InvalidDocument(format!(
                        "expected {} entities, found section '{}'",
                        E::KIND,
                        tag
                    )));
                }
            }
        }
        Ok(collection)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_document(&serde_json::from_str(json)?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let collection = Self::from_json_str(&text)?;
        log::info!(
            "Loaded {} {} entities from {}",
            collection.len(),
            E::KIND,
            path.as_ref().display()
        );
        Ok(collection)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string(&self.to_document()?)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn extend_from_values(&mut self, list: &[Value]) -> Result<()> {
        for value in list {
            let element: E = serde_json::from_value(value.clone())?;
            if let Some(previous) = self.add(element) {
                log::debug!(
                    "Duplicate {} id {} in document; keeping the later entry",
                    E::KIND,
                    previous.entity_id()
                );
            }
        }
        Ok(())
    }
}

impl<E: Entity> FromIterator<E> for ElementCollection<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut collection = Self::new();
        for element in iter {
            collection.add(element);
        }
        collection
    }
}

impl<E: Entity> Extend<E> for ElementCollection<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for element in iter {
            self.add(element);
        }
    }
}

impl<'a, E: Entity> IntoIterator for &'a ElementCollection<E> {
    type Item = (&'a E::Id, &'a E);
    type IntoIter = std::collections::btree_map::Iter<'a, E::Id, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl NodeCollection {
    /// Copy holding the nodes strictly inside `polygon`.
    pub fn select_by_polygon(&self, polygon: &Polygon<f64>) -> Self {
        self.values()
            .filter(|node| node.is_in_polygon(polygon))
            .cloned()
            .collect()
    }

    /// Copy holding the nodes not strictly inside `polygon`.
    pub fn select_outside_polygon(&self, polygon: &Polygon<f64>) -> Self {
        self.values()
            .filter(|node| !node.is_in_polygon(polygon))
            .cloned()
            .collect()
    }

    /// First node (in id order) at exactly `coord`.
    pub fn id_by_coord(&self, coord: (f64, f64)) -> Option<&str> {
        self.values()
            .find(|node| node.coord() == coord)
            .map(Node::id)
    }
}

impl EdgeCollection {
    /// Copy holding the edges whose endpoints are both in `nodes`.
    pub fn select_by_nodes(&self, nodes: &NodeCollection) -> Self {
        self.values()
            .filter(|edge| edge.is_in_node_collection(nodes))
            .cloned()
            .collect()
    }

    /// Every node id referenced as an edge endpoint.
    pub fn node_ids(&self) -> BTreeSet<String> {
        self.ids()
            .flat_map(|id| [id.from.clone(), id.to.clone()])
            .collect()
    }
}

impl ZoneCollection {
    /// Copy whose zones keep only ids present in `nodes`. Zones left with no
    /// entries at all are dropped.
    pub fn select_by_nodes(&self, nodes: &NodeCollection) -> Self {
        self.values()
            .map(|zone| {
                zone.retain_known(|element| match element {
                    ElementRef::Id(id) => nodes.contains(id.as_str()),
                    ElementRef::Pair(..) => false,
                })
            })
            .filter(|zone| !zone.is_empty())
            .collect()
    }

    /// Linear scan for the first zone (in id order) strictly containing the
    /// coordinate.
    pub fn zone_containing_coord(&self, lon: f64, lat: f64) -> Result<Option<&Zone>> {
        let point = Point::new(lon, lat);
        for zone in self.values() {
            if geometry::within(&point, zone.polygon()?) {
                return Ok(Some(zone));
            }
        }
        Ok(None)
    }
}

/// All three entity kinds decoded from one mixed document.
#[derive(Debug, Default, Clone)]
pub struct NetworkDocument {
    pub nodes: NodeCollection,
    pub edges: EdgeCollection,
    pub zones: ZoneCollection,
}

impl NetworkDocument {
    pub fn to_document(&self) -> Result<Value> {
        let mut doc = Map::new();
        for section in [
            self.nodes.to_document()?,
            self.edges.to_document()?,
            self.zones.to_document()?,
        ] {
            if let Value::Object(map) = section {
                doc.extend(map);
            }
        }
        Ok(Value::Object(doc))
    }
}

/// Decode a document whose sections may hold any entity kind. Each section
/// tag resolves to a kind, and that kind's decoder handles the entries.
pub fn decode_document(doc: &Value) -> Result<NetworkDocument> {
    let mut decoded = NetworkDocument::default();
    for (tag, list) in document_sections(doc)? {
        match EntityKind::from_tag(tag) {
            Some(EntityKind::Node) => decoded.nodes.extend_from_values(list)?,
            Some(EntityKind::Edge) => decoded.edges.extend_from_values(list)?,
            Some(EntityKind::Zone) => decoded.zones.extend_from_values(list)?,
            None => {
                return Err(GeoMatchError::InvalidDocument(format!(
                    "unknown entity tag '{}'",
                    tag
                )));
            }
        }
    }
    Ok(decoded)
}

fn document_sections(doc: &Value) -> Result<Vec<(&str, &[Value])>> {
    let object = doc.as_object().ok_or_else(|| {
        GeoMatchError::InvalidDocument("document must be a JSON object".to_string())
    })?;

    object
        .iter()
        .map(|(tag, list)| match list {
            Value::Array(items) => Ok((tag.as_str(), items.as_slice())),
            _ => Err(GeoMatchError::InvalidDocument(format!(
                "section '{}' must be an array",
                tag
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::geometry::rect_polygon;
    use crate::model::category;
    use geo::line_string;

    fn sample_nodes() -> NodeCollection {
        [
            Node::new("a", 114.01, 22.01),
            Node::new("b", 114.02, 22.02),
            Node::new("c", 114.5, 22.5),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_require_reports_inconsistency() {
        let nodes = sample_nodes();
        assert!(nodes.require("a").is_ok());

        let err = nodes.require("zz").unwrap_err();
        assert!(matches!(
            err,
            GeoMatchError::InconsistentIndex {
                kind: EntityKind::Node,
                ..
            }
        ));
    }

    #[test]
    fn test_merge_keeps_existing() {
        let mut nodes = sample_nodes();
        let mut other = NodeCollection::new();
        other.add(Node::new("a", 0.0, 0.0));
        other.add(Node::new("d", 1.0, 1.0));

        assert_eq!(nodes.merge(&other), 1);
        assert_eq!(nodes.get("a").unwrap().coord(), (114.01, 22.01));
        assert!(nodes.contains("d"));
    }

    #[test]
    fn test_select_by_polygon_and_coord() {
        let nodes = sample_nodes();
        let square = rect_polygon(114.0, 22.0, 114.1, 22.1);

        let inside = nodes.select_by_polygon(&square);
        assert_eq!(inside.len(), 2);
        assert_eq!(nodes.select_outside_polygon(&square).len(), 1);
        assert_eq!(nodes.id_by_coord((114.5, 22.5)), Some("c"));
        assert_eq!(nodes.id_by_coord((0.0, 0.0)), None);
    }

    #[test]
    fn test_edges_select_by_nodes() {
        let edges: EdgeCollection = [
            Edge::from_line("a", "b", line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
            Edge::from_line("b", "x", line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]),
        ]
        .into_iter()
        .collect();

        let selected = edges.select_by_nodes(&sample_nodes());
        assert_eq!(selected.len(), 1);
        assert!(selected.contains(&EdgeId::new("a", "b")));
        assert_eq!(edges.node_ids().len(), 3);
    }

    #[test]
    fn test_zones_select_by_nodes_prunes_empty() {
        let mut kept = Zone::from_polygon("z1", rect_polygon(114.0, 22.0, 114.1, 22.1));
        kept.inner
            .add_inner_elements(category::INNER_NODE_ID, ["a", "gone"]);
        let mut pruned = Zone::from_polygon("z2", rect_polygon(115.0, 22.0, 115.1, 22.1));
        pruned.inner.add_inner_element(category::INNER_NODE_ID, "gone");

        let zones: ZoneCollection = [kept, pruned].into_iter().collect();
        let selected = zones.select_by_nodes(&sample_nodes());

        assert_eq!(selected.len(), 1);
        assert_eq!(
            selected.get("z1").unwrap().inner.get(category::INNER_NODE_ID),
            [ElementRef::from("a")]
        );
    }

    #[test]
    fn test_zone_containing_coord() {
        let zones: ZoneCollection = [
            Zone::from_polygon("west", rect_polygon(0.0, 0.0, 1.0, 1.0)),
            Zone::from_polygon("east", rect_polygon(1.0, 0.0, 2.0, 1.0)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            zones.zone_containing_coord(1.5, 0.5).unwrap().map(Zone::id),
            Some("east")
        );
        assert!(zones.zone_containing_coord(5.0, 5.0).unwrap().is_none());
    }

    #[test]
    fn test_document_roundtrip_through_file() {
        let nodes = sample_nodes();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");

        nodes.save_json(&path).unwrap();
        let loaded = NodeCollection::load_json(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get("b"), nodes.get("b"));
    }

    #[test]
    fn test_legacy_document_sections() {
        let doc = serde_json::json!({
            "NodeWithGPSAndTypeAndNeighborSet": [
                {"node_id": "1", "node_coord": [114.0, 22.0], "node_name": null,
                 "node_type": "Walk", "neighbor_node_id_set": "{'2'}"}
            ],
            "EdgeWithResCostAndFixCost": [
                {"from_node_id": "1", "to_node_id": "2", "geometry": "LINESTRING (114 22, 114.1 22)",
                 "res_cost_dict": {}, "fix_res_cost": {}}
            ]
        });

        let decoded = decode_document(&doc).unwrap();
        assert_eq!(decoded.nodes.len(), 1);
        assert_eq!(decoded.edges.len(), 1);
        assert!(decoded.zones.is_empty());

        assert!(NodeCollection::from_document(&doc).is_err());
        assert!(decode_document(&serde_json::json!({"Route": []})).is_err());
    }
}
