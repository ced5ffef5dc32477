use crate::compute::geometry::LazyGeometry;
use crate::error::Result;
use crate::model::NodeCollection;
use geo::LineString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Directed edge identity: the ordered `(from, to)` node id pair.
///
/// `(a, b)` and `(b, a)` are different edges. Use [`EdgeId::unordered`] when
/// the direction should not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct EdgeId {
    pub from: String,
    pub to: String,
}

impl EdgeId {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.to.clone(), self.from.clone())
    }

    /// The endpoint pair sorted, identical for both directions.
    pub fn unordered(&self) -> (&str, &str) {
        if self.from <= self.to {
            (&self.from, &self.to)
        } else {
            (&self.to, &self.from)
        }
    }
}

impl From<(String, String)> for EdgeId {
    fn from((from, to): (String, String)) -> Self {
        Self { from, to }
    }
}

impl From<EdgeId> for (String, String) {
    fn from(id: EdgeId) -> Self {
        (id.from, id.to)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// A directed link between two nodes with a polyline geometry and optional
/// per-resource costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "from_node_id", deserialize_with = "deserialize_id")]
    from: String,

    #[serde(rename = "to_node_id", deserialize_with = "deserialize_id")]
    to: String,

    #[serde(default)]
    pub geometry: LazyGeometry<LineString<f64>>,

    /// Variable cost per resource type
    #[serde(rename = "res_cost_dict", default, deserialize_with = "null_as_default")]
    pub variable_cost: BTreeMap<String, f64>,

    /// Fixed cost per resource type
    #[serde(rename = "fix_res_cost", default, deserialize_with = "null_as_default")]
    pub fixed_cost: BTreeMap<String, f64>,

    #[serde(default)]
    pub edge_type: Option<String>,

    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Edge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        geometry: LazyGeometry<LineString<f64>>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            geometry,
            variable_cost: BTreeMap::new(),
            fixed_cost: BTreeMap::new(),
            edge_type: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn from_line(from: impl Into<String>, to: impl Into<String>, line: LineString<f64>) -> Self {
        Self::new(from, to, LazyGeometry::from_native(line))
    }

    pub fn with_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = Some(edge_type.into());
        self
    }

    pub fn id(&self) -> EdgeId {
        EdgeId::new(self.from.clone(), self.to.clone())
    }

    pub fn from_node_id(&self) -> &str {
        &self.from
    }

    pub fn to_node_id(&self) -> &str {
        &self.to
    }

    /// Parsed polyline.
    pub fn line(&self) -> Result<&LineString<f64>> {
        self.geometry.get()
    }

    /// Both endpoints are present in `nodes`.
    pub fn is_in_node_collection(&self, nodes: &NodeCollection) -> bool {
        nodes.contains(&self.from) && nodes.contains(&self.to)
    }

    pub fn cost(&self, resource: &str) -> Option<f64> {
        self.variable_cost.get(resource).copied()
    }

    pub fn set_cost(&mut self, resource: impl Into<String>, cost: f64) {
        self.variable_cost.insert(resource.into(), cost);
    }

    pub fn fixed_cost(&self, resource: &str) -> Option<f64> {
        self.fixed_cost.get(resource).copied()
    }

    pub fn set_fixed_cost(&mut self, resource: impl Into<String>, cost: f64) {
        self.fixed_cost.insert(resource.into(), cost);
    }

    pub fn cost_types(&self) -> impl Iterator<Item = &str> {
        self.variable_cost.keys().map(String::as_str)
    }
}

/// Node ids are sometimes written as JSON numbers.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
