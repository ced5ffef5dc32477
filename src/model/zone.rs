use crate::compute::geometry::LazyGeometry;
use crate::error::Result;
use crate::model::{ElementRef, GEO_HASH_BOX};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-category id lists attached to a zone.
///
/// This is the only mutable part of a zone. Lists keep insertion order and
/// never hold the same entry twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InnerIndex(BTreeMap<String, Vec<ElementRef>>);

impl InnerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: &str) -> &[ElementRef] {
        self.0.get(category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.0.contains_key(category)
    }

    pub fn contains(&self, category: &str, element: &ElementRef) -> bool {
        self.get(category).contains(element)
    }

    /// Append one entry unless it is already listed. Returns `true` if added.
    pub fn add_inner_element(&mut self, category: &str, element: impl Into<ElementRef>) -> bool {
        let element = element.into();
        let list = self.0.entry(category.to_string()).or_default();
        if list.contains(&element) {
            false
        } else {
            list.push(element);
            true
        }
    }

    /// Append every entry not yet listed, creating the category if needed.
    /// Returns the number of entries added.
    pub fn add_inner_elements<I, E>(&mut self, category: &str, elements: I) -> usize
    where
        I: IntoIterator<Item = E>,
        E: Into<ElementRef>,
    {
        let list = self.0.entry(category.to_string()).or_default();
        let mut added = 0;
        for element in elements {
            let element = element.into();
            if !list.contains(&element) {
                list.push(element);
                added += 1;
            }
        }
        added
    }

    /// Replace a category's list wholesale.
    pub fn update_inner_elements(&mut self, category: &str, elements: Vec<ElementRef>) {
        let mut deduped: Vec<ElementRef> = Vec::with_capacity(elements.len());
        for element in elements {
            if !deduped.contains(&element) {
                deduped.push(element);
            }
        }
        self.0.insert(category.to_string(), deduped);
    }

    pub fn reset_category(&mut self, category: &str) {
        self.0.remove(category);
    }

    pub fn reset(&mut self) {
        self.0.clear();
    }

    /// Any category holds at least one entry.
    pub fn has_element(&self) -> bool {
        self.0.values().any(|list| !list.is_empty())
    }

    /// Copy keeping only the entries `is_known` accepts. Categories stay,
    /// possibly empty.
    pub fn retain_known<F>(&self, mut is_known: F) -> Self
    where
        F: FnMut(&ElementRef) -> bool,
    {
        Self(
            self.0
                .iter()
                .map(|(category, list)| {
                    let kept = list.iter().filter(|e| is_known(e)).cloned().collect();
                    (category.clone(), kept)
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ElementRef])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// A polygonal area, either an input zone or a geohash grid cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    #[serde(rename = "zone_id")]
    id: String,

    #[serde(default)]
    pub zone_type: Option<String>,

    pub polygon: LazyGeometry<Polygon<f64>>,

    #[serde(rename = "inner_elements_index_dict", default)]
    pub inner: InnerIndex,
}

impl Zone {
    pub fn new(id: impl Into<String>, polygon: LazyGeometry<Polygon<f64>>) -> Self {
        Self {
            id: id.into(),
            zone_type: None,
            polygon,
            inner: InnerIndex::new(),
        }
    }

    pub fn from_polygon(id: impl Into<String>, polygon: Polygon<f64>) -> Self {
        Self::new(id, LazyGeometry::from_native(polygon))
    }

    pub fn with_type(mut self, zone_type: impl Into<String>) -> Self {
        self.zone_type = Some(zone_type.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parsed polygon.
    pub fn polygon(&self) -> Result<&Polygon<f64>> {
        self.polygon.get()
    }

    pub fn is_grid_cell(&self) -> bool {
        self.zone_type.as_deref() == Some(GEO_HASH_BOX)
    }

    /// A zone with no entries in any category can be pruned.
    pub fn is_empty(&self) -> bool {
        !self.inner.has_element()
    }

    /// Copy with the inner index narrowed to ids `is_known` accepts.
    pub fn retain_known<F>(&self, is_known: F) -> Self
    where
        F: FnMut(&ElementRef) -> bool,
    {
        Self {
            id: self.id.clone(),
            zone_type: self.zone_type.clone(),
            polygon: self.polygon.clone(),
            inner: self.inner.retain_known(is_known),
        }
    }
}
