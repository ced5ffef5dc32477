//! Geohash grid index.
//!
//! The grid is a collection of cell zones (`zone_type = "geo_hash_box"`)
//! keyed by geohash. Each cell's inner index records what has been assigned
//! to it: edges crossing it, zones overlapping it, nodes located in it, and
//! the adjacent cells that exist in the grid.
//!
//! All mutation goes through `&mut self` assignment methods. Once assignment
//! is done the index is only read, so a finished `GridIndex` can be shared
//! freely between query threads.

use super::geohash_grid;
use crate::compute::geometry;
use crate::config::Config;
use crate::error::{AssignReport, GeoMatchError, Result};
use crate::model::{
    Edge, EdgeCollection, EdgeId, ElementRef, GEO_HASH_BOX, Node, NodeCollection, Zone,
    ZoneCollection, category,
};
use geo::{BoundingRect, LineString, Point, Polygon, Rect};
use geojson::{Feature, FeatureCollection, JsonObject};
use rustc_hash::FxHashSet;

/// Cells a polygon overlaps, split by how it overlaps them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellClassification {
    /// Cells lying entirely inside the polygon
    pub contains: Vec<String>,
    /// Cells crossing the polygon boundary, or holding the whole polygon
    pub intersects: Vec<String>,
}

impl CellClassification {
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.contains.iter().chain(self.intersects.iter())
    }

    pub fn len(&self) -> usize {
        self.contains.len() + self.intersects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contains.is_empty() && self.intersects.is_empty()
    }
}

/// Classify candidate cells against a zone polygon.
///
/// Containment is tested first, so a cell inside the zone is never also
/// listed as intersecting. A zone small enough to sit inside one cell
/// intersects that cell. Disjoint cells are dropped.
pub fn classify_cells<I, S>(zone: &Polygon<f64>, cells: I) -> Result<CellClassification>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut result = CellClassification::default();
    for cell in cells {
        let cell = cell.into();
        let rect = geohash_grid::cell_polygon(&cell)?;
        if geometry::contains(zone, &rect) {
            result.contains.push(cell);
        } else if geometry::intersects(zone, &rect) {
            result.intersects.push(cell);
        }
    }
    Ok(result)
}

/// Candidate cells a linestring passes through or touches.
pub fn classify_line_cells<I, S>(line: &LineString<f64>, cells: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut hit = Vec::new();
    for cell in cells {
        let cell = cell.into();
        let rect = geohash_grid::cell_polygon(&cell)?;
        if geometry::intersects(line, &rect) {
            hit.push(cell);
        }
    }
    Ok(hit)
}

/// Summary counts for a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridStats {
    pub precision: usize,
    pub cell_count: usize,
    pub cells_with_edges: usize,
    pub cells_with_zones: usize,
    pub cells_with_nodes: usize,
    /// Edge references summed over all cells (an edge spanning cells counts
    /// once per cell)
    pub edge_refs: usize,
    pub avg_edges_per_cell: f64,
}

/// Geohash cell grid with per-cell assignment lists.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cells: ZoneCollection,
    precision: usize,
    max_cover_cells: usize,
    meters_per_degree: f64,
}

impl GridIndex {
    /// Empty grid using the config's precision and limits.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cells: ZoneCollection::new(),
            precision: config.geohash_precision,
            max_cover_cells: config.max_cover_cells,
            meters_per_degree: config.meters_per_degree,
        })
    }

    /// Wrap cells loaded from a document. Non-cell zones are rejected.
    pub fn from_cells(cells: ZoneCollection, config: &Config) -> Result<Self> {
        let mut grid = Self::new(config)?;
        for cell in cells.values() {
            if !cell.is_grid_cell() {
                return Err(GeoMatchError::InvalidCell(format!(
                    "zone '{}' is not a {}",
                    cell.id(),
                    GEO_HASH_BOX
                )));
            }
            if cell.id().len() != grid.precision {
                log::warn!(
                    "Cell '{}' has precision {}, grid uses {}",
                    cell.id(),
                    cell.id().len(),
                    grid.precision
                );
            }
        }
        grid.cells = cells;
        Ok(grid)
    }

    /// Build the full cell grid over the extent of `edges`.
    ///
    /// Every cell in the extent exists afterwards, each with its in-grid
    /// neighbours recorded. Edges are not assigned yet; call
    /// [`assign_edges`](Self::assign_edges) for that. Edges whose geometry
    /// cannot be parsed do not contribute to the extent.
    pub fn from_edges(edges: &EdgeCollection, config: &Config) -> Result<Self> {
        let mut grid = Self::new(config)?;

        let mut extent: Option<Rect<f64>> = None;
        for edge in edges.values() {
            let Ok(line) = edge.line() else {
                log::warn!("Edge {} has no usable geometry; left out of grid extent", edge.id());
                continue;
            };
            if let Some(rect) = line.bounding_rect() {
                extent = Some(match extent {
                    Some(acc) => merge_rects(acc, rect),
                    None => rect,
                });
            }
        }

        if let Some(extent) = extent {
            let cover = grid.cover(extent)?;
            for cell in &cover {
                grid.ensure_cell(cell)?;
            }
            log::info!(
                "Built {} grid cells at precision {} over {} edges",
                grid.cells.len(),
                grid.precision,
                edges.len()
            );
        }

        Ok(grid)
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &ZoneCollection {
        &self.cells
    }

    pub fn into_cells(self) -> ZoneCollection {
        self.cells
    }

    pub fn cell(&self, cell: &str) -> Option<&Zone> {
        self.cells.get(cell)
    }

    pub fn contains_cell(&self, cell: &str) -> bool {
        self.cells.contains(cell)
    }

    /// Cell id for a coordinate at the grid precision.
    pub fn cell_of(&self, lon: f64, lat: f64) -> Result<String> {
        geohash_grid::encode(lon, lat, self.precision)
    }

    /// Edge ids recorded in a cell, in assignment order.
    pub fn edges_in_cell(&self, cell: &str) -> Vec<EdgeId> {
        self.cells
            .get(cell)
            .map(|zone| {
                zone.inner
                    .get(category::INNER_LINK_EDGE)
                    .iter()
                    .filter_map(ElementRef::as_edge_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Cells covering a rectangle at the grid precision.
    pub fn cover(&self, rect: Rect<f64>) -> Result<Vec<String>> {
        geohash_grid::cover_rectangle(
            rect.min().x,
            rect.min().y,
            rect.max().x,
            rect.max().y,
            self.precision,
            self.max_cover_cells,
        )
    }

    /// Cells a polygon contains or intersects, without touching the grid.
    pub fn classify_polygon(&self, polygon: &Polygon<f64>) -> Result<CellClassification> {
        let rect = geometry::bounds(polygon)?;
        classify_cells(polygon, self.cover(rect)?)
    }

    /// Record the zone's overlapping cells on the zone itself, under
    /// `zone_contains_geo_hash_code` and `zone_intersects_geo_hash_code`.
    pub fn encode_zone(&self, zone: &mut Zone) -> Result<CellClassification> {
        let classification = self.classify_polygon(zone.polygon()?)?;
        zone.inner.add_inner_elements(
            category::ZONE_CONTAINS_GEO_HASH_CODE,
            classification.contains.iter().map(String::as_str),
        );
        zone.inner.add_inner_elements(
            category::ZONE_INTERSECTS_GEO_HASH_CODE,
            classification.intersects.iter().map(String::as_str),
        );
        Ok(classification)
    }

    /// Record `zone`'s id under `belong_zone_id` in every cell the zone
    /// contains or intersects, creating missing cells. The zone is not
    /// modified. Assigning the same zone again adds nothing.
    pub fn assign_zone(&mut self, zone: &Zone) -> Result<CellClassification> {
        let classification = self.classify_polygon(zone.polygon()?)?;
        for cell in classification.all() {
            self.ensure_cell(cell)?
                .inner
                .add_inner_element(category::BELONG_ZONE_ID, zone.id());
        }
        Ok(classification)
    }

    /// Record the edge's id pair under `inner_link_edge` in every cell its
    /// line passes through, creating missing cells. Returns those cells.
    pub fn assign_edge(&mut self, edge: &Edge) -> Result<Vec<String>> {
        let line = edge.line()?;
        let rect = geometry::bounds(line)?;
        let cells = classify_line_cells(line, self.cover(rect)?)?;

        let id = ElementRef::from(edge.id());
        for cell in &cells {
            self.ensure_cell(cell)?
                .inner
                .add_inner_element(category::INNER_LINK_EDGE, id.clone());
        }
        Ok(cells)
    }

    /// Record the node's cell on the node (`geo_hash_code`) and the node on
    /// the cell (`inner_node_id`). Returns the cell id.
    pub fn assign_node(&mut self, node: &mut Node) -> Result<String> {
        let cell = self.cell_of(node.lon(), node.lat())?;
        node.add_belonging(category::GEO_HASH_CODE, cell.as_str());
        self.ensure_cell(&cell)?
            .inner
            .add_inner_element(category::INNER_NODE_ID, node.id());
        Ok(cell)
    }

    pub fn assign_zones(&mut self, zones: &ZoneCollection) -> AssignReport {
        let mut report = AssignReport::new();
        for zone in zones.values() {
            report.record(zone.id(), self.assign_zone(zone));
        }
        log::info!(
            "Assigned {} zones to grid ({} failed)",
            report.assigned,
            report.failures.len()
        );
        report
    }

    pub fn assign_edges(&mut self, edges: &EdgeCollection) -> AssignReport {
        let mut report = AssignReport::new();
        for edge in edges.values() {
            report.record(edge.id(), self.assign_edge(edge));
        }
        log::info!(
            "Assigned {} edges to grid ({} failed)",
            report.assigned,
            report.failures.len()
        );
        report
    }

    pub fn assign_nodes(&mut self, nodes: &mut NodeCollection) -> AssignReport {
        let mut report = AssignReport::new();
        for node in nodes.values_mut() {
            let id = node.id().to_string();
            report.record(id, self.assign_node(node));
        }
        log::info!(
            "Assigned {} nodes to grid ({} failed)",
            report.assigned,
            report.failures.len()
        );
        report
    }

    /// Nodes inside `zone`: every node in a contained cell, plus nodes in
    /// intersecting cells that lie strictly within the polygon.
    ///
    /// Uses the zone's recorded cell lists when [`encode_zone`](Self::encode_zone)
    /// has run on it, and classifies on the fly otherwise. Nodes must have
    /// been assigned to the grid.
    pub fn zone_inner_nodes(&self, zone: &Zone, nodes: &NodeCollection) -> Result<Vec<String>> {
        let classification = self.zone_cells(zone)?;
        let polygon = zone.polygon()?;

        let mut seen = FxHashSet::default();
        let mut inner = Vec::new();

        for cell in &classification.contains {
            for id in self.cell_ids(cell, category::INNER_NODE_ID) {
                nodes.require(id)?;
                if seen.insert(id) {
                    inner.push(id.to_string());
                }
            }
        }
        for cell in &classification.intersects {
            for id in self.cell_ids(cell, category::INNER_NODE_ID) {
                if nodes.require(id)?.is_in_polygon(polygon) && seen.insert(id) {
                    inner.push(id.to_string());
                }
            }
        }

        Ok(inner)
    }

    /// Edges inside or crossing `zone`: every edge in a contained cell, plus
    /// edges in intersecting cells whose line intersects the polygon.
    pub fn zone_inner_edges(&self, zone: &Zone, edges: &EdgeCollection) -> Result<Vec<EdgeId>> {
        let classification = self.zone_cells(zone)?;
        let polygon = zone.polygon()?;

        let mut seen = FxHashSet::default();
        let mut inner = Vec::new();

        for cell in &classification.contains {
            for id in self.edges_in_cell(cell) {
                edges.require(&id)?;
                if seen.insert(id.clone()) {
                    inner.push(id);
                }
            }
        }
        for cell in &classification.intersects {
            for id in self.edges_in_cell(cell) {
                if seen.contains(&id) {
                    continue;
                }
                let line = edges.require(&id)?.line()?;
                if geometry::intersects(line, polygon) {
                    seen.insert(id.clone());
                    inner.push(id);
                }
            }
        }

        Ok(inner)
    }

    /// Nodes within `meters` of `node`.
    ///
    /// Buffers the node into a circle zone (`<id>_circle`), assigns it to the
    /// grid like any other zone and collects the nodes inside. The radius is
    /// converted to degrees with the configured metres-per-degree factor. The
    /// node itself is included.
    pub fn nodes_near(
        &mut self,
        node: &Node,
        meters: f64,
        nodes: &NodeCollection,
    ) -> Result<Vec<String>> {
        let radius = meters / self.meters_per_degree;
        let circle = geometry::circle(node.point(), radius)?;
        let mut zone = Zone::from_polygon(format!("{}_circle", node.id()), circle);

        self.encode_zone(&mut zone)?;
        self.assign_zone(&zone)?;
        self.zone_inner_nodes(&zone, nodes)
    }

    /// First zone recorded in the point's cell that strictly contains it.
    pub fn zone_of_point(&self, lon: f64, lat: f64, zones: &ZoneCollection) -> Result<Option<String>> {
        let cell = self.cell_of(lon, lat)?;
        let point = Point::new(lon, lat);

        for zone_id in self.cell_ids(&cell, category::BELONG_ZONE_ID) {
            let zone = zones.require(zone_id)?;
            if geometry::within(&point, zone.polygon()?) {
                return Ok(Some(zone_id.to_string()));
            }
        }
        Ok(None)
    }

    /// Cell rectangles as a GeoJSON feature collection, with per-cell counts
    /// as properties.
    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let mut features = Vec::with_capacity(self.cells.len());
        for cell in self.cells.values() {
            let polygon = cell.polygon()?;

            let mut properties = JsonObject::new();
            for (key, list) in [
                ("edges", category::INNER_LINK_EDGE),
                ("zones", category::BELONG_ZONE_ID),
                ("nodes", category::INNER_NODE_ID),
            ] {
                properties.insert(key.to_string(), cell.inner.get(list).len().into());
            }

            features.push(Feature {
                geometry: Some(geojson::Geometry::new(geojson::Value::from(polygon))),
                id: Some(geojson::feature::Id::String(cell.id().to_string())),
                properties: Some(properties),
                ..Default::default()
            });
        }

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    pub fn stats(&self) -> GridStats {
        let mut stats = GridStats {
            precision: self.precision,
            cell_count: self.cells.len(),
            cells_with_edges: 0,
            cells_with_zones: 0,
            cells_with_nodes: 0,
            edge_refs: 0,
            avg_edges_per_cell: 0.0,
        };

        for cell in self.cells.values() {
            let edges = cell.inner.get(category::INNER_LINK_EDGE).len();
            stats.edge_refs += edges;
            stats.cells_with_edges += usize::from(edges > 0);
            stats.cells_with_zones +=
                usize::from(!cell.inner.get(category::BELONG_ZONE_ID).is_empty());
            stats.cells_with_nodes +=
                usize::from(!cell.inner.get(category::INNER_NODE_ID).is_empty());
        }

        if stats.cell_count > 0 {
            stats.avg_edges_per_cell = stats.edge_refs as f64 / stats.cell_count as f64;
        }
        stats
    }

    /// Insert an empty cell if missing and link it with its in-grid
    /// neighbours.
    fn ensure_cell(&mut self, cell: &str) -> Result<&mut Zone> {
        if !self.cells.contains(cell) {
            let mut zone = Zone::from_polygon(cell, geohash_grid::cell_polygon(cell)?)
                .with_type(GEO_HASH_BOX);
            zone.inner
                .add_inner_elements::<_, ElementRef>(category::NEIGHBOUR_ZONE_ID_LIST, []);

            for neighbour in geohash_grid::neighbors(cell)? {
                if neighbour == cell {
                    continue;
                }
                if let Some(existing) = self.cells.get_mut(neighbour.as_str()) {
                    existing
                        .inner
                        .add_inner_element(category::NEIGHBOUR_ZONE_ID_LIST, cell);
                    zone.inner
                        .add_inner_element(category::NEIGHBOUR_ZONE_ID_LIST, neighbour);
                }
            }

            self.cells.add(zone);
        }
        self.cells.require_mut(cell)
    }

    /// Plain ids recorded under `category` in `cell`; empty if the cell is
    /// not in the grid.
    fn cell_ids<'a>(
        &'a self,
        cell: &str,
        category: &str,
    ) -> impl Iterator<Item = &'a str> + use<'a> {
        self.cells
            .get(cell)
            .map(|zone| zone.inner.get(category))
            .unwrap_or_default()
            .iter()
            .filter_map(ElementRef::as_id)
    }

    fn zone_cells(&self, zone: &Zone) -> Result<CellClassification> {
        if zone.inner.contains_category(category::ZONE_CONTAINS_GEO_HASH_CODE)
            || zone.inner.contains_category(category::ZONE_INTERSECTS_GEO_HASH_CODE)
        {
            let ids = |category: &str| -> Vec<String> {
                zone.inner
                    .get(category)
                    .iter()
                    .filter_map(ElementRef::as_id)
                    .map(str::to_string)
                    .collect()
            };
            Ok(CellClassification {
                contains: ids(category::ZONE_CONTAINS_GEO_HASH_CODE),
                intersects: ids(category::ZONE_INTERSECTS_GEO_HASH_CODE),
            })
        } else {
            self.classify_polygon(zone.polygon()?)
        }
    }
}

fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        geo::Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}
