//! Network builder
//!
//! Collects the entity collections and settings, then indexes everything in
//! one pass: the geohash grid, zone cell lists, node cells and the two
//! envelope trees.

use crate::compute::spatial::{GridIndex, SpatialTreeIndex};
use crate::config::Config;
use crate::error::{AssignReport, Result};
use crate::model::{
    EdgeCollection, NetworkDocument, NodeCollection, ZoneCollection, decode_document,
};
use crate::network::SpatialNetwork;
use std::path::Path;

/// Builder for a [`SpatialNetwork`].
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    config: Config,
    nodes: NodeCollection,
    edges: EdgeCollection,
    zones: ZoneCollection,
    grid_cells: Option<ZoneCollection>,
}

impl NetworkBuilder {
    /// Create a new builder with default configuration and no entities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grid and matching configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn nodes(mut self, nodes: NodeCollection) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn edges(mut self, edges: EdgeCollection) -> Self {
        self.edges = edges;
        self
    }

    pub fn zones(mut self, zones: ZoneCollection) -> Self {
        self.zones = zones;
        self
    }

    /// Take all three collections from a decoded document.
    pub fn document(mut self, document: NetworkDocument) -> Self {
        self.nodes = document.nodes;
        self.edges = document.edges;
        self.zones = document.zones;
        self
    }

    /// Read a mixed entity document from disk. Sections found in the file
    /// replace the builder's collections of the same kind.
    pub fn load_json<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let document = decode_document(&serde_json::from_str(&text)?)?;
        log::info!(
            "Loaded {} nodes, {} edges, {} zones from {}",
            document.nodes.len(),
            document.edges.len(),
            document.zones.len(),
            path.as_ref().display()
        );

        if !document.nodes.is_empty() {
            self.nodes = document.nodes;
        }
        if !document.edges.is_empty() {
            self.edges = document.edges;
        }
        if !document.zones.is_empty() {
            self.zones = document.zones;
        }
        Ok(self)
    }

    /// Reuse grid cells saved by an earlier build instead of rebuilding the
    /// grid and reassigning edges.
    pub fn grid_cells(mut self, cells: ZoneCollection) -> Self {
        self.grid_cells = Some(cells);
        self
    }

    /// Load grid cells saved with [`SpatialNetwork::save_grid_json`].
    pub fn grid_json<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let cells = ZoneCollection::load_json(path)?;
        Ok(self.grid_cells(cells))
    }

    /// Index everything. Entities that fail to index are skipped and listed
    /// in [`SpatialNetwork::build_report`].
    pub fn build(self) -> Result<SpatialNetwork> {
        self.config.validate()?;

        let Self {
            config,
            mut nodes,
            edges,
            mut zones,
            grid_cells,
        } = self;

        let mut report = AssignReport::new();
        let mut grid = match grid_cells {
            Some(cells) => {
                log::info!("Reusing {} saved grid cells", cells.len());
                GridIndex::from_cells(cells, &config)?
            }
            None => {
                let mut grid = GridIndex::from_edges(&edges, &config)?;
                report.merge(grid.assign_edges(&edges));
                grid
            }
        };

        let mut zone_report = AssignReport::new();
        for zone in zones.values_mut() {
            let id = zone.id().to_string();
            let indexed = grid.encode_zone(zone).and_then(|_| grid.assign_zone(zone));
            zone_report.record(id, indexed);
        }
        log::info!(
            "Assigned {} zones to grid ({} failed)",
            zone_report.assigned,
            zone_report.failures.len()
        );
        report.merge(zone_report);
        report.merge(grid.assign_nodes(&mut nodes));

        let zone_tree = SpatialTreeIndex::for_zones_and_nodes_skip_invalid(&zones, &nodes);
        let edge_tree = SpatialTreeIndex::for_edges_skip_invalid(&edges);

        let stats = grid.stats();
        log::info!(
            "Network ready: {} cells ({} with edges), {} tree entries, {} failures",
            stats.cell_count,
            stats.cells_with_edges,
            zone_tree.len() + edge_tree.len(),
            report.failures.len()
        );

        Ok(SpatialNetwork {
            config,
            nodes,
            edges,
            zones,
            grid,
            zone_tree,
            edge_tree,
            report,
        })
    }
}
