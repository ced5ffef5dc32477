//! Error types for grid construction, assignment and queries.

use crate::model::EntityKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoMatchError {
    #[error("Invalid coordinate ({lon}, {lat}): {reason}")]
    InvalidCoordinate { lon: f64, lat: f64, reason: String },

    #[error("Geohash precision must be between 1 and 12, got {0}")]
    InvalidPrecision(usize),

    #[error("Invalid geohash cell: {0}")]
    InvalidCell(String),

    /// Bridging search exhausted the grid without finding an indexed edge.
    #[error("No reachable edges from cell {cell}")]
    NoReachableEdges { cell: String },

    /// A referenced id is absent from its owning collection.
    #[error("Inconsistent index: {kind} '{id}' is not in its collection")]
    InconsistentIndex { kind: EntityKind, id: String },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Rectangle cover needs {cells} cells, limit is {limit}")]
    CoverTooLarge { cells: usize, limit: usize },

    #[error("Failed to assign '{entity}': {source}")]
    Assignment {
        entity: String,
        #[source]
        source: Box<GeoMatchError>,
    },

    #[error("Invalid entity document: {0}")]
    InvalidDocument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GeoMatchError {
    pub(crate) fn invalid_coordinate(lon: f64, lat: f64, reason: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            lon,
            lat,
            reason: reason.into(),
        }
    }

    pub(crate) fn inconsistent(kind: EntityKind, id: impl ToString) -> Self {
        Self::InconsistentIndex {
            kind,
            id: id.to_string(),
        }
    }

    /// Attach the id of the entity whose assignment failed.
    pub(crate) fn for_entity(self, entity: impl ToString) -> Self {
        Self::Assignment {
            entity: entity.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<geohash::GeohashError> for GeoMatchError {
    fn from(err: geohash::GeohashError) -> Self {
        match err {
            geohash::GeohashError::InvalidCoordinateRange(c) => {
                Self::invalid_coordinate(c.x, c.y, "outside geohash range")
            }
            geohash::GeohashError::InvalidLength(len) => Self::InvalidPrecision(len),
            geohash::GeohashError::InvalidHashCharacter(c) => {
                Self::InvalidCell(format!("invalid character '{}'", c))
            }
            geohash::GeohashError::InvalidHash(msg) => Self::InvalidCell(msg),
        }
    }
}

impl From<geozero::error::GeozeroError> for GeoMatchError {
    fn from(err: geozero::error::GeozeroError) -> Self {
        Self::InvalidGeometry(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoMatchError>;

/// Outcome of assigning a batch of entities.
///
/// A failing entity is skipped and recorded here; the rest of the batch
/// still goes through.
#[derive(Debug, Default)]
pub struct AssignReport {
    pub assigned: usize,
    pub failures: Vec<GeoMatchError>,
}

impl AssignReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a success, or log and keep the error tagged with `entity`.
    pub fn record<T>(&mut self, entity: impl ToString, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.assigned += 1;
                Some(value)
            }
            Err(err) => {
                let err = err.for_entity(entity);
                log::warn!("{}", err);
                self.failures.push(err);
                None
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids of the entities that failed.
    pub fn failed_entities(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().filter_map(|err| match err {
            GeoMatchError::Assignment { entity, .. } => Some(entity.as_str()),
            _ => None,
        })
    }

    pub fn merge(&mut self, other: AssignReport) {
        self.assigned += other.assigned;
        self.failures.extend(other.failures);
    }
}
