//! Index and matching configuration.
//!
//! `Config` is plain serde data so it can be embedded in a larger application
//! config or loaded on its own from JSON (or TOML with the `toml` feature).
use crate::error::{GeoMatchError, Result};
use std::path::Path;

/// Grid, matching and probing settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Geohash length used for grid cells (1-12)
    #[serde(default = "Config::default_geohash_precision")]
    pub geohash_precision: usize,

    /// Degree/metre conversion used when buffering a node into a search circle
    #[serde(default = "Config::default_meters_per_degree")]
    pub meters_per_degree: f64,

    /// Decimal places kept on projected match points
    #[serde(default = "Config::default_projection_decimals")]
    pub projection_decimals: u32,

    /// Upper bound on the number of cells a single rectangle cover may produce
    #[serde(default = "Config::default_max_cover_cells")]
    pub max_cover_cells: usize,

    /// Neighbours requested by transient-probe nearest queries
    #[serde(default = "Config::default_probe_neighbors")]
    pub probe_neighbors: usize,

    /// Optional cap on breadth-first rings explored by the bridging search
    #[serde(default)]
    pub max_bridge_depth: Option<usize>,
}

impl Config {
    const fn default_geohash_precision() -> usize {
        6
    }

    const fn default_meters_per_degree() -> f64 {
        100_000.0
    }

    const fn default_projection_decimals() -> u32 {
        7
    }

    const fn default_max_cover_cells() -> usize {
        250_000
    }

    const fn default_probe_neighbors() -> usize {
        2
    }

    pub fn with_geohash_precision(mut self, precision: usize) -> Self {
        assert!(
            (1..=12).contains(&precision),
            "Geohash precision must be between 1 and 12"
        );
        self.geohash_precision = precision;
        self
    }

    pub fn with_meters_per_degree(mut self, meters: f64) -> Self {
        assert!(
            meters.is_finite() && meters > 0.0,
            "Meters per degree must be positive"
        );
        self.meters_per_degree = meters;
        self
    }

    pub fn with_projection_decimals(mut self, decimals: u32) -> Self {
        self.projection_decimals = decimals;
        self
    }

    pub fn with_max_cover_cells(mut self, limit: usize) -> Self {
        assert!(limit > 0, "Cover cell limit must be greater than zero");

        if limit > 10_000_000 {
            log::warn!(
                "Cover cell limit of {} is very large; a single zone may allocate \
                millions of cell ids",
                limit
            );
        }

        self.max_cover_cells = limit;
        self
    }

    pub fn with_probe_neighbors(mut self, k: usize) -> Self {
        assert!(k > 0, "Probe neighbour count must be greater than zero");
        self.probe_neighbors = k;
        self
    }

    pub fn with_max_bridge_depth(mut self, depth: usize) -> Self {
        self.max_bridge_depth = Some(depth);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.geohash_precision) {
            return Err(GeoMatchError::InvalidPrecision(self.geohash_precision));
        }

        if !self.meters_per_degree.is_finite() || self.meters_per_degree <= 0.0 {
            return Err(GeoMatchError::Config(format!(
                "meters_per_degree must be positive, got {}",
                self.meters_per_degree
            )));
        }

        if self.projection_decimals > 15 {
            return Err(GeoMatchError::Config(format!(
                "projection_decimals above 15 exceeds f64 precision: {}",
                self.projection_decimals
            )));
        }

        if self.max_cover_cells == 0 {
            return Err(GeoMatchError::Config(
                "max_cover_cells must be greater than zero".to_string(),
            ));
        }

        if self.probe_neighbors == 0 {
            return Err(GeoMatchError::Config(
                "probe_neighbors must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML config.
    #[cfg(feature = "toml")]
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format from the extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => Self::from_toml(&text),
            Some("json") | None => Self::from_json(&text),
            Some(other) => Err(GeoMatchError::Config(format!(
                "Unsupported config format: .{}",
                other
            ))),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geohash_precision: Self::default_geohash_precision(),
            meters_per_degree: Self::default_meters_per_degree(),
            projection_decimals: Self::default_projection_decimals(),
            max_cover_cells: Self::default_max_cover_cells(),
            probe_neighbors: Self::default_probe_neighbors(),
            max_bridge_depth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.geohash_precision, 6);
        assert_eq!(config.projection_decimals, 7);
        assert_eq!(config.meters_per_degree, 100_000.0);
        assert!(config.max_bridge_depth.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = Config::from_json(r#"{"geohash_precision": 7}"#).unwrap();
        assert_eq!(config.geohash_precision, 7);
        assert_eq!(config.probe_neighbors, 2);
    }

    #[test]
    fn test_json_rejects_unknown_fields() {
        assert!(Config::from_json(r#"{"precision": 7}"#).is_err());
    }

    #[test]
    fn test_json_rejects_invalid_precision() {
        let err = Config::from_json(r#"{"geohash_precision": 13}"#).unwrap_err();
        assert!(matches!(err, GeoMatchError::InvalidPrecision(13)));
    }

    #[test]
    fn test_roundtrip_json() {
        let config = Config::default()
            .with_geohash_precision(8)
            .with_max_bridge_depth(4);
        let json = config.to_json().unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[test]
    #[should_panic]
    fn test_builder_rejects_zero_probe() {
        let _ = Config::default().with_probe_neighbors(0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geomatch.json");
        std::fs::write(&path, r#"{"max_cover_cells": 1000}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_cover_cells, 1000);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml() {
        let config = Config::from_toml("geohash_precision = 5\nprobe_neighbors = 3\n").unwrap();
        assert_eq!(config.geohash_precision, 5);
        assert_eq!(config.probe_neighbors, 3);
    }
}
