//! Validation for geographic coordinates and grid settings.

use crate::error::{GeoMatchError, Result};
use geo::{LineString, Polygon};

/// Validates a longitude/latitude pair.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use geomatch::compute::validation::validate_coordinate;
///
/// assert!(validate_coordinate(114.05, 22.54).is_ok());
/// assert!(validate_coordinate(200.0, 22.54).is_err());
/// assert!(validate_coordinate(114.05, f64::NAN).is_err());
/// ```
pub fn validate_coordinate(lon: f64, lat: f64) -> Result<()> {
    if !lon.is_finite() {
        return Err(GeoMatchError::invalid_coordinate(
            lon,
            lat,
            "longitude must be finite",
        ));
    }

    if !lat.is_finite() {
        return Err(GeoMatchError::invalid_coordinate(
            lon,
            lat,
            "latitude must be finite",
        ));
    }

    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeoMatchError::invalid_coordinate(
            lon,
            lat,
            "longitude out of range [-180.0, 180.0]",
        ));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeoMatchError::invalid_coordinate(
            lon,
            lat,
            "latitude out of range [-90.0, 90.0]",
        ));
    }

    Ok(())
}

/// Geohash lengths supported by the grid.
pub fn validate_precision(precision: usize) -> Result<()> {
    if (1..=12).contains(&precision) {
        Ok(())
    } else {
        Err(GeoMatchError::InvalidPrecision(precision))
    }
}

pub fn validate_line(line: &LineString<f64>) -> Result<()> {
    for coord in line.coords() {
        validate_coordinate(coord.x, coord.y)?;
    }
    Ok(())
}

/// Validates all polygon coordinates (exterior and interior rings).
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<()> {
    for coord in polygon.exterior().coords() {
        validate_coordinate(coord.x, coord.y)?;
    }

    for interior in polygon.interiors() {
        for coord in interior.coords() {
            validate_coordinate(coord.x, coord.y)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_coordinates() {
        assert!(validate_coordinate(114.05, 22.54).is_ok());
        assert!(validate_coordinate(-0.1278, 51.5074).is_ok());

        // Edge cases
        assert!(validate_coordinate(180.0, 0.0).is_ok());
        assert!(validate_coordinate(-180.0, 0.0).is_ok());
        assert!(validate_coordinate(0.0, 90.0).is_ok());
        assert!(validate_coordinate(0.0, -90.0).is_ok());
    }

    #[test]
    fn test_invalid_longitude() {
        assert!(validate_coordinate(200.0, 40.0).is_err());
        assert!(validate_coordinate(-180.1, 40.0).is_err());
    }

    #[test]
    fn test_invalid_latitude() {
        let err = validate_coordinate(114.0, 90.1).unwrap_err();
        assert!(matches!(err, GeoMatchError::InvalidCoordinate { .. }));
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn test_non_finite_coordinates() {
        assert!(validate_coordinate(f64::NAN, 40.0).is_err());
        assert!(validate_coordinate(114.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_precision_range() {
        assert!(validate_precision(1).is_ok());
        assert!(validate_precision(12).is_ok());
        assert!(matches!(
            validate_precision(0),
            Err(GeoMatchError::InvalidPrecision(0))
        ));
        assert!(validate_precision(13).is_err());
    }

    #[test]
    fn test_validate_polygon() {
        use geo::polygon;

        let valid: Polygon<f64> = polygon![
            (x: 114.0, y: 22.0),
            (x: 114.1, y: 22.0),
            (x: 114.1, y: 22.1),
            (x: 114.0, y: 22.0),
        ];
        assert!(validate_polygon(&valid).is_ok());

        let invalid: Polygon<f64> = polygon![
            (x: 114.0, y: 22.0),
            (x: 999.0, y: 22.0),
            (x: 114.1, y: 22.1),
            (x: 114.0, y: 22.0),
        ];
        assert!(validate_polygon(&invalid).is_err());
    }
}
