//! Coordinate reference conversions used by the line-cutting helpers.
//!
//! These are the usual closed-form approximations: spherical Web Mercator and
//! the GCJ-02 offset applied to mainland-China WGS84 coordinates. None of the
//! index structures depend on them.

use std::f64::consts::PI;

/// Krasovsky 1940 semi-major axis, metres
const SEMI_MAJOR_AXIS: f64 = 6_378_245.0;
const ECCENTRICITY_SQ: f64 = 0.006_693_421_622_965_943;
const MERCATOR_HALF_WORLD: f64 = 20_037_508.342_789;

pub fn wgs84_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * MERCATOR_HALF_WORLD / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    (x, y * MERCATOR_HALF_WORLD / 180.0)
}

pub fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x / MERCATOR_HALF_WORLD * 180.0;
    let lat = y / MERCATOR_HALF_WORLD * 180.0;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    (lon, lat)
}

/// Rough bounding box test; the GCJ-02 offset is only defined inside China.
pub fn out_of_china(lon: f64, lat: f64) -> bool {
    !(72.004..=137.8347).contains(&lon) || !(0.8293..=55.8271).contains(&lat)
}

pub fn wgs84_to_gcj02(lon: f64, lat: f64) -> (f64, f64) {
    if out_of_china(lon, lat) {
        log::warn!("WGS84 coordinate ({}, {}) is outside China", lon, lat);
    }
    let (dlon, dlat) = gcj02_offset(lon, lat);
    (lon + dlon, lat + dlat)
}

/// Inverse of [`wgs84_to_gcj02`] to within a few metres.
pub fn gcj02_to_wgs84(lon: f64, lat: f64) -> (f64, f64) {
    let (dlon, dlat) = gcj02_offset(lon, lat);
    let (wgs_lon, wgs_lat) = (lon - dlon, lat - dlat);
    if out_of_china(wgs_lon, wgs_lat) {
        log::warn!("GCJ-02 coordinate ({}, {}) is outside China", lon, lat);
    }
    (wgs_lon, wgs_lat)
}

/// Great-circle distance in metres on the Krasovsky sphere.
pub fn haversine(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );
    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * SEMI_MAJOR_AXIS
}

fn gcj02_offset(lon: f64, lat: f64) -> (f64, f64) {
    let dlat = transform_lat(lon - 105.0, lat - 35.0);
    let dlon = transform_lon(lon - 105.0, lat - 35.0);
    let radlat = lat / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQ * radlat.sin().powi(2);
    let sqrt_magic = magic.sqrt();

    let dlat = (dlat * 180.0) / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQ)) / (magic * sqrt_magic) * PI);
    let dlon = (dlon * 180.0) / (SEMI_MAJOR_AXIS / sqrt_magic * radlat.cos() * PI);
    (dlon, dlat)
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lon(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}
