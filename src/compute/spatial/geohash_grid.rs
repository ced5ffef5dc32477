//! Geohash cell arithmetic.
//!
//! A cell id is a geohash string; its length is the precision. Everything
//! here is a pure function of the id, independent of which cells happen to be
//! populated in a [`GridIndex`](super::GridIndex).

use crate::compute::validation::{validate_coordinate, validate_precision};
use crate::error::{GeoMatchError, Result};
use geo::{Polygon, Rect};
use geohash::{Coord, Direction};

/// Cell id containing `(lon, lat)` at `precision`.
///
/// Points on a cell boundary belong to the cell to their north/east. The
/// north pole and the antimeridian at +180 belong to the last row and column.
pub fn encode(lon: f64, lat: f64, precision: usize) -> Result<String> {
    validate_coordinate(lon, lat)?;
    validate_precision(precision)?;

    // Points in the eastern half of the last column (or northern half of the
    // last row) are moved to its centre; at exactly 180/90 the geohash bit
    // arithmetic would otherwise wrap to the opposite edge.
    let (width, height) = cell_size(precision);
    let lon = lon.min(180.0 - width / 2.0);
    let lat = lat.min(90.0 - height / 2.0);
    Ok(geohash::encode(Coord { x: lon, y: lat }, precision)?)
}

/// Width and height in degrees of every cell at `precision`.
pub fn cell_size(precision: usize) -> (f64, f64) {
    let bits = 5 * precision as i32;
    let lon_bits = (bits + 1) / 2;
    let lat_bits = bits / 2;
    (360.0 / 2f64.powi(lon_bits), 180.0 / 2f64.powi(lat_bits))
}

/// Adjacent cell in one direction, wrapping across the antimeridian.
pub fn neighbor(cell: &str, direction: Direction) -> Result<String> {
    check_cell(cell)?;
    Ok(geohash::neighbor(cell, direction)?)
}

/// The eight adjacent cells, ordered N, NE, E, SE, S, SW, W, NW.
pub fn neighbors(cell: &str) -> Result<[String; 8]> {
    check_cell(cell)?;
    let n = geohash::neighbors(cell)?;
    Ok([n.n, n.ne, n.e, n.se, n.s, n.sw, n.w, n.nw])
}

/// Exact lon/lat bounds of a cell.
pub fn cell_rect(cell: &str) -> Result<Rect<f64>> {
    check_cell(cell)?;
    Ok(geohash::decode_bbox(cell)?)
}

/// Rectangle polygon of a cell, counter-clockwise from the south-west corner.
pub fn cell_polygon(cell: &str) -> Result<Polygon<f64>> {
    Ok(cell_rect(cell)?.to_polygon())
}

/// Every cell at `precision` needed to tile the rectangle.
///
/// Cells are listed row by row from the south-west corner, west to east
/// within a row. Cells that only touch the rectangle's north or east edge
/// are left out; a rectangle that collapses to a point or a line yields the
/// cells covering it. Fails with [`GeoMatchError::CoverTooLarge`] instead of
/// allocating more than `limit` ids.
pub fn cover_rectangle(
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    precision: usize,
    limit: usize,
) -> Result<Vec<String>> {
    validate_coordinate(min_lon, min_lat)?;
    validate_coordinate(max_lon, max_lat)?;
    if min_lon > max_lon || min_lat > max_lat {
        return Err(GeoMatchError::invalid_coordinate(
            min_lon,
            min_lat,
            format!("rectangle minimum exceeds maximum ({}, {})", max_lon, max_lat),
        ));
    }

    let lower_left = encode(min_lon, min_lat, precision)?;
    let mut upper_right = encode(max_lon, max_lat, precision)?;

    let ll = cell_rect(&lower_left)?;
    let mut ur = cell_rect(&upper_right)?;

    if max_lon > min_lon && ur.min().x == max_lon && ur.min().x > ll.min().x {
        upper_right = neighbor(&upper_right, Direction::W)?;
        ur = cell_rect(&upper_right)?;
    }
    if max_lat > min_lat && ur.min().y == max_lat && ur.min().y > ll.min().y {
        upper_right = neighbor(&upper_right, Direction::S)?;
        ur = cell_rect(&upper_right)?;
    }

    if ur.min().x < ll.min().x || ur.min().y < ll.min().y {
        return Err(GeoMatchError::InvalidCell(format!(
            "cover corner {} lies south or west of {}",
            upper_right, lower_left
        )));
    }

    let cols = ((ur.min().x - ll.min().x) / ll.width()).round() as usize + 1;
    let rows = ((ur.min().y - ll.min().y) / ll.height()).round() as usize + 1;
    let cells = cols.saturating_mul(rows);
    if cells > limit {
        return Err(GeoMatchError::CoverTooLarge { cells, limit });
    }

    let mut cover = Vec::with_capacity(cells);
    let mut row_start = lower_left;
    for row in 0..rows {
        let mut cell = row_start.clone();
        for col in 0..cols {
            if col + 1 < cols {
                let next = neighbor(&cell, Direction::E)?;
                cover.push(std::mem::replace(&mut cell, next));
            } else {
                cover.push(cell.clone());
            }
        }
        if row + 1 < rows {
            row_start = neighbor(&row_start, Direction::N)?;
        }
    }

    Ok(cover)
}

fn check_cell(cell: &str) -> Result<()> {
    if cell.is_empty() {
        return Err(GeoMatchError::InvalidCell("empty cell id".to_string()));
    }
    Ok(())
}
