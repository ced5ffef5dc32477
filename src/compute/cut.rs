//! Linestring cutting helpers.
//!
//! Distances are measured in Web Mercator metres, so pieces get shorter on
//! the ground the further they are from the equator. That is good enough for
//! chopping road segments into roughly even lengths.

use crate::compute::projection::{web_mercator_to_wgs84, wgs84_to_web_mercator};
use crate::error::{GeoMatchError, Result};
use geo::{Coord, Distance, Euclidean, Line, LineString, Point};

const LENGTH_EPSILON: f64 = 1e-9;

/// Split a WGS84 linestring into consecutive pieces of `meters` projected
/// length. The last piece holds whatever remains. A non-positive length, or
/// one at least as long as the line, returns the line unchanged.
pub fn cut_at_distance(line: &LineString<f64>, meters: f64) -> Result<Vec<LineString<f64>>> {
    if line.0.len() < 2 {
        return Err(GeoMatchError::InvalidGeometry(
            "cannot cut a linestring with fewer than two coordinates".to_string(),
        ));
    }

    let projected: Vec<Coord<f64>> = line
        .coords()
        .map(|c| {
            let (x, y) = wgs84_to_web_mercator(c.x, c.y);
            Coord { x, y }
        })
        .collect();
    let total: f64 = projected.windows(2).map(|w| segment_length(w[0], w[1])).sum();

    if meters.is_nan() || meters <= 0.0 || meters >= total {
        return Ok(vec![line.clone()]);
    }

    let mut pieces = Vec::new();
    let mut current = vec![projected[0]];
    let mut remaining = meters;

    for window in projected.windows(2) {
        let (mut start, end) = (window[0], window[1]);
        let mut left = segment_length(start, end);

        while left > LENGTH_EPSILON && left >= remaining {
            let t = remaining / left;
            let cut = Coord {
                x: start.x + (end.x - start.x) * t,
                y: start.y + (end.y - start.y) * t,
            };
            current.push(cut);
            pieces.push(to_wgs84(&current));

            current = vec![cut];
            start = cut;
            left -= remaining;
            remaining = meters;
        }

        if left > LENGTH_EPSILON {
            current.push(end);
            remaining -= left;
        }
    }

    if current.len() >= 2 {
        pieces.push(to_wgs84(&current));
    }

    Ok(pieces)
}

/// Split a linestring in two at `point`, which is inserted as the shared
/// vertex. The point is attached to the segment nearest to it, so a projected
/// match point that was rounded slightly off the line still splits cleanly.
pub fn split_at_point(
    line: &LineString<f64>,
    point: Point<f64>,
) -> Result<(LineString<f64>, LineString<f64>)> {
    let coords = &line.0;
    if coords.len() < 2 {
        return Err(GeoMatchError::InvalidGeometry(
            "cannot split a linestring with fewer than two coordinates".to_string(),
        ));
    }

    let mut segment = 0;
    let mut best = f64::INFINITY;
    for (i, window) in coords.windows(2).enumerate() {
        let d = Euclidean.distance(&point, &Line::new(window[0], window[1]));
        if d < best {
            best = d;
            segment = i;
        }
    }

    let p = point.0;
    let (head, tail) = if p == coords[segment] {
        (coords[..=segment].to_vec(), coords[segment..].to_vec())
    } else if p == coords[segment + 1] {
        (coords[..=segment + 1].to_vec(), coords[segment + 1..].to_vec())
    } else {
        let mut head = coords[..=segment].to_vec();
        head.push(p);
        let mut tail = vec![p];
        tail.extend_from_slice(&coords[segment + 1..]);
        (head, tail)
    };

    if head.len() < 2 || tail.len() < 2 {
        return Err(GeoMatchError::InvalidGeometry(format!(
            "break point ({}, {}) is an end of the line",
            p.x, p.y
        )));
    }

    Ok((LineString::new(head), LineString::new(tail)))
}

fn segment_length(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

fn to_wgs84(coords: &[Coord<f64>]) -> LineString<f64> {
    coords
        .iter()
        .map(|c| {
            let (x, y) = web_mercator_to_wgs84(c.x, c.y);
            Coord { x, y }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn projected_length(line: &LineString<f64>) -> f64 {
        line.0
            .windows(2)
            .map(|w| {
                let (ax, ay) = wgs84_to_web_mercator(w[0].x, w[0].y);
                let (bx, by) = wgs84_to_web_mercator(w[1].x, w[1].y);
                (bx - ax).hypot(by - ay)
            })
            .sum()
    }

    #[test]
    fn test_cut_into_even_pieces() {
        // ~1113 projected metres along the equator
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.01, y: 0.0)];
        let pieces = cut_at_distance(&line, 300.0).unwrap();

        assert_eq!(pieces.len(), 4);
        for piece in &pieces[..3] {
            assert!((projected_length(piece) - 300.0).abs() < 1e-3);
        }
        assert!(projected_length(&pieces[3]) < 300.0);

        let first = pieces[0].0[0];
        let last = *pieces[3].0.last().unwrap();
        assert!((first.x - 0.0).abs() < 1e-9);
        assert!((last.x - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_cut_across_vertices() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.002, y: 0.0), (x: 0.002, y: 0.002)];
        let pieces = cut_at_distance(&line, 100.0).unwrap();
        let total: f64 = pieces.iter().map(projected_length).sum();
        assert!((total - projected_length(&line)).abs() < 1e-3);
        // The corner vertex survives inside the piece that spans it.
        assert!(pieces.iter().any(|p| {
            p.0.iter()
                .any(|c| (c.x - 0.002).abs() < 1e-9 && c.y.abs() < 1e-9)
        }));
    }

    #[test]
    fn test_cut_longer_than_line_is_identity() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)];
        assert_eq!(cut_at_distance(&line, 1e6).unwrap(), vec![line.clone()]);
        assert_eq!(cut_at_distance(&line, 0.0).unwrap(), vec![line]);
    }

    #[test]
    fn test_split_two_point_line() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0)];
        let (head, tail) = split_at_point(&line, Point::new(1.0, 0.0)).unwrap();
        assert_eq!(head, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
        assert_eq!(tail, line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]);
    }

    #[test]
    fn test_split_at_vertex() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let (head, tail) = split_at_point(&line, Point::new(1.0, 0.0)).unwrap();
        assert_eq!(head.0.len(), 2);
        assert_eq!(tail.0.len(), 2);
        assert_eq!(head.0[1], tail.0[0]);
    }

    #[test]
    fn test_split_picks_nearest_segment() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let (head, tail) = split_at_point(&line, Point::new(1.0000001, 0.5)).unwrap();
        assert_eq!(head.0.len(), 3);
        assert_eq!(tail.0, vec![Coord { x: 1.0000001, y: 0.5 }, Coord { x: 1.0, y: 1.0 }]);
    }

    #[test]
    fn test_split_at_line_end_fails() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        assert!(split_at_point(&line, Point::new(0.0, 0.0)).is_err());
    }
}
