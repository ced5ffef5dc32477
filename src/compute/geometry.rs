//! Geometry adapter: parsing, predicates, bounds and distances.
//!
//! Entities store their shapes in whatever form the input data used (WKT text
//! or a bare coordinate list) and parse them lazily on first use. Everything
//! the index needs from a geometry goes through the functions in this module,
//! so the rest of the crate never cares about the storage format.

use crate::error::{GeoMatchError, Result};
use geo::{
    BoundingRect, Buffer, Closest, ClosestPoint, Contains, Coord, Distance, Euclidean, Geometry,
    Haversine, Intersects, LineString, Point, Polygon, Rect, Relate, Within,
};
use geozero::wkt::Wkt;
use geozero::{ToGeo, ToWkt};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stored representation of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeometryRepr {
    /// Well-known text, e.g. `LINESTRING (114.3 22.6, 114.31 22.6)`
    Wkt(String),
    /// Bare `[lon, lat]` pairs
    Coords(Vec<[f64; 2]>),
}

impl Default for GeometryRepr {
    fn default() -> Self {
        Self::Coords(Vec::new())
    }
}

/// Geometries that can be materialised from a [`GeometryRepr`].
pub trait ParseGeometry: Sized {
    fn parse(repr: &GeometryRepr) -> Result<Self>;

    fn to_geometry(&self) -> Geometry<f64>;
}

impl ParseGeometry for LineString<f64> {
    fn parse(repr: &GeometryRepr) -> Result<Self> {
        let line = match repr {
            GeometryRepr::Wkt(text) => match parse_wkt(text)? {
                Geometry::LineString(line) => line,
                Geometry::Line(line) => line.into(),
                Geometry::MultiLineString(multi) if multi.0.len() == 1 => {
                    let mut lines = multi.0;
                    lines.swap_remove(0)
                }
                other => {
                    return Err(GeoMatchError::InvalidGeometry(format!(
                        "expected a linestring, got {}",
                        geometry_name(&other)
                    )));
                }
            },
            GeometryRepr::Coords(coords) => coords
                .iter()
                .map(|[x, y]| Coord { x: *x, y: *y })
                .collect(),
        };

        if line.0.len() < 2 {
            return Err(GeoMatchError::InvalidGeometry(
                "linestring needs at least two coordinates".to_string(),
            ));
        }
        Ok(line)
    }

    fn to_geometry(&self) -> Geometry<f64> {
        Geometry::LineString(self.clone())
    }
}

impl ParseGeometry for Polygon<f64> {
    fn parse(repr: &GeometryRepr) -> Result<Self> {
        let polygon = match repr {
            GeometryRepr::Wkt(text) => match parse_wkt(text)? {
                Geometry::Polygon(polygon) => polygon,
                Geometry::Rect(rect) => rect.to_polygon(),
                Geometry::Triangle(triangle) => triangle.to_polygon(),
                Geometry::MultiPolygon(multi) if multi.0.len() == 1 => {
                    multi.0.into_iter().next().unwrap_or_else(empty_polygon)
                }
                other => {
                    return Err(GeoMatchError::InvalidGeometry(format!(
                        "expected a polygon, got {}",
                        geometry_name(&other)
                    )));
                }
            },
            GeometryRepr::Coords(coords) => Polygon::new(
                coords.iter().map(|[x, y]| Coord { x: *x, y: *y }).collect(),
                vec![],
            ),
        };

        // A closed ring repeats its first coordinate, so a triangle has four.
        if polygon.exterior().0.len() < 4 {
            return Err(GeoMatchError::InvalidGeometry(
                "polygon exterior needs at least three distinct coordinates".to_string(),
            ));
        }
        Ok(polygon)
    }

    fn to_geometry(&self) -> Geometry<f64> {
        Geometry::Polygon(self.clone())
    }
}

/// A geometry kept in its stored form until first accessed.
///
/// Parsing happens at most once; the parsed value is cached for the lifetime
/// of the entity. Geometries built in code start out already parsed and are
/// written back as WKT when serialised.
#[derive(Debug, Clone)]
pub struct LazyGeometry<G> {
    repr: Option<GeometryRepr>,
    parsed: OnceCell<G>,
}

impl<G: ParseGeometry> LazyGeometry<G> {
    pub fn from_repr(repr: GeometryRepr) -> Self {
        Self {
            repr: Some(repr),
            parsed: OnceCell::new(),
        }
    }

    pub fn from_wkt(text: impl Into<String>) -> Self {
        Self::from_repr(GeometryRepr::Wkt(text.into()))
    }

    pub fn from_coords(coords: Vec<[f64; 2]>) -> Self {
        Self::from_repr(GeometryRepr::Coords(coords))
    }

    pub fn from_native(geometry: G) -> Self {
        Self {
            repr: None,
            parsed: OnceCell::with_value(geometry),
        }
    }

    /// Parsed geometry, parsing the stored representation on first call.
    pub fn get(&self) -> Result<&G> {
        self.parsed.get_or_try_init(|| match &self.repr {
            Some(repr) => G::parse(repr),
            None => Err(GeoMatchError::InvalidGeometry(
                "geometry has no representation".to_string(),
            )),
        })
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    pub fn repr(&self) -> Option<&GeometryRepr> {
        self.repr.as_ref()
    }
}

impl<G: ParseGeometry> Default for LazyGeometry<G> {
    fn default() -> Self {
        Self::from_repr(GeometryRepr::default())
    }
}

impl<G: ParseGeometry> Serialize for LazyGeometry<G> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::Error;

        match &self.repr {
            Some(repr) => repr.serialize(serializer),
            None => {
                let geometry = self.get().map_err(S::Error::custom)?;
                let text = to_wkt(&geometry.to_geometry()).map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
        }
    }
}

impl<'de, G: ParseGeometry> Deserialize<'de> for LazyGeometry<G> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        GeometryRepr::deserialize(deserializer).map(Self::from_repr)
    }
}

pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    Ok(Wkt(text).to_geo()?)
}

pub fn to_wkt(geometry: &Geometry<f64>) -> Result<String> {
    Ok(geometry.to_wkt()?)
}

pub fn parse_line(repr: &GeometryRepr) -> Result<LineString<f64>> {
    LineString::parse(repr)
}

pub fn parse_polygon(repr: &GeometryRepr) -> Result<Polygon<f64>> {
    Polygon::parse(repr)
}

/// Bounding rectangle as `(min_lon, min_lat, max_lon, max_lat)` corners.
pub fn bounds<G>(geometry: &G) -> Result<Rect<f64>>
where
    G: BoundingRect<f64, Output = Option<Rect<f64>>>,
{
    geometry
        .bounding_rect()
        .ok_or_else(|| GeoMatchError::InvalidGeometry("empty geometry has no bounds".to_string()))
}

/// Planar distance in degrees between a point and a linestring.
pub fn distance(point: &Point<f64>, line: &LineString<f64>) -> f64 {
    Euclidean.distance(point, line)
}

/// Orthogonal projection of `point` onto `line`.
pub fn nearest_point_on(line: &LineString<f64>, point: &Point<f64>) -> Option<Point<f64>> {
    match line.closest_point(point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
        Closest::Indeterminate => None,
    }
}

pub fn within<A, B>(inner: &A, outer: &B) -> bool
where
    A: Within<B>,
{
    inner.is_within(outer)
}

pub fn intersects<A, B>(a: &A, b: &B) -> bool
where
    A: Intersects<B>,
{
    a.intersects(b)
}

pub fn contains<A, B>(outer: &A, inner: &B) -> bool
where
    A: Contains<B>,
{
    outer.contains(inner)
}

/// Boundaries meet but interiors do not overlap.
pub fn touches(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.relate(b).is_touches()
}

/// Round polygon approximating a circle of `radius` degrees around `center`.
pub fn circle(center: Point<f64>, radius: f64) -> Result<Polygon<f64>> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(GeoMatchError::InvalidGeometry(format!(
            "circle radius must be positive, got {}",
            radius
        )));
    }
    center
        .buffer(radius)
        .0
        .into_iter()
        .next()
        .ok_or_else(|| GeoMatchError::InvalidGeometry("buffer produced no polygon".to_string()))
}

pub fn rect_polygon(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Polygon<f64> {
    Rect::new(
        Coord {
            x: min_lon,
            y: min_lat,
        },
        Coord {
            x: max_lon,
            y: max_lat,
        },
    )
    .to_polygon()
}

/// Great-circle distance in metres.
pub fn haversine_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn empty_polygon() -> Polygon<f64> {
    Polygon::new(LineString::new(vec![]), vec![])
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) => "line",
        Geometry::LineString(_) => "linestring",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multipoint",
        Geometry::MultiLineString(_) => "multilinestring",
        Geometry::MultiPolygon(_) => "multipolygon",
        Geometry::GeometryCollection(_) => "geometrycollection",
        Geometry::Rect(_) => "rect",
        Geometry::Triangle(_) => "triangle",
    }
}
