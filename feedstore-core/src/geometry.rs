//! Geometry encoding shared by the derived tables.
//!
//! Geometry cells hold text of the form `SRID=4326;POINT(-73.9 40.1)`: a
//! spatial reference tag followed by WKT in `(longitude latitude)` axis order.
//! The helpers here parse coordinates from feed text, encode and decode that
//! representation, and re-segment route lines at stop locations.

use std::{collections::BTreeSet, fmt};

use geo::{CoordsIter, Distance, Euclidean, Geometry, LineString, MultiLineString, MultiPoint, Point};
use thiserror::Error;
use wkt::{ToWkt, TryFromWkt};

const SRID_PREFIX: &str = "SRID=";

/// Spatial reference identifier attached to every geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Srid(i32);

impl Srid {
    /// Wrap a raw SRID code.
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Raw SRID code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WGS 84 longitude/latitude, the reference system of every derived table.
pub const WGS84: Srid = Srid::new(4326);

/// Geometry column types used by the derived tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// A single location.
    Point,
    /// An ordered path.
    LineString,
    /// A set of locations.
    MultiPoint,
    /// A set of paths.
    MultiLineString,
}

impl GeometryType {
    /// Upper-case type name as registered in `geometry_columns`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::MultiPoint => "MULTIPOINT",
            Self::MultiLineString => "MULTILINESTRING",
        }
    }

    /// Type of `geometry`, if it is one of the supported column types.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::LineString(_) => Some(Self::LineString),
            Geometry::MultiPoint(_) => Some(Self::MultiPoint),
            Geometry::MultiLineString(_) => Some(Self::MultiLineString),
            _ => None,
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when decoding an encoded geometry cell.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The text did not start with an `SRID=<code>;` tag.
    #[error("geometry text {text:?} is missing its SRID tag")]
    MissingSrid {
        /// Offending text.
        text: String,
    },
    /// The SRID tag was not an integer.
    #[error("geometry SRID {value:?} is not an integer")]
    InvalidSrid {
        /// Offending tag value.
        value: String,
    },
    /// The WKT body failed to parse.
    #[error("invalid WKT geometry: {message}")]
    InvalidWkt {
        /// Parser message.
        message: String,
    },
}

/// Parse one coordinate component from feed text.
///
/// Surrounding whitespace is ignored; empty, non-numeric and non-finite text
/// yields `None`.
#[must_use]
pub fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Build a point from longitude and latitude, rejecting out-of-range values.
///
/// # Examples
/// ```
/// use feedstore_core::geometry::lon_lat_point;
///
/// let point = lon_lat_point(-73.9, 40.1).expect("valid coordinate");
/// assert_eq!((point.x(), point.y()), (-73.9, 40.1));
/// assert!(lon_lat_point(40.1, -173.9).is_none());
/// ```
#[must_use]
pub fn lon_lat_point(lon: f64, lat: f64) -> Option<Point<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then(|| Point::new(lon, lat))
}

/// Encode `geometry` as SRID-tagged WKT.
///
/// # Examples
/// ```
/// use feedstore_core::{WGS84, geometry::encode_geometry};
/// use geo::{Geometry, Point};
///
/// let text = encode_geometry(WGS84, &Geometry::Point(Point::new(-73.9, 40.1)));
/// assert_eq!(text, "SRID=4326;POINT(-73.9 40.1)");
/// ```
#[must_use]
pub fn encode_geometry(srid: Srid, geometry: &Geometry<f64>) -> String {
    format!("{SRID_PREFIX}{srid};{}", geometry.wkt_string())
}

/// Decode SRID-tagged WKT produced by [`encode_geometry`].
pub fn decode_geometry(text: &str) -> Result<(Srid, Geometry<f64>), GeometryError> {
    let (tag, body) = text
        .strip_prefix(SRID_PREFIX)
        .and_then(|rest| rest.split_once(';'))
        .ok_or_else(|| GeometryError::MissingSrid {
            text: text.to_owned(),
        })?;
    let code = tag
        .trim()
        .parse::<i32>()
        .map_err(|_| GeometryError::InvalidSrid {
            value: tag.to_owned(),
        })?;
    let geometry = <Geometry<f64> as TryFromWkt<f64>>::try_from_wkt_str(body).map_err(|err| {
        GeometryError::InvalidWkt {
            message: err.to_string(),
        }
    })?;
    Ok((Srid::new(code), geometry))
}

/// Number of coordinates held by `geometry`.
#[must_use]
pub fn num_points(geometry: &Geometry<f64>) -> usize {
    geometry.coords_count()
}

/// Split `line` at the vertices nearest to each stop.
///
/// Every stop claims the closest vertex of the line (the earliest on ties).
/// Consecutive claimed vertices delimit the returned segments, so the path
/// before the first and after the last served stop is dropped. Fewer than two
/// distinct claimed vertices leaves the line whole.
///
/// # Examples
/// ```
/// use feedstore_core::geometry::segment_line;
/// use geo::{LineString, Point};
///
/// let line = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
/// let stops = [Point::new(0.9, 0.1), Point::new(3.0, 0.2)];
/// let segments = segment_line(&line, &stops);
/// assert_eq!(segments, vec![LineString::from(vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)])]);
/// ```
#[must_use]
pub fn segment_line(line: &LineString<f64>, stops: &[Point<f64>]) -> Vec<LineString<f64>> {
    let vertices: Vec<Point<f64>> = line.points().collect();
    let cuts: Vec<usize> = stops
        .iter()
        .filter_map(|stop| nearest_vertex(&vertices, *stop))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if cuts.len() < 2 {
        return vec![line.clone()];
    }

    cuts.windows(2)
        .filter_map(|pair| match pair {
            [start, end] => line
                .0
                .get(*start..=*end)
                .map(|coords| LineString::new(coords.to_vec())),
            _ => None,
        })
        .collect()
}

/// Apply [`segment_line`] to every line, flattening the segments.
#[must_use]
pub fn segment_lines(lines: &MultiLineString<f64>, stops: &MultiPoint<f64>) -> MultiLineString<f64> {
    let segments = lines
        .iter()
        .flat_map(|line| segment_line(line, &stops.0))
        .collect();
    MultiLineString::new(segments)
}

fn nearest_vertex(vertices: &[Point<f64>], stop: Point<f64>) -> Option<usize> {
    vertices
        .iter()
        .enumerate()
        .map(|(index, vertex)| (index, Euclidean.distance(*vertex, stop)))
        .min_by(|(_, left), (_, right)| left.total_cmp(right))
        .map(|(index, _)| index)
}
