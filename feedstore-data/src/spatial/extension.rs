//! Geometry SQL functions installed on a store connection.
//!
//! Geometries cross the SQL boundary as SRID-tagged WKT text. Every function
//! returns `NULL` when an argument is missing or unusable instead of raising
//! an error, so a bad coordinate surfaces later as a row-count mismatch.
//! The aggregates sort their inputs before building a value, making their
//! output independent of row order.

use feedstore_core::geometry::{
    decode_geometry, encode_geometry, lon_lat_point, num_points, parse_coordinate, segment_lines,
};
use feedstore_core::Srid;
use geo::{Geometry, LineString, MultiLineString, MultiPoint, Point};
use rusqlite::functions::{Aggregate, Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

const VERSION_FUNCTION: &str = "feedstore_spatial_version";

/// Register every geometry function on `connection`.
pub fn install(connection: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    connection.create_scalar_function(VERSION_FUNCTION, 0, flags, |_| {
        Ok(concat!("feedstore-spatial ", env!("CARGO_PKG_VERSION")))
    })?;
    connection.create_scalar_function("MakePoint", 3, flags, |ctx| {
        Ok(make_point(ctx.get_raw(0), ctx.get_raw(1), ctx.get_raw(2)))
    })?;
    connection.create_scalar_function("SegmentLines", 2, flags, |ctx| {
        Ok(segment(ctx.get_raw(0), ctx.get_raw(1)))
    })?;
    connection.create_scalar_function("NumPoints", 1, flags, |ctx| {
        Ok(decode(ctx.get_raw(0)).map(|(_, geometry)| {
            i64::try_from(num_points(&geometry)).unwrap_or(i64::MAX)
        }))
    })?;
    connection.create_aggregate_function("MakeLine", 4, flags, MakeLine)?;
    connection.create_aggregate_function("CollectLines", 1, flags, CollectLines)?;
    connection.create_aggregate_function("CollectPoints", 1, flags, CollectPoints)?;
    Ok(())
}

/// Whether the geometry functions answer on `connection`.
#[must_use]
pub fn is_available(connection: &Connection) -> bool {
    connection
        .query_row(&format!("SELECT {VERSION_FUNCTION}()"), [], |row| {
            row.get::<_, String>(0)
        })
        .is_ok()
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer coordinates are far inside the exactly representable range"
)]
fn number(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(number) => Some(number as f64),
        ValueRef::Real(number) => Some(number).filter(|number| number.is_finite()),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_coordinate),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

fn srid(value: ValueRef<'_>) -> Option<Srid> {
    match value {
        ValueRef::Integer(code) => i32::try_from(code).ok().map(Srid::new),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .map(Srid::new),
        _ => None,
    }
}

fn decode(value: ValueRef<'_>) -> Option<(Srid, Geometry<f64>)> {
    match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| decode_geometry(text).ok()),
        _ => None,
    }
}

fn point_from(lon: ValueRef<'_>, lat: ValueRef<'_>) -> Option<Point<f64>> {
    lon_lat_point(number(lon)?, number(lat)?)
}

fn make_point(lon: ValueRef<'_>, lat: ValueRef<'_>, code: ValueRef<'_>) -> Option<String> {
    let point = point_from(lon, lat)?;
    Some(encode_geometry(srid(code)?, &Geometry::Point(point)))
}

fn segment(lines: ValueRef<'_>, points: ValueRef<'_>) -> Option<String> {
    let (code, geometry) = decode(lines)?;
    let lines = match geometry {
        Geometry::MultiLineString(lines) => lines,
        Geometry::LineString(line) => MultiLineString::new(vec![line]),
        _ => return None,
    };
    let stops = match points {
        ValueRef::Null => MultiPoint::new(Vec::new()),
        other => match decode(other)?.1 {
            Geometry::MultiPoint(points) => points,
            Geometry::Point(point) => MultiPoint::new(vec![point]),
            _ => return None,
        },
    };
    Some(encode_geometry(
        code,
        &Geometry::MultiLineString(segment_lines(&lines, &stops)),
    ))
}

/// Ordered line builder: `MakeLine(sequence, lon, lat, srid)`.
struct MakeLine;

#[derive(Default)]
struct LineParts {
    srid: Option<Srid>,
    vertices: Vec<(f64, Point<f64>)>,
    invalid: bool,
}

impl Aggregate<LineParts, Option<String>> for MakeLine {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<LineParts> {
        Ok(LineParts::default())
    }

    fn step(&self, ctx: &mut Context<'_>, parts: &mut LineParts) -> rusqlite::Result<()> {
        let sequence = number(ctx.get_raw(0));
        let point = point_from(ctx.get_raw(1), ctx.get_raw(2));
        let code = srid(ctx.get_raw(3));
        match (sequence, point, code) {
            (Some(sequence), Some(point), Some(code)) => {
                parts.srid.get_or_insert(code);
                parts.vertices.push((sequence, point));
            }
            _ => parts.invalid = true,
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        parts: Option<LineParts>,
    ) -> rusqlite::Result<Option<String>> {
        let Some(mut parts) = parts else {
            return Ok(None);
        };
        if parts.invalid || parts.vertices.len() < 2 {
            return Ok(None);
        }
        parts
            .vertices
            .sort_by(|(left, _), (right, _)| left.total_cmp(right));
        let line: LineString<f64> = parts.vertices.iter().map(|(_, point)| *point).collect();
        Ok(parts
            .srid
            .map(|code| encode_geometry(code, &Geometry::LineString(line))))
    }
}

/// Distinct line union: `CollectLines(geom)`.
struct CollectLines;

struct Collected<T> {
    srid: Option<Srid>,
    items: Vec<T>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            srid: None,
            items: Vec::new(),
        }
    }
}

impl Aggregate<Collected<LineString<f64>>, Option<String>> for CollectLines {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Collected<LineString<f64>>> {
        Ok(Collected::default())
    }

    fn step(
        &self,
        ctx: &mut Context<'_>,
        collected: &mut Collected<LineString<f64>>,
    ) -> rusqlite::Result<()> {
        if let Some((code, geometry)) = decode(ctx.get_raw(0)) {
            collected.srid.get_or_insert(code);
            match geometry {
                Geometry::LineString(line) => collected.items.push(line),
                Geometry::MultiLineString(lines) => collected.items.extend(lines),
                _ => {}
            }
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        collected: Option<Collected<LineString<f64>>>,
    ) -> rusqlite::Result<Option<String>> {
        let Some(Collected {
            srid: Some(code),
            items,
        }) = collected
        else {
            return Ok(None);
        };
        let mut keyed: Vec<(String, LineString<f64>)> = items
            .into_iter()
            .map(|line| (line_key(&line), line))
            .collect();
        keyed.sort_by(|(left, _), (right, _)| left.cmp(right));
        keyed.dedup_by(|(left, _), (right, _)| left == right);
        let lines = MultiLineString::new(keyed.into_iter().map(|(_, line)| line).collect());
        Ok(Some(encode_geometry(code, &Geometry::MultiLineString(lines))))
    }
}

fn line_key(line: &LineString<f64>) -> String {
    line.coords()
        .map(|coord| format!("{} {}", coord.x, coord.y))
        .collect::<Vec<_>>()
        .join(",")
}

/// Distinct point set: `CollectPoints(geom)`.
struct CollectPoints;

impl Aggregate<Collected<Point<f64>>, Option<String>> for CollectPoints {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<Collected<Point<f64>>> {
        Ok(Collected::default())
    }

    fn step(
        &self,
        ctx: &mut Context<'_>,
        collected: &mut Collected<Point<f64>>,
    ) -> rusqlite::Result<()> {
        if let Some((code, geometry)) = decode(ctx.get_raw(0)) {
            collected.srid.get_or_insert(code);
            match geometry {
                Geometry::Point(point) => collected.items.push(point),
                Geometry::MultiPoint(points) => collected.items.extend(points),
                _ => {}
            }
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        collected: Option<Collected<Point<f64>>>,
    ) -> rusqlite::Result<Option<String>> {
        let Some(Collected {
            srid: Some(code),
            mut items,
        }) = collected
        else {
            return Ok(None);
        };
        items.sort_by(|left, right| {
            left.x()
                .total_cmp(&right.x())
                .then_with(|| left.y().total_cmp(&right.y()))
        });
        items.dedup();
        Ok(Some(encode_geometry(
            code,
            &Geometry::MultiPoint(MultiPoint::new(items)),
        )))
    }
}
