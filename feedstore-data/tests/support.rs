//! Shared feed fixtures for behavioural tests.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::io::{Cursor, Write};

use feedstore_core::geometry::decode_geometry;
use feedstore_data::{FeedStore, MemoryFeed};
use geo::Geometry;
use zip::{ZipWriter, write::SimpleFileOptions};

pub const AGENCY: &str = "\
agency_id,agency_name,agency_url,agency_timezone
MTA NYCT,MTA New York City Transit,http://www.mta.info,America/New_York
";

pub const STOPS: &str = "\
stop_id,stop_name,stop_lat,stop_lon
S1,Main St,40.1,-73.9
S2,Oak Ave,40.2,-73.8
";

pub const ROUTES: &str = "\
route_id,agency_id,route_short_name,route_type
R,MTA NYCT,R,1
";

pub const CALENDAR: &str = "\
service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date
WKD,1,1,1,1,1,0,0,20111204,20120101
";

pub const SHAPES: &str = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence
R..S95R,40.1,-73.9,1
R..S95R,40.2,-73.8,2
R..S95R,40.3,-73.7,3
R..S12X,40.1,-73.9,1
R..S12X,40.2,-73.8,2
R..S12X,40.3,-73.7,3
R..S12X,40.4,-73.6,4
";

/// Trips whose `shape_id` is missing and must be backfilled.
pub const TRIPS_WITHOUT_SHAPES: &str = "\
route_id,service_id,trip_id,direction_id,shape_id
R,WKD,A20111204WKD_000800_R..S95R,0,
R,WKD,A20111204WKD_001300_R..S95R,0,
";

pub const STOP_TIMES: &str = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
A20111204WKD_000800_R..S95R,00:08:00,00:08:00,S1,1
A20111204WKD_000800_R..S95R,00:10:00,00:10:00,S2,2
A20111204WKD_001300_R..S95R,00:13:00,00:13:00,S1,1
";

/// Every resource of a complete feed, in archive order.
pub fn full_feed_resources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("agency.txt", AGENCY),
        ("stops.txt", STOPS),
        ("routes.txt", ROUTES),
        ("trips.txt", TRIPS_WITHOUT_SHAPES),
        ("stop_times.txt", STOP_TIMES),
        ("calendar.txt", CALENDAR),
        ("shapes.txt", SHAPES),
    ]
}

/// A complete feed held in memory.
pub fn full_feed() -> MemoryFeed {
    full_feed_resources()
        .into_iter()
        .fold(MemoryFeed::new(), |feed, (name, text)| {
            feed.with_resource(name, text)
        })
}

/// Package `resources` as a ZIP archive nested in a `gtfs/` folder.
pub fn zip_bytes(resources: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer
        .add_directory("gtfs/", options)
        .unwrap_or_else(|err| panic!("failed to add archive folder: {err}"));
    for (name, text) in resources {
        writer
            .start_file(format!("gtfs/{name}"), options)
            .unwrap_or_else(|err| panic!("failed to start entry {name}: {err}"));
        writer
            .write_all(text.as_bytes())
            .unwrap_or_else(|err| panic!("failed to write entry {name}: {err}"));
    }
    writer
        .finish()
        .unwrap_or_else(|err| panic!("failed to finish archive: {err}"))
        .into_inner()
}

/// Read one geometry cell selected by `sql`.
pub fn geometry_at(store: &FeedStore, sql: &str) -> Geometry<f64> {
    let text: String = store
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .unwrap_or_else(|err| panic!("failed to read geometry with {sql}: {err}"));
    decode_geometry(&text)
        .unwrap_or_else(|err| panic!("failed to decode {text}: {err}"))
        .1
}

/// Values of one column, in row order.
pub fn column_values(store: &FeedStore, table: &str, column: &str) -> Vec<String> {
    store
        .query_records(&format!("SELECT {column} FROM {table} ORDER BY rowid"))
        .unwrap_or_else(|err| panic!("failed to read {table}.{column}: {err}"))
        .into_iter()
        .map(|record| record.get(column).unwrap_or_default().to_owned())
        .collect()
}
