//! Test helpers for writing small feeds and simulating configuration layers.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

const RESOURCES: &[(&str, &str)] = &[
    (
        "agency.txt",
        "agency_id,agency_name,agency_url,agency_timezone\n\
         SEPTA,SEPTA,https://www.septa.org,America/New_York\n",
    ),
    (
        "stops.txt",
        "stop_id,stop_name,stop_lat,stop_lon\n\
         1,Market East,39.9522,-75.1581\n\
         2,Suburban,39.9540,-75.1678\n",
    ),
    (
        "routes.txt",
        "route_id,agency_id,route_short_name,route_type\nAIR,SEPTA,Airport,2\n",
    ),
    (
        "trips.txt",
        "route_id,service_id,trip_id,shape_id\nAIR,WK,T1,SH1\n",
    ),
    (
        "stop_times.txt",
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         T1,08:00:00,08:00:00,1,1\n\
         T1,08:05:00,08:05:00,2,2\n",
    ),
    (
        "calendar.txt",
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
         WK,1,1,1,1,1,0,0,20240101,20241231\n",
    ),
    (
        "shapes.txt",
        "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
         SH1,39.9522,-75.1581,1\n\
         SH1,39.9540,-75.1678,2\n",
    ),
];

#[derive(Debug, Clone, Default)]
pub(super) struct LayerOverrides {
    pub(super) feed: Option<String>,
    pub(super) output: Option<Utf8PathBuf>,
}

/// An unpacked feed directory plus a scratch area for store outputs.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        let feed = root.join("feed");
        fs::create_dir(&feed).expect("create feed dir");
        for (name, contents) in RESOURCES {
            fs::write(feed.join(name), contents).expect("write feed resource");
        }
        Self { _dir: dir, root }
    }

    pub(super) fn feed(&self) -> Utf8PathBuf {
        self.root.join("feed")
    }

    pub(super) fn output(&self) -> Utf8PathBuf {
        self.root.join("out").join("feed.sqlite")
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn config(&self, output: &Utf8Path) -> BuildConfig {
        BuildConfig {
            feed: self.feed().into_string(),
            output: output.to_owned(),
            resume: false,
            spatial: false,
            clean: true,
        }
    }
}

pub(super) fn count_rows(path: &Utf8Path, table: &str) -> i64 {
    let connection = rusqlite::Connection::open(path).expect("open output store");
    connection
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })
        .expect("count rows")
}

pub(super) fn merge_layers(
    mut cli_args: BuildArgs,
    file_layer: Option<LayerOverrides>,
    env_layer: Option<LayerOverrides>,
) -> Result<BuildConfig, CliError> {
    merge_field(
        &mut cli_args.feed,
        extract_field(&env_layer, |layer| &layer.feed),
        extract_field(&file_layer, |layer| &layer.feed),
    );
    merge_field(
        &mut cli_args.output,
        extract_field(&env_layer, |layer| &layer.output),
        extract_field(&file_layer, |layer| &layer.output),
    );
    BuildConfig::try_from(cli_args)
}

fn merge_field<T: Clone>(target: &mut Option<T>, env_value: Option<T>, file_value: Option<T>) {
    if target.is_none()
        && let Some(value) = env_value.or(file_value)
    {
        *target = Some(value);
    }
}

fn extract_field<T: Clone>(
    layer: &Option<LayerOverrides>,
    accessor: fn(&LayerOverrides) -> &Option<T>,
) -> Option<T> {
    layer.as_ref().and_then(|entry| accessor(entry).clone())
}
