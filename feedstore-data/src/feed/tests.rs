//! Unit tests for the feed sources.

use super::*;
use camino::Utf8PathBuf;
use rstest::rstest;
use std::io::{Cursor, Write};
use tempfile::TempDir;
use zip::write::{SimpleFileOptions, ZipWriter};

fn read_all(feed: &mut dyn FeedSource, name: &str) -> String {
    let mut text = String::new();
    feed.open(name)
        .expect("open resource")
        .read_to_string(&mut text)
        .expect("read resource");
    text
}

fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .expect("add directory");
            continue;
        }
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(contents.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish archive").into_inner()
}

#[rstest]
fn zip_feed_lists_file_entries_by_base_name() {
    let bytes = archive(&[
        ("gtfs/", ""),
        ("gtfs/agency.txt", "agency_id\nA\n"),
        ("gtfs/stops.txt", "stop_id\nS1\n"),
        ("other/stops.txt", "stop_id\nS9\n"),
    ]);
    let mut feed = ZipFeed::from_bytes(bytes).expect("read archive");

    assert_eq!(
        feed.resource_names(),
        vec!["agency.txt".to_owned(), "stops.txt".to_owned()]
    );
    assert_eq!(read_all(&mut feed, "stops.txt"), "stop_id\nS1\n");
}

#[rstest]
fn zip_feed_rejects_corrupt_archives() {
    let err = ZipFeed::from_bytes(b"not a zip".to_vec()).expect_err("corrupt archive");
    assert!(matches!(err, FeedError::Archive { .. }));
    assert_eq!(err.kind(), FailureKind::Acquisition);
}

#[rstest]
fn directory_feed_lists_text_files_in_name_order() {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
    std::fs::write(root.join("stops.txt"), "stop_id\nS1\n").expect("write stops");
    std::fs::write(root.join("agency.txt"), "agency_id\nA\n").expect("write agency");
    std::fs::write(root.join("README.md"), "notes").expect("write readme");
    std::fs::create_dir(root.join("nested.txt")).expect("create dir");

    let mut feed = DirectoryFeed::open(&root).expect("open directory");
    assert_eq!(
        feed.resource_names(),
        vec!["agency.txt".to_owned(), "stops.txt".to_owned()]
    );
    assert_eq!(read_all(&mut feed, "agency.txt"), "agency_id\nA\n");
    assert!(matches!(
        feed.open("../secret.txt"),
        Err(FeedError::Missing { .. })
    ));
}

#[rstest]
fn memory_feed_replaces_resources_in_place() {
    let mut feed = MemoryFeed::new()
        .with_resource("agency.txt", "old")
        .with_resource("stops.txt", "stop_id\n")
        .with_resource("agency.txt", "new");
    assert_eq!(
        feed.resource_names(),
        vec!["agency.txt".to_owned(), "stops.txt".to_owned()]
    );
    assert_eq!(read_all(&mut feed, "agency.txt"), "new");
    assert!(matches!(feed.open("trips.txt"), Err(FeedError::Missing { .. })));
}
