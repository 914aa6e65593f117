use std::io::{Cursor, Read, Seek};

use log::debug;
use zip::ZipArchive;

use super::{FeedError, FeedSource};

/// Feed packaged as a ZIP archive.
///
/// Only file entries are listed, by base name, so archives that nest their
/// resources in a folder still resolve `stops.txt`. When two entries share a
/// base name the first one wins.
#[derive(Debug)]
pub struct ZipFeed<R> {
    archive: ZipArchive<R>,
    entries: Vec<(String, usize)>,
}

impl<R: Read + Seek> ZipFeed<R> {
    /// Read the central directory of `reader`.
    pub fn new(reader: R) -> Result<Self, FeedError> {
        let archive = ZipArchive::new(reader).map_err(|source| FeedError::Archive { source })?;
        let mut entries: Vec<(String, usize)> = Vec::new();
        for index in 0..archive.len() {
            let Some(path) = archive.name_for_index(index) else {
                continue;
            };
            if path.ends_with('/') {
                continue;
            }
            let base = path.rsplit('/').next().unwrap_or(path);
            if entries.iter().any(|(name, _)| name == base) {
                debug!("ignoring duplicate archive entry {path}");
                continue;
            }
            entries.push((base.to_owned(), index));
        }
        Ok(Self { archive, entries })
    }
}

impl ZipFeed<Cursor<Vec<u8>>> {
    /// Read an archive held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FeedError> {
        Self::new(Cursor::new(bytes))
    }
}

impl<R: Read + Seek> FeedSource for ZipFeed<R> {
    fn resource_names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>, FeedError> {
        let index = self
            .entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, index)| *index)
            .ok_or_else(|| FeedError::Missing {
                name: name.to_owned(),
            })?;
        let file = self
            .archive
            .by_index(index)
            .map_err(|source| FeedError::ArchiveEntry {
                name: name.to_owned(),
                source,
            })?;
        Ok(Box::new(file))
    }
}
