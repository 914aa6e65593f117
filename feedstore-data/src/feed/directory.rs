use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;

use super::{FeedError, FeedSource};

const RESOURCE_SUFFIX: &str = ".txt";

/// Feed that has already been unpacked into a directory.
///
/// Regular `*.txt` files directly inside the directory are listed in name
/// order; subdirectories are not searched.
#[derive(Debug)]
pub struct DirectoryFeed {
    path: Utf8PathBuf,
    dir: Dir,
    names: Vec<String>,
}

impl DirectoryFeed {
    /// List the resources in `path`.
    pub fn open(path: &Utf8Path) -> Result<Self, FeedError> {
        let listing_error = |source| FeedError::Directory {
            path: path.to_owned(),
            source,
        };
        let dir = feedstore_fs::open_dir(path).map_err(listing_error)?;
        let mut names = list_resources(&dir).map_err(listing_error)?;
        names.sort();
        Ok(Self {
            path: path.to_owned(),
            dir,
            names,
        })
    }

    /// Directory holding the resources.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

fn list_resources(dir: &Dir) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir.entries()? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name()?;
        if name.ends_with(RESOURCE_SUFFIX) {
            names.push(name);
        }
    }
    Ok(names)
}

impl FeedSource for DirectoryFeed {
    fn resource_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>, FeedError> {
        if !self.names.iter().any(|listed| listed == name) {
            return Err(FeedError::Missing {
                name: name.to_owned(),
            });
        }
        let file = self.dir.open(name).map_err(|source| FeedError::Resource {
            name: name.to_owned(),
            source,
        })?;
        Ok(Box::new(file))
    }
}
