//! Capability-based filesystem helpers shared by the feedstore crates.
//!
//! Every helper resolves an ambient directory with `cap-std` and then works
//! relative to it, so callers only ever hand over UTF-8 `camino` paths.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs::Metadata;
use cap_std::{ambient_authority, fs_utf8};
use std::io::{self, Read};
use std::path::Component;

/// Open a UTF-8 file path using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Read the whole file at `path` into memory.
pub fn read_file(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let mut file = open_utf8_file(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Open the directory at `path` using ambient authority.
pub fn open_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    fs_utf8::Dir::open_ambient_dir(path, ambient_authority())
}

/// Metadata for `path`, or `None` when nothing exists there.
pub fn entry_metadata(path: &Utf8Path) -> io::Result<Option<Metadata>> {
    let found = match path.file_name() {
        Some(name) => {
            let parent = path
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .unwrap_or_else(|| Utf8Path::new("."));
            open_dir(parent).and_then(|dir| dir.metadata(name))
        }
        None => open_dir(path).and_then(|dir| dir.dir_metadata()),
    };
    match found {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Return whether `path` exists and is a regular file.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    Ok(entry_metadata(path)?.is_some_and(|meta| meta.is_file()))
}

/// Return whether `path` exists and is a directory.
pub fn is_dir(path: &Utf8Path) -> io::Result<bool> {
    Ok(entry_metadata(path)?.is_some_and(|meta| meta.is_dir()))
}

/// Return whether anything exists at `path`.
pub fn path_exists(path: &Utf8Path) -> io::Result<bool> {
    Ok(entry_metadata(path)?.is_some())
}

/// Ensure the parent directory for `path` exists.
///
/// Absolute paths are split at their root so `cap-std` only ever creates
/// directories relative to an opened base.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }

    let (base, relative) = split_base(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    open_dir(&base)?.create_dir_all(&relative)
}

fn split_base(path: &Utf8Path) -> io::Result<(Utf8PathBuf, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let base = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => return Ok((Utf8PathBuf::from("."), path.to_owned())),
    };
    let relative = path
        .strip_prefix(&base)
        .map_err(|_| io::Error::other(format!("cannot split {path} at {base}")))?
        .to_owned();
    Ok((base, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn scratch() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        (dir, root)
    }

    #[rstest]
    fn creates_nested_parent_directories(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let target = root.join("a/b/feed.sqlite");
        ensure_parent_dir(&target).expect("create parents");
        assert!(is_dir(&root.join("a/b")).expect("stat parent"));
        assert!(!path_exists(&target).expect("stat target"));
    }

    #[rstest]
    fn distinguishes_files_from_directories(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        let file = root.join("stops.txt");
        std::fs::write(&file, "stop_id\n").expect("write file");

        assert!(file_is_file(&file).expect("stat file"));
        assert!(!is_dir(&file).expect("stat file"));
        assert!(is_dir(&root).expect("stat root"));
        assert_eq!(read_file(&file).expect("read file"), b"stop_id\n");
    }

    #[rstest]
    fn missing_paths_do_not_exist(scratch: (TempDir, Utf8PathBuf)) {
        let (_guard, root) = scratch;
        assert!(!path_exists(&root.join("nope/feed.zip")).expect("stat missing"));
        assert!(!file_is_file(&root.join("feed.zip")).expect("stat missing"));
    }
}
