use std::io::Read;

use super::{FeedError, FeedSource};

/// Feed held entirely in memory.
///
/// # Examples
/// ```
/// use feedstore_data::{FeedSource, MemoryFeed};
/// use std::io::Read;
///
/// let mut feed = MemoryFeed::new().with_resource("stops.txt", "stop_id\nS1\n");
/// assert_eq!(feed.resource_names(), vec!["stops.txt".to_owned()]);
///
/// let mut text = String::new();
/// feed.open("stops.txt")
///     .expect("resource exists")
///     .read_to_string(&mut text)
///     .expect("read resource");
/// assert_eq!(text, "stop_id\nS1\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    resources: Vec<(String, Vec<u8>)>,
}

impl MemoryFeed {
    /// An empty feed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Add or replace a resource, keeping its original position.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    /// Add or replace a resource in place.
    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        let name = name.into();
        let contents = contents.into();
        match self.resources.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = contents,
            None => self.resources.push((name, contents)),
        }
    }
}

impl FeedSource for MemoryFeed {
    fn resource_names(&self) -> Vec<String> {
        self.resources.iter().map(|(name, _)| name.clone()).collect()
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>, FeedError> {
        self.resources
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, contents)| Box::new(contents.as_slice()) as Box<dyn Read + '_>)
            .ok_or_else(|| FeedError::Missing {
                name: name.to_owned(),
            })
    }
}
