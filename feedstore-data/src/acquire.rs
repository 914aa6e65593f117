//! Feed acquisition: turn a location into a [`FeedSource`].
//!
//! `http://` and `https://` locations are downloaded with a blocking wrapper
//! around an async `reqwest` client; anything else names a local archive or
//! an unpacked directory.
//!
//! # Runtime behaviour
//!
//! [`HttpFetcher`] owns a current-thread Tokio runtime. When called from
//! inside a multi-threaded runtime it blocks on that runtime's handle through
//! [`tokio::task::block_in_place`] instead, avoiding nested-runtime panics.

use std::fmt;
use std::io::{self, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use feedstore_core::FailureKind;
use log::info;
use reqwest::Client;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use url::Url;

use crate::feed::{DirectoryFeed, FeedError, FeedSource, ZipFeed};

const USER_AGENT: &str = concat!("feedstore/", env!("CARGO_PKG_VERSION"));

/// Where a feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    /// Archive downloaded over HTTP(S).
    Remote(Url),
    /// Local ZIP archive.
    Archive(Utf8PathBuf),
    /// Already-unpacked directory of resources.
    Directory(Utf8PathBuf),
}

impl FeedLocation {
    /// Classify `location`.
    ///
    /// Text starting with `http://` or `https://` must parse as a URL; an
    /// existing directory is read in place; anything else is treated as a
    /// local archive path.
    pub fn resolve(location: &str) -> Result<Self, AcquireError> {
        let lowered = location.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            return Url::parse(location)
                .map(Self::Remote)
                .map_err(|source| AcquireError::InvalidUrl {
                    location: location.to_owned(),
                    source,
                });
        }
        let path = Utf8PathBuf::from(location);
        match feedstore_fs::is_dir(&path) {
            Ok(true) => Ok(Self::Directory(path)),
            _ => Ok(Self::Archive(path)),
        }
    }
}

impl fmt::Display for FeedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Archive(path) | Self::Directory(path) => write!(f, "{path}"),
        }
    }
}

/// Open the feed at `location`, downloading it first when remote.
pub fn acquire(location: &FeedLocation) -> Result<Box<dyn FeedSource>, AcquireError> {
    match location {
        FeedLocation::Remote(url) => {
            let bytes = HttpFetcher::new()?.fetch(url)?;
            info!("downloaded {} bytes from {url}", bytes.len());
            let feed = ZipFeed::from_bytes(bytes).map_err(|source| AcquireError::Unpack {
                location: location.to_string(),
                source,
            })?;
            Ok(Box::new(feed))
        }
        FeedLocation::Archive(path) => Ok(Box::new(open_archive(path)?)),
        FeedLocation::Directory(path) => {
            let feed = DirectoryFeed::open(path).map_err(|source| AcquireError::Unpack {
                location: path.to_string(),
                source,
            })?;
            Ok(Box::new(feed))
        }
    }
}

fn open_archive(path: &Utf8Path) -> Result<ZipFeed<BufReader<cap_std::fs_utf8::File>>, AcquireError> {
    let file = feedstore_fs::open_utf8_file(path).map_err(|source| AcquireError::Read {
        path: path.to_owned(),
        source,
    })?;
    ZipFeed::new(BufReader::new(file)).map_err(|source| AcquireError::Unpack {
        location: path.to_string(),
        source,
    })
}

/// Blocking HTTP downloader.
pub struct HttpFetcher {
    client: Client,
    runtime: Runtime,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("client", &self.client)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl HttpFetcher {
    /// Build the client and its runtime.
    pub fn new() -> Result<Self, AcquireError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| AcquireError::Client { source })?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| AcquireError::Runtime { source })?;
        Ok(Self { client, runtime })
    }

    /// Download the body at `url`. Any status of 400 or above is an error.
    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>, AcquireError> {
        let future = self.fetch_async(url);
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }

    async fn fetch_async(&self, url: &Url) -> Result<Vec<u8>, AcquireError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(AcquireError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        Ok(body.to_vec())
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &Url) -> AcquireError {
    if let Some(status) = error.status() {
        return AcquireError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        };
    }
    AcquireError::Network {
        url: url.to_string(),
        source: io::Error::other(error),
    }
}

/// Errors raised while acquiring a feed.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// A remote location did not parse as a URL.
    #[error("invalid feed URL {location}")]
    InvalidUrl {
        /// Location as given.
        location: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Client {
        /// Client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The Tokio runtime could not be built.
    #[error("failed to build Tokio runtime")]
    Runtime {
        /// Runtime failure.
        #[source]
        source: io::Error,
    },
    /// The server answered with an error status.
    #[error("GET {url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// The request failed before a response arrived.
    #[error("GET {url} failed")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport failure.
        #[source]
        source: io::Error,
    },
    /// A local archive could not be read.
    #[error("failed to read feed archive {path}")]
    Read {
        /// Archive location.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// The acquired bytes are not a readable feed.
    #[error("failed to unpack feed from {location}")]
    Unpack {
        /// Feed location.
        location: String,
        /// Unpacking failure.
        #[source]
        source: FeedError,
    },
}

impl AcquireError {
    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        FailureKind::Acquisition
    }
}
