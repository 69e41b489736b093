//! Construction options for buckets and buffers

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, LocalFs};

/// Size of the in-memory write buffer of each bucket
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Options for a single bucket
pub struct BucketOptions<F: FileSystem = LocalFs> {
    /// Location of the backing file
    pub path: PathBuf,
    pub fs: Arc<F>,
    /// Bytes held in memory before spilling to the file
    pub buffer_capacity: usize,
}

impl BucketOptions<LocalFs> {
    /// Options for a bucket on the local disk
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fs: Arc::new(LocalFs),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl<F: FileSystem> BucketOptions<F> {
    /// Replace the file system, keeping the other options
    #[must_use]
    pub fn with_fs<G: FileSystem>(self, fs: Arc<G>) -> BucketOptions<G> {
        BucketOptions {
            path: self.path,
            fs,
            buffer_capacity: self.buffer_capacity,
        }
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }
}

/// Options for a buffer
pub struct BufferOptions<F: FileSystem = LocalFs> {
    /// Directory under which every bucket file is placed
    pub root: PathBuf,
    /// Mostly here to allow an in-memory file system in tests
    pub fs: Arc<F>,
    /// Write buffer capacity handed to every bucket
    pub buffer_capacity: usize,
}

impl BufferOptions<LocalFs> {
    /// Options for a buffer on the local disk
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fs: Arc::new(LocalFs),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl<F: FileSystem> BufferOptions<F> {
    /// Replace the file system, keeping the other options
    #[must_use]
    pub fn with_fs<G: FileSystem>(self, fs: Arc<G>) -> BufferOptions<G> {
        BufferOptions {
            root: self.root,
            fs,
            buffer_capacity: self.buffer_capacity,
        }
    }

    #[must_use]
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Options for the bucket stored under `name`
    ///
    /// The name must be exactly one plain file name, so the bucket file lands
    /// directly under the root.
    pub(crate) fn bucket(&self, name: &str) -> Result<BucketOptions<F>> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => {}
            _ => {
                return Err(Error::InvalidName {
                    name: name.to_string(),
                })
            }
        }

        Ok(BucketOptions {
            path: self.root.join(name),
            fs: Arc::clone(&self.fs),
            buffer_capacity: self.buffer_capacity,
        })
    }
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

/// Buffer configuration as read from a JSON document
///
/// ```
/// use stagebuf::BufferConfig;
///
/// let config = BufferConfig::from_json(br#"{"root": "/tmp/stage"}"#).unwrap();
/// assert_eq!(config.buffer_capacity, 4096);
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    pub root: PathBuf,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl BufferConfig {
    /// Parse a configuration document from a byte slice.
    ///
    /// # Errors
    /// Returns `Error::Config` if the JSON is malformed or has unknown fields.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::Config(e.to_string()))
    }

    /// Parse a configuration document from a reader.
    ///
    /// # Errors
    /// Returns `Error::Io` if reading fails and `Error::Config` if the JSON is
    /// invalid.
    pub fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_json(&data)
    }

    /// Options for a buffer on the local disk
    #[must_use]
    pub fn into_options(self) -> BufferOptions<LocalFs> {
        BufferOptions::new(self.root).with_buffer_capacity(self.buffer_capacity)
    }
}
