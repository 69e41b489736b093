//! Error type shared by buckets and buffers

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors that can occur in staging operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bucket already open: {}", path.display())]
    AlreadyOpen { path: PathBuf },

    #[error("bucket not accepting writes, make sure to open it first: {}", path.display())]
    NotOpen { path: PathBuf },

    #[error("bucket accepting writes, make sure to close before reading: {}", path.display())]
    StillOpen { path: PathBuf },

    #[error("bucket has no backing file: {}", path.display())]
    NoBackingFile { path: PathBuf },

    #[error("bucket already destroyed: {}", path.display())]
    AlreadyDestroyed { path: PathBuf },

    #[error("no such bucket: {name}")]
    UnknownBucket { name: String },

    #[error("invalid bucket name {name:?}, expected a plain file name")]
    InvalidName { name: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{op} failed for {} bucket(s): {}", failures.len(), FailureList(failures))]
    Partial {
        op: &'static str,
        failures: Vec<BucketFailure>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by calling an operation in the wrong bucket state
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOpen { .. }
                | Self::NotOpen { .. }
                | Self::StillOpen { .. }
                | Self::NoBackingFile { .. }
                | Self::AlreadyDestroyed { .. }
        )
    }
}

/// Lets `Bucket` act as an `io::Read`; storage errors come back unchanged.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// One bucket's failure inside a multi-bucket operation
#[derive(Debug)]
pub struct BucketFailure {
    pub name: String,
    pub error: Error,
}

struct FailureList<'a>(&'a [BucketFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.name, failure.error)?;
        }
        Ok(())
    }
}

/// Collect fan-out failures into a single result
pub(crate) fn collect_failures(op: &'static str, failures: Vec<BucketFailure>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Partial { op, failures })
    }
}
