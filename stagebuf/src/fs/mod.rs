//! Filesystem capability for stagebuf
//!
//! Buckets never touch `std::fs` directly. Everything goes through the
//! [`FileSystem`] trait so the same buffer can stage to local disk or to memory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Buffer (bucket registry)           │
//! │  - names buckets by path            │
//! │  - aggregate writes/bytes           │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ owns one Bucket per name
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  Bucket (single sink)               │
//! │  - BufWriter over FileSystem::File  │
//! │  - open/closed/destroyed states     │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ create/remove/mkdir
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  FileSystem (storage capability)    │
//! └─────────────────────────────────────┘
//!      ▲              ▲
//!      │              │
//!   LocalFs         MemFs
//! ```

pub mod local;
pub mod mem;
pub mod memfile;

pub use local::LocalFs;
pub use mem::MemFs;
pub use memfile::{MemFile, SharedBytes};

use std::io::{self, Read, Seek, Write};
use std::path::Path;

/// Storage backend used by buckets and buffers
///
/// Implementations must be shareable between threads: a single instance is
/// held by the buffer and by every bucket it creates.
pub trait FileSystem: Send + Sync + 'static {
    /// Handle returned by [`FileSystem::create`]
    type File: Read + Write + Seek + Send + Sync + 'static;

    /// Create a file for writing, truncating it if it already exists.
    ///
    /// The returned handle must also support reading back what was written.
    fn create(&self, path: &Path) -> io::Result<Self::File>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything below it.
    ///
    /// Succeeds if the path does not exist.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Check whether a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Check whether a file has zero length or a directory has no entries.
    fn is_empty(&self, path: &Path) -> io::Result<bool>;

    /// Read a whole file into memory.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Check whether the file at `path` contains `needle` anywhere in it.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn file_contains<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    needle: &[u8],
) -> io::Result<bool> {
    let data = fs.read(path)?;
    if needle.is_empty() {
        return Ok(true);
    }
    Ok(data.windows(needle.len()).any(|window| window == needle))
}
