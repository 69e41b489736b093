//! Disk-backed staging area for pipeline data
//!
//! Callers write opaque byte records into named buckets. Each bucket buffers
//! in memory and spills to its own file; once closed, a bucket can be read
//! back sequentially. The [`Buffer`] owns the set of buckets under one root
//! directory and keeps aggregate counts.

pub mod bucket;
pub mod buffer;
pub mod error;
pub mod fs;
pub mod options;

// Re-export core types for convenience
pub use bucket::{Bucket, BucketState, BucketStats};
pub use buffer::Buffer;
pub use error::{BucketFailure, Error, Result};

// Re-export storage backends for convenience
pub use fs::{FileSystem, LocalFs, MemFs};

// Re-export configuration
pub use options::{BucketOptions, BufferConfig, BufferOptions, DEFAULT_BUFFER_CAPACITY};
