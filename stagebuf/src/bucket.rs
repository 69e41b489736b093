//! Bucket - a single named byte sink backed by one file
//!
//! A bucket moves through four states:
//!
//! ```text
//!              open                 close
//!  Unopened ─────────▶ Open ◀─────▶ Closed
//!     │                 │    open     │
//!     │     destroy     │  destroy    │ destroy
//!     └───────────────▶ Destroyed ◀───┘
//!                          │
//!                          └──── open ──▶ Open
//! ```
//!
//! - Writes are accepted only in `Open`.
//! - Reads are allowed only in `Closed`; closing rewinds the file to offset 0.
//! - Opening truncates the backing file, so each open cycle starts empty.
//! - Counters survive close/open and are reset only by `destroy`.

use parking_lot::RwLock;
use std::fmt;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, LocalFs};
use crate::options::BucketOptions;

/// Lifecycle state of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// Constructed, no backing file yet
    Unopened,
    /// Backing file created, accepting writes
    Open,
    /// Flushed and rewound, ready for reading
    Closed,
    /// Backing file removed, counters reset
    Destroyed,
}

/// Backing file in its current form
enum Sink<W: Write> {
    Unopened,
    Open(BufWriter<W>),
    Closed(W),
    Destroyed,
}

impl<W: Write> Sink<W> {
    fn state(&self) -> BucketState {
        match self {
            Self::Unopened => BucketState::Unopened,
            Self::Open(_) => BucketState::Open,
            Self::Closed(_) => BucketState::Closed,
            Self::Destroyed => BucketState::Destroyed,
        }
    }
}

/// Point-in-time counters of a bucket, or a sum over several buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub writes: u64,
    pub bytes: u64,
}

impl std::ops::Add for BucketStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            writes: self.writes + other.writes,
            bytes: self.bytes + other.bytes,
        }
    }
}

impl std::iter::Sum for BucketStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, s| acc + s)
    }
}

struct Inner<W: Write> {
    sink: Sink<W>,
    writes: u64,
    bytes: u64,
}

/// A single data sink
///
/// # Thread Safety
///
/// All operations lock internally with a `parking_lot::RwLock`, so a bucket
/// can be shared between threads through `Arc`. Writes to one bucket are
/// serialized and committed in the order they acquire the lock; other buckets
/// are unaffected. `writes()`, `bytes()` and `state()` take the shared lock and
/// never observe a half-applied write.
///
/// `destroy()` racing with a write on the same bucket is the caller's problem:
/// whichever acquires the lock first wins.
pub struct Bucket<F: FileSystem = LocalFs> {
    path: PathBuf,
    fs: Arc<F>,
    buffer_capacity: usize,
    inner: RwLock<Inner<F::File>>,
}

impl<F: FileSystem> Bucket<F> {
    /// Create a bucket in the `Unopened` state. Nothing touches storage yet.
    #[must_use]
    pub fn new(opts: BucketOptions<F>) -> Self {
        Self {
            path: opts.path,
            fs: opts.fs,
            buffer_capacity: opts.buffer_capacity,
            inner: RwLock::new(Inner {
                sink: Sink::Unopened,
                writes: 0,
                bytes: 0,
            }),
        }
    }

    /// Create the backing file and start accepting writes.
    ///
    /// # Errors
    /// `Error::AlreadyOpen` if the bucket is open, or the storage error if the
    /// file cannot be created. The state is unchanged on failure.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.inner.write();

        if let Sink::Open(_) = inner.sink {
            return Err(Error::AlreadyOpen {
                path: self.path.clone(),
            });
        }

        let file = self.fs.create(&self.path)?;
        inner.sink = Sink::Open(BufWriter::with_capacity(self.buffer_capacity, file));
        log::debug!("bucket opened: {}", self.path.display());

        Ok(())
    }

    /// Flush everything in memory, stop accepting writes and rewind the file
    /// for reading.
    ///
    /// Closing an already closed bucket just rewinds it again.
    ///
    /// # Errors
    /// `Error::NoBackingFile` if the bucket was never opened or is destroyed.
    /// Flush and seek errors are passed through; a failed flush leaves the
    /// bucket open.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();

        let mut file = match std::mem::replace(&mut inner.sink, Sink::Unopened) {
            Sink::Open(writer) => match writer.into_inner() {
                Ok(file) => file,
                Err(e) => {
                    let (err, writer) = e.into_parts();
                    inner.sink = Sink::Open(writer);
                    return Err(err.into());
                }
            },
            Sink::Closed(file) => file,
            other => {
                inner.sink = other;
                return Err(Error::NoBackingFile {
                    path: self.path.clone(),
                });
            }
        };

        let rewound = file.seek(SeekFrom::Start(0));
        inner.sink = Sink::Closed(file);
        rewound?;
        log::debug!(
            "bucket closed: {} ({} writes, {} bytes)",
            self.path.display(),
            inner.writes,
            inner.bytes
        );

        Ok(())
    }

    /// Remove the backing file and reset the counters.
    ///
    /// Bytes still held in memory are discarded.
    ///
    /// # Errors
    /// `Error::AlreadyDestroyed` on a second destroy without a reopen, or the
    /// storage error if the file cannot be removed. The state is unchanged on
    /// failure.
    pub fn destroy(&self) -> Result<()> {
        let mut inner = self.inner.write();

        match inner.sink {
            Sink::Destroyed => {
                return Err(Error::AlreadyDestroyed {
                    path: self.path.clone(),
                })
            }
            Sink::Open(_) | Sink::Closed(_) => self.fs.remove_file(&self.path)?,
            Sink::Unopened => {}
        }

        if let Sink::Open(writer) = std::mem::replace(&mut inner.sink, Sink::Destroyed) {
            // Drop the pending bytes instead of flushing them into a removed file
            let (_file, _pending) = writer.into_parts();
        }
        inner.writes = 0;
        inner.bytes = 0;
        log::debug!("bucket destroyed: {}", self.path.display());

        Ok(())
    }

    /// Add the given data to this bucket.
    ///
    /// The data lands in the memory buffer; it reaches the file when the
    /// buffer fills up or on `flush`/`close`.
    ///
    /// # Errors
    /// `Error::NotOpen` unless the bucket is open, or the storage error if
    /// spilling the buffer fails.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.write_many([data])
    }

    /// Add several payloads back to back under a single lock acquisition.
    ///
    /// Each payload counts as one write. If a payload fails, the ones before
    /// it stay written and counted.
    ///
    /// # Errors
    /// Same as [`Bucket::write`].
    pub fn write_many<I>(&self, payloads: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let Sink::Open(writer) = &mut inner.sink else {
            return Err(Error::NotOpen {
                path: self.path.clone(),
            });
        };

        for payload in payloads {
            let data = payload.as_ref();
            writer.write_all(data)?;
            inner.writes += 1;
            inner.bytes += data.len() as u64;
            log::trace!("bucket {}: wrote {} bytes", self.path.display(), data.len());
        }

        Ok(())
    }

    /// Push anything held in memory to the file immediately.
    ///
    /// A no-op unless the bucket is open.
    ///
    /// # Errors
    /// The storage error if writing out the buffer fails.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if let Sink::Open(writer) = &mut inner.sink {
            writer.flush()?;
        }
        Ok(())
    }

    /// Read from the closed bucket's file at its current position.
    ///
    /// Returns 0 at end of data.
    ///
    /// # Errors
    /// `Error::StillOpen` while the bucket accepts writes,
    /// `Error::NoBackingFile` if it has no file, or the storage error.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        // Exclusive: reading moves the file cursor
        let mut inner = self.inner.write();
        match &mut inner.sink {
            Sink::Closed(file) => Ok(file.read(buf)?),
            Sink::Open(_) => Err(Error::StillOpen {
                path: self.path.clone(),
            }),
            Sink::Unopened | Sink::Destroyed => Err(Error::NoBackingFile {
                path: self.path.clone(),
            }),
        }
    }

    /// Number of writes issued to this bucket since creation or the last destroy
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.inner.read().writes
    }

    /// Number of bytes written to this bucket since creation or the last destroy
    ///
    /// Counts bytes accepted, not necessarily flushed.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.inner.read().bytes
    }

    /// Writes and bytes read together under one lock acquisition
    #[must_use]
    pub fn stats(&self) -> BucketStats {
        let inner = self.inner.read();
        BucketStats {
            writes: inner.writes,
            bytes: inner.bytes,
        }
    }

    #[must_use]
    pub fn state(&self) -> BucketState {
        self.inner.read().sink.state()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == BucketState::Open
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn fs(&self) -> &Arc<F> {
        &self.fs
    }
}

/// `io::Read` over a shared reference, so `read_to_end` works on `Arc<Bucket>`.
impl<F: FileSystem> Read for &Bucket<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Bucket::read(*self, buf).map_err(io::Error::from)
    }
}

impl<F: FileSystem> fmt::Debug for Bucket<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        write!(
            f,
            "Bucket(path={}, state={:?}, writes={}, bytes={})",
            self.path.display(),
            inner.sink.state(),
            inner.writes,
            inner.bytes
        )
    }
}
