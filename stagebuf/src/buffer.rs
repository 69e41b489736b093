//! Buffer - registry of named buckets under one root directory
//!
//! The buffer hands out one [`Bucket`] per name, creating and opening it on
//! first reference. Its own lock guards only the name → bucket map; bucket I/O
//! happens after that lock is released, under the bucket's own lock. `reset`
//! and `destroy` are the exception: they remove files under the map lock so a
//! name cannot be reused before its old file is gone.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::bucket::{Bucket, BucketStats};
use crate::error::{collect_failures, BucketFailure, Error, Result};
use crate::fs::{FileSystem, LocalFs};
use crate::options::{BucketOptions, BufferOptions};

/// Held by the caller opening a new bucket; same-name callers wait on it
type OpenGate = Arc<Mutex<()>>;

struct Registry<F: FileSystem> {
    /// Opened buckets, visible to everyone
    buckets: HashMap<String, Arc<Bucket<F>>>,
    /// Names whose bucket is being opened right now
    opening: HashMap<String, OpenGate>,
}

/// A data buffering target
///
/// # Thread Safety
///
/// `Buffer` is `Sync` and meant to be shared through `Arc` or scoped threads.
///
/// - `get`/`write` on an existing bucket take the map's shared lock only long
///   enough to clone the `Arc<Bucket>`.
/// - Creating a bucket registers the name as opening, then opens the file with
///   the map lock released. Other callers asking for that name wait on the
///   name's gate and get the same instance; everyone else carries on. A bucket
///   is never visible before it accepts writes.
/// - `reset` and `destroy` hold the exclusive lock while removing files.
/// - `writes`, `bytes` and `size` hold the shared lock for the whole sum, so no
///   bucket is added or dropped halfway through.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use std::sync::Arc;
/// use stagebuf::{Buffer, BufferOptions, MemFs};
///
/// let buffer = Buffer::new(BufferOptions::new("stage").with_fs(Arc::new(MemFs::new())));
/// buffer.open().unwrap();
/// buffer.write("users", b"alice\n").unwrap();
/// buffer.write("users", b"bob\n").unwrap();
/// buffer.close().unwrap();
///
/// let mut out = String::new();
/// (&*buffer.get("users").unwrap()).read_to_string(&mut out).unwrap();
/// assert_eq!(out, "alice\nbob\n");
/// ```
pub struct Buffer<F: FileSystem = LocalFs> {
    opts: BufferOptions<F>,
    registry: RwLock<Registry<F>>,
}

impl<F: FileSystem> Buffer<F> {
    /// Create a buffer with no buckets. Nothing touches storage yet.
    #[must_use]
    pub fn new(opts: BufferOptions<F>) -> Self {
        Self {
            opts,
            registry: RwLock::new(Registry {
                buckets: HashMap::new(),
                opening: HashMap::new(),
            }),
        }
    }

    /// Make sure the root directory exists, creating parents as needed.
    ///
    /// # Errors
    /// The storage error if the directory cannot be created.
    pub fn open(&self) -> Result<()> {
        self.opts.fs.create_dir_all(&self.opts.root)?;
        log::debug!("buffer root ready: {}", self.opts.root.display());
        Ok(())
    }

    /// Same as [`Buffer::open`].
    ///
    /// # Errors
    /// The storage error if the directory cannot be created.
    pub fn create(&self) -> Result<()> {
        self.open()
    }

    /// Retrieve the named bucket, creating and opening it if it does not exist.
    ///
    /// # Errors
    /// `Error::InvalidName` unless `name` is a plain file name, or the storage
    /// error if a new bucket's file cannot be created. In both cases the
    /// bucket is not registered.
    pub fn get(&self, name: &str) -> Result<Arc<Bucket<F>>> {
        if let Some(bucket) = self.lookup(name) {
            return Ok(bucket);
        }
        let opts = self.opts.bucket(name)?;

        loop {
            let gate = {
                let mut registry = self.registry.write();
                if let Some(bucket) = registry.buckets.get(name) {
                    return Ok(Arc::clone(bucket));
                }
                match registry.opening.get(name) {
                    Some(gate) => Arc::clone(gate),
                    None => {
                        let gate = OpenGate::default();
                        let _held = gate.lock();
                        registry.opening.insert(name.to_string(), Arc::clone(&gate));
                        drop(registry);
                        return self.open_bucket(name, opts);
                    }
                }
            };
            // Someone else is opening this name; wait for them and look again
            drop(gate.lock());
        }
    }

    /// Open a new bucket outside the map lock, then publish it
    fn open_bucket(&self, name: &str, opts: BucketOptions<F>) -> Result<Arc<Bucket<F>>> {
        let bucket = Arc::new(Bucket::new(opts));
        let opened = bucket.open();

        let mut registry = self.registry.write();
        registry.opening.remove(name);
        opened?;
        registry.buckets.insert(name.to_string(), Arc::clone(&bucket));
        log::debug!("buffer: new bucket {name}");

        Ok(bucket)
    }

    /// Retrieve the named bucket without creating it
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<Bucket<F>>> {
        self.registry.read().buckets.get(name).cloned()
    }

    /// Add the given data to the named bucket.
    ///
    /// Safe to call concurrently; writes to one bucket keep the order in which
    /// they reach the bucket's lock.
    ///
    /// # Errors
    /// See [`Buffer::get`] and [`Bucket::write`].
    pub fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.get(name)?.write(data)
    }

    /// Add several payloads to the named bucket, back to back.
    ///
    /// # Errors
    /// See [`Buffer::get`] and [`Bucket::write_many`].
    pub fn write_all<I>(&self, name: &str, payloads: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.get(name)?.write_many(payloads)
    }

    /// Names of all tracked buckets, in no particular order
    #[must_use]
    pub fn buckets(&self) -> Vec<String> {
        self.registry.read().buckets.keys().cloned().collect()
    }

    /// Push the named bucket's memory buffer to disk immediately.
    ///
    /// # Errors
    /// `Error::UnknownBucket` if no bucket has that name, otherwise the
    /// storage error from flushing.
    pub fn flush(&self, name: &str) -> Result<()> {
        let bucket = self.lookup(name).ok_or_else(|| Error::UnknownBucket {
            name: name.to_string(),
        })?;
        bucket.flush()
    }

    /// Flush every tracked bucket.
    ///
    /// Every bucket is attempted even if some fail.
    ///
    /// # Errors
    /// `Error::Partial` naming each bucket that failed.
    pub fn flush_all(&self) -> Result<()> {
        Self::fan_out("flush", self.snapshot(), |bucket| bucket.flush())
    }

    /// Flush and seal every tracked bucket, leaving each ready for reading.
    ///
    /// Every bucket is attempted even if some fail; the ones that closed stay
    /// closed.
    ///
    /// # Errors
    /// `Error::Partial` naming each bucket that failed.
    pub fn close(&self) -> Result<()> {
        Self::fan_out("close", self.snapshot(), |bucket| bucket.close())
    }

    /// Destroy every tracked bucket and forget them, keeping the root directory.
    ///
    /// Buckets that fail to be destroyed stay tracked so the call can be
    /// retried. A bucket already destroyed by the caller counts as done.
    /// Callers asking for a bucket meanwhile wait until the reset is over.
    ///
    /// # Errors
    /// `Error::Partial` naming each bucket that failed.
    pub fn reset(&self) -> Result<()> {
        let mut registry = self.registry.write();
        self.reset_locked(&mut registry)
    }

    fn reset_locked(&self, registry: &mut Registry<F>) -> Result<()> {
        let mut failures = Vec::new();
        registry
            .buckets
            .retain(|name, bucket| match bucket.destroy() {
                Ok(()) | Err(Error::AlreadyDestroyed { .. }) => false,
                Err(error) => {
                    log::warn!("buffer reset: bucket {name} not destroyed: {error}");
                    failures.push(BucketFailure {
                        name: name.clone(),
                        error,
                    });
                    true
                }
            });
        log::debug!("buffer reset: {}", self.opts.root.display());

        collect_failures("reset", failures)
    }

    /// Delete the entire root directory and its contents. Use this to clean up
    /// when you are done with the buffer.
    ///
    /// # Errors
    /// Whatever [`Buffer::reset`] reports, in which case the root is left in
    /// place, or the storage error from removing the directory.
    pub fn destroy(&self) -> Result<()> {
        let mut registry = self.registry.write();
        self.reset_locked(&mut registry)?;
        self.opts.fs.remove_dir_all(&self.opts.root)?;
        log::debug!("buffer destroyed: {}", self.opts.root.display());
        Ok(())
    }

    /// Total writes across all tracked buckets. This does not necessarily
    /// count how much has been flushed to disk.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.registry.read().buckets.values().map(|bucket| bucket.writes()).sum()
    }

    /// Total bytes written across all tracked buckets. This does not
    /// necessarily count how much has been flushed to disk.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.registry.read().buckets.values().map(|bucket| bucket.bytes()).sum()
    }

    /// Writes and bytes summed in one pass, each bucket's pair read atomically
    #[must_use]
    pub fn stats(&self) -> BucketStats {
        self.registry.read().buckets.values().map(|bucket| bucket.stats()).sum()
    }

    /// Number of tracked buckets
    #[must_use]
    pub fn size(&self) -> usize {
        self.registry.read().buckets.len()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.opts.root
    }

    #[must_use]
    pub fn fs(&self) -> &Arc<F> {
        &self.opts.fs
    }

    fn snapshot(&self) -> Vec<(String, Arc<Bucket<F>>)> {
        self.registry
            .read()
            .buckets
            .iter()
            .map(|(name, bucket)| (name.clone(), Arc::clone(bucket)))
            .collect()
    }

    fn fan_out(
        op: &'static str,
        buckets: Vec<(String, Arc<Bucket<F>>)>,
        f: impl Fn(&Bucket<F>) -> Result<()>,
    ) -> Result<()> {
        let mut failures = Vec::new();
        for (name, bucket) in buckets {
            if let Err(error) = f(&*bucket) {
                log::warn!("buffer {op}: bucket {name} failed: {error}");
                failures.push(BucketFailure { name, error });
            }
        }
        collect_failures(op, failures)
    }
}

impl<F: FileSystem> fmt::Debug for Buffer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buffer(root={}, buckets={})",
            self.opts.root.display(),
            self.size()
        )
    }
}
