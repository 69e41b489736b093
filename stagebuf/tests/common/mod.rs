//! Shared helpers for integration tests
#![allow(dead_code)]

use parking_lot::Mutex;
use stagebuf::fs::MemFile;
use stagebuf::{Buffer, BufferOptions, FileSystem, MemFs};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

pub fn mem_buffer() -> Buffer<MemFs> {
    Buffer::new(BufferOptions::new("./test").with_fs(Arc::new(MemFs::new())))
}

/// Payload with a fixed width of 20 bytes
pub fn payload(n: usize) -> String {
    format!("{n:06}: hello world\n")
}

pub fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("injected {what} failure"))
}

/// MemFs that fails on purpose, keyed by the file name:
/// - `nocreate*`: creating the file fails
/// - `bad*`: writing to the file fails (so flushing fails)
/// - `stuck*`: removing the file fails
#[derive(Default)]
pub struct FailingFs {
    inner: MemFs,
}

fn file_name_starts_with(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(prefix))
}

pub struct FailingFile {
    inner: MemFile,
    fail_writes: bool,
}

impl Read for FailingFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for FailingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(injected("write"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FailingFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl FileSystem for FailingFs {
    type File = FailingFile;

    fn create(&self, path: &Path) -> io::Result<FailingFile> {
        if file_name_starts_with(path, "nocreate") {
            return Err(injected("create"));
        }
        Ok(FailingFile {
            inner: self.inner.create(path)?,
            fail_writes: file_name_starts_with(path, "bad"),
        })
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if file_name_starts_with(path, "stuck") {
            return Err(injected("remove"));
        }
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir_all(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path)
    }

    fn is_empty(&self, path: &Path) -> io::Result<bool> {
        self.inner.is_empty(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }
}

pub fn failing_buffer() -> Buffer<FailingFs> {
    Buffer::new(BufferOptions::new("./test").with_fs(Arc::new(FailingFs::default())))
}

/// How long a gated call waits for its release before giving up
pub const GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// MemFs that holds selected calls until the test lets them go, keyed by the
/// file name:
/// - `slowcreate*`: creating the file
/// - `slowremove*`: removing the file
///
/// Each held call reports its path on the `entered` channel, then waits for
/// one message on `release` (or `GATE_TIMEOUT`).
pub struct GatedFs {
    inner: MemFs,
    entered: Mutex<Sender<PathBuf>>,
    release: Mutex<Receiver<()>>,
}

impl GatedFs {
    pub fn new() -> (Self, Receiver<PathBuf>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let fs = Self {
            inner: MemFs::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (fs, entered_rx, release_tx)
    }

    fn hold(&self, path: &Path, prefix: &str) {
        if file_name_starts_with(path, prefix) {
            let _ = self.entered.lock().send(path.to_path_buf());
            let _ = self.release.lock().recv_timeout(GATE_TIMEOUT);
        }
    }
}

impl FileSystem for GatedFs {
    type File = MemFile;

    fn create(&self, path: &Path) -> io::Result<MemFile> {
        self.hold(path, "slowcreate");
        self.inner.create(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.hold(path, "slowremove");
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir_all(path)
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path)
    }

    fn is_empty(&self, path: &Path) -> io::Result<bool> {
        self.inner.is_empty(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }
}

pub fn gated_buffer() -> (Buffer<GatedFs>, Receiver<PathBuf>, Sender<()>) {
    let (fs, entered, release) = GatedFs::new();
    let buffer = Buffer::new(BufferOptions::new("./test").with_fs(Arc::new(fs)));
    (buffer, entered, release)
}
