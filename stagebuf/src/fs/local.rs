//! Local disk implementation of FileSystem

use super::FileSystem;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// File system managing files on local disk through `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    type File = File;

    fn create(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }

    fn is_empty(&self, path: &Path) -> io::Result<bool> {
        let meta = fs::metadata(path)?;
        if meta.is_dir() {
            Ok(fs::read_dir(path)?.next().is_none())
        } else {
            Ok(meta.len() == 0)
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}
