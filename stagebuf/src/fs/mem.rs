//! In-memory implementation of FileSystem

use super::memfile::{MemFile, SharedBytes};
use super::FileSystem;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Default)]
struct Tree {
    files: HashMap<PathBuf, SharedBytes>,
    dirs: HashSet<PathBuf>,
}

impl Tree {
    /// Record every parent of `path` as a directory. Fails without changing
    /// anything if one of them is a file.
    fn add_parents(&mut self, path: &Path) -> io::Result<()> {
        let parents: Vec<&Path> = path
            .ancestors()
            .skip(1)
            .take_while(|ancestor| !ancestor.as_os_str().is_empty())
            .collect();
        if let Some(file) = parents.iter().copied().find(|p| self.files.contains_key(*p)) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("not a directory: {}", file.display()),
            ));
        }
        self.dirs.extend(parents.into_iter().map(Path::to_path_buf));
        Ok(())
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.files
            .keys()
            .chain(self.dirs.iter())
            .any(|p| p != dir && p.starts_with(dir))
    }
}

/// In-memory implementation of FileSystem
///
/// Simple hash map based storage, useful for testing and single-process use.
/// Creating a file implicitly creates its parent directories.
#[derive(Default)]
pub struct MemFs {
    tree: Mutex<Tree>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every file currently stored, sorted
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        let tree = self.tree.lock();
        let mut paths: Vec<PathBuf> = tree.files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

/// Normalize away `.` components so `./test/a` and `test/a` name the same file
fn clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

impl FileSystem for MemFs {
    type File = MemFile;

    fn create(&self, path: &Path) -> io::Result<MemFile> {
        let path = clean(path);
        let mut tree = self.tree.lock();
        if tree.dirs.contains(&path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("is a directory: {}", path.display()),
            ));
        }
        tree.add_parents(&path)?;
        let data = SharedBytes::new();
        tree.files.insert(path, data.clone());
        Ok(MemFile::new(data))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path = clean(path);
        let mut tree = self.tree.lock();
        tree.files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| not_found(&path))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = clean(path);
        let mut tree = self.tree.lock();
        if tree.files.contains_key(&path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            ));
        }
        tree.add_parents(&path)?;
        if !path.as_os_str().is_empty() {
            tree.dirs.insert(path);
        }
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = clean(path);
        let mut tree = self.tree.lock();
        tree.files.retain(|p, _| !p.starts_with(&path));
        tree.dirs.retain(|p| !p.starts_with(&path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> io::Result<bool> {
        let path = clean(path);
        let tree = self.tree.lock();
        Ok(tree.files.contains_key(&path) || tree.dirs.contains(&path))
    }

    fn is_empty(&self, path: &Path) -> io::Result<bool> {
        let path = clean(path);
        let tree = self.tree.lock();
        if let Some(data) = tree.files.get(&path) {
            return Ok(data.is_empty());
        }
        if tree.dirs.contains(&path) {
            return Ok(!tree.has_children(&path));
        }
        Err(not_found(&path))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = clean(path);
        let tree = self.tree.lock();
        tree.files
            .get(&path)
            .map(|data| data.lock().to_vec())
            .ok_or_else(|| not_found(&path))
    }
}
