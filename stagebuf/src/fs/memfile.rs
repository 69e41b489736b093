//! In-memory file contents and handles
//!
//! `SharedBytes` is the storage of one in-memory file; `MemFile` is an open
//! handle onto it with its own cursor.

use parking_lot::{Mutex, MutexGuard};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::sync::Arc;

/// Read-only guard to file contents
///
/// Holds the lock and provides read-only access to the underlying data.
/// The lock is released when the guard is dropped.
pub struct BytesReadGuard<'a>(MutexGuard<'a, Vec<u8>>);

impl Deref for BytesReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for BytesReadGuard<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Shared byte storage with internal locking
///
/// Backed by `Arc<Mutex<Vec<u8>>>`. Clones share the same underlying data,
/// which is how several handles to one in-memory file see each other's writes.
///
/// # Example
///
/// ```
/// use stagebuf::fs::SharedBytes;
///
/// let bytes = SharedBytes::new();
/// bytes.write_at(0, b"hello").unwrap();
///
/// let guard = bytes.lock();
/// assert_eq!(&*guard, b"hello");
/// ```
#[derive(Clone, Default)]
pub struct SharedBytes(Arc<Mutex<Vec<u8>>>);

impl SharedBytes {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    /// Write `data` starting at `offset`, zero-filling any gap and extending
    /// the contents as needed.
    ///
    /// # Errors
    /// `InvalidInput` if the end of the write overflows `usize`, `OutOfMemory`
    /// if the contents cannot grow that far.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> io::Result<()> {
        let end = offset.checked_add(data.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "write past the maximum offset")
        })?;

        let mut buf = self.0.lock();
        let len = buf.len();
        if len < end {
            buf.try_reserve(end - len)
                .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
            buf.resize(end, 0);
        }
        buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copy bytes starting at `offset` into `out`, returning how many were copied
    pub fn read_at(&self, offset: usize, out: &mut [u8]) -> usize {
        let buf = self.0.lock();
        if offset >= buf.len() {
            return 0;
        }
        let n = out.len().min(buf.len() - offset);
        out[..n].copy_from_slice(&buf[offset..offset + n]);
        n
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Lock the contents for reading
    ///
    /// The lock is held until the guard is dropped.
    #[must_use]
    pub fn lock(&self) -> BytesReadGuard<'_> {
        BytesReadGuard(self.0.lock())
    }
}

/// Open handle to an in-memory file
///
/// Each handle keeps its own cursor. The handle stays usable after the file is
/// removed from its `MemFs`, like an unlinked file on disk.
pub struct MemFile {
    data: SharedBytes,
    pos: u64,
}

impl MemFile {
    #[must_use]
    pub fn new(data: SharedBytes) -> Self {
        Self { data, pos: 0 }
    }

    fn offset(&self) -> io::Result<usize> {
        usize::try_from(self.pos)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))
    }
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read_at(self.offset()?, buf);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.write_at(self.offset()?, buf)?;
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.data.len() as u64, n),
            SeekFrom::Current(n) => (self.pos, n),
        };
        match base.checked_add_signed(delta) {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bytes_are_empty() {
        let bytes = SharedBytes::new();
        assert!(bytes.is_empty());
        assert_eq!(bytes.len(), 0);
    }

    #[test]
    fn test_clone_shares_data() {
        let bytes1 = SharedBytes::new();
        let bytes2 = bytes1.clone();

        bytes1.write_at(0, b"from bytes1").unwrap();

        let guard = bytes2.lock();
        assert_eq!(&*guard, b"from bytes1");
    }

    #[test]
    fn test_write_at_overwrites_and_extends() {
        let bytes = SharedBytes::new();
        bytes.write_at(0, b"hello").unwrap();
        bytes.write_at(3, b"p me").unwrap();
        assert_eq!(&*bytes.lock(), b"help me");

        bytes.write_at(9, b"!").unwrap();
        assert_eq!(&*bytes.lock(), b"help me\0\0!");
    }

    #[test]
    fn test_write_at_far_offset_fails() {
        let bytes = SharedBytes::new();
        let err = bytes.write_at(usize::MAX, b"ab").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        // no overflow, but far more than can be allocated
        assert!(bytes.write_at(usize::MAX - 4, b"ab").is_err());
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_file_write_after_seek_to_max_fails() {
        let mut file = MemFile::new(SharedBytes::new());
        file.seek(SeekFrom::Start(u64::MAX)).unwrap();

        let err = file.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(file.stream_position().unwrap(), u64::MAX);
    }

    #[test]
    fn test_file_write_seek_read() {
        let mut file = MemFile::new(SharedBytes::new());
        file.write_all(b"hello world").unwrap();
        assert_eq!(file.stream_position().unwrap(), 11);

        file.seek(SeekFrom::Start(6)).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert_eq!(out, "world");

        // At end of data
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_relative() {
        let mut file = MemFile::new(SharedBytes::new());
        file.write_all(b"0123456789").unwrap();

        assert_eq!(file.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(file.seek(SeekFrom::Current(-2)).unwrap(), 5);
        assert!(file.seek(SeekFrom::Current(-6)).is_err());
        assert_eq!(file.stream_position().unwrap(), 5);
    }

    #[test]
    fn test_handles_have_independent_cursors() {
        let data = SharedBytes::new();
        let mut writer = MemFile::new(data.clone());
        let mut reader = MemFile::new(data);

        writer.write_all(b"abc").unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }
}
