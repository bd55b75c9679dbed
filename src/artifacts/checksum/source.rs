use bytes::Bytes;
use file_guard::FileGuard;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::ops::DerefMut;
use std::path::Path;

/// Byte source a hash stream reads from
#[derive(Debug)]
pub(crate) enum ByteSource {
    /// File held under a shared lock for the lifetime of the stream
    File(FileGuard<Box<File>>),
    Memory(Cursor<Bytes>),
}

impl ByteSource {
    /// Open and lock a file, returning the source and its total size
    pub(crate) fn open_file(path: &Path) -> io::Result<(Self, u64)> {
        let file = Box::new(File::open(path)?);
        let size = file.metadata()?.len();
        let lock = file_guard::lock(file, file_guard::Lock::Shared, 0, 1)?;

        Ok((ByteSource::File(lock), size))
    }

    pub(crate) fn memory(buffer: Bytes) -> (Self, u64) {
        let size = buffer.len() as u64;
        (ByteSource::Memory(Cursor::new(buffer)), size)
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::File(lock) => lock.deref_mut().read(buf),
            ByteSource::Memory(cursor) => cursor.read(buf),
        }
    }
}
