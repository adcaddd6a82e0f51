use std::fs::File;
use std::io;
use std::path::Path;

/// A byte source supporting independent positioned reads.
///
/// Every read carries its own offset, so concurrent queries never share a
/// file cursor and need no lock around a seek-then-read sequence.
pub trait ByteSource: Send + Sync {
    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Fills `buf` from `offset`. Fails if the range is not fully available.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

/// File-backed source. On unix this maps directly to `pread`; elsewhere a
/// mutex serializes the seek-and-read pair on the shared descriptor.
pub struct FileSource {
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: std::sync::Mutex<File>,
    size: u64,
    modified: i64,
}

impl FileSource {
    pub fn open(path: &Path) -> io::Result<FileSource> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        let size = metadata.len();
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Ok(FileSource {
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: std::sync::Mutex::new(file),
            size,
            modified,
        })
    }

    /// Modification time of the underlying file, seconds since the epoch.
    pub fn modified(&self) -> i64 {
        self.modified
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(not(unix))]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = self.file.lock().expect("file lock poisoned");
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }
}

/// In-memory source, used by tests and for readers over downloaded data.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> MemorySource {
        MemorySource { data }
    }
}

impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "read range overflows")
        })?;
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at offset {} past end of {} byte source",
                    buf.len(), offset, self.data.len()),
            ));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}
