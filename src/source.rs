//! Byte sources: plain files, gzip and bzip2 streams, in-memory buffers.
//!
//! The tokenizer only needs sequential reads plus a best-effort `seek` that
//! re-establishes sequential reading from a given byte position. Plain files
//! seek natively; compressed streams have no random access, so their `seek`
//! is emulated by reopening and discarding decompressed bytes up to the
//! target offset. That makes resuming a checkpoint on a compressed source
//! O(offset) instead of O(1).

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use log::debug;

/// Sequential byte provider with best-effort random access.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes; `Ok(0)` signals end of input.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Re-establishes sequential reading from `offset` (bytes of the
    /// decompressed stream for compressed sources).
    fn seek(&mut self, offset: u64) -> io::Result<()>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        (**self).seek(offset)
    }
}

/// In-memory source, mostly useful for tests and small documents.
impl ByteSource for io::Cursor<Vec<u8>> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.set_position(offset);
        Ok(())
    }
}

/// Uncompressed file with native seeking.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(FileSource {
            file: File::open(path)?,
        })
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).map(|_| ())
    }
}

/// Gzip-compressed file; offsets address the decompressed stream.
pub struct GzSource {
    path: PathBuf,
    reader: GzDecoder<File>,
    pos: u64,
}

impl GzSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = GzDecoder::new(File::open(&path)?);
        Ok(GzSource {
            path,
            reader,
            pos: 0,
        })
    }
}

impl ByteSource for GzSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.pos {
            debug!("reopening {} to seek back to {}", self.path.display(), offset);
            self.reader = GzDecoder::new(File::open(&self.path)?);
            self.pos = 0;
        }
        discard(&mut self.reader, offset - self.pos)?;
        self.pos = offset;
        Ok(())
    }
}

/// Bzip2-compressed file; offsets address the decompressed stream.
pub struct Bz2Source {
    path: PathBuf,
    reader: BzDecoder<File>,
    pos: u64,
}

impl Bz2Source {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = BzDecoder::new(File::open(&path)?);
        Ok(Bz2Source {
            path,
            reader,
            pos: 0,
        })
    }
}

impl ByteSource for Bz2Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.pos {
            debug!("reopening {} to seek back to {}", self.path.display(), offset);
            self.reader = BzDecoder::new(File::open(&self.path)?);
            self.pos = 0;
        }
        discard(&mut self.reader, offset - self.pos)?;
        self.pos = offset;
        Ok(())
    }
}

/// Reads and drops `n` bytes from a sequential-only stream.
fn discard<R: Read>(reader: &mut R, mut n: u64) -> io::Result<()> {
    let mut scratch = [0u8; 8192];
    while n > 0 {
        let want = scratch.len().min(n as usize);
        let got = reader.read(&mut scratch[..want])?;
        if got == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "seek target beyond end of stream",
            ));
        }
        n -= got as u64;
    }
    Ok(())
}

/// Opens `path` as a byte source, routing through gzip or bzip2
/// decompression when the extension indicates a compressed file.
pub fn open_source(path: impl AsRef<Path>) -> io::Result<Box<dyn ByteSource + Send>> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("gz") => Ok(Box::new(GzSource::open(path)?)),
        Some("bz2") | Some("bzip2") => Ok(Box::new(Bz2Source::open(path)?)),
        _ => Ok(Box::new(FileSource::open(path)?)),
    }
}
