use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::os::unix::fs::FileExt as _;

use bytes::Bytes;

use super::error::Result;

/// Width of the big-endian length prefix in front of every stored payload.
pub const LEN_WIDTH: u64 = 8;

/// Append-only payload file of a segment.
///
/// Frames are laid out as `[len: u64 BE][payload: len bytes]` with no header,
/// checksum or padding. Appends go through a user-space [`BufWriter`]; reads
/// are positional on the underlying file and therefore flush the buffer first,
/// which is what makes a write visible to a subsequent read without any extra
/// synchronization from the caller.
#[derive(Debug)]
pub struct Store {
    inner: parking_lot::Mutex<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    buf: BufWriter<File>,
    /// Logical size in bytes: the sum of `LEN_WIDTH + payload.len()` over all
    /// appended frames. Equals the file length after a flush.
    size: u64,
}

impl Store {
    pub fn open(file: File) -> Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            inner: parking_lot::Mutex::new(StoreInner {
                buf: BufWriter::new(file),
                size,
            }),
        })
    }

    /// Append `payload` as a new frame, returning the number of bytes written
    /// (prefix included) and the position the frame starts at.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.inner.lock();

        let position = inner.size;
        inner.buf.write_all(&(payload.len() as u64).to_be_bytes())?;
        inner.buf.write_all(payload)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;

        Ok((written, position))
    }

    /// Read back the payload of the frame starting at `position`.
    pub fn read(&self, position: u64) -> Result<Bytes> {
        let mut inner = self.inner.lock();

        // the frame may still sit in the write buffer
        inner.buf.flush()?;
        let file = inner.buf.get_ref();

        let mut len = [0u8; LEN_WIDTH as usize];
        file.read_exact_at(&mut len, position)?;

        let mut payload = vec![0u8; u64::from_be_bytes(len) as usize];
        file.read_exact_at(&mut payload, position + LEN_WIDTH)?;

        Ok(Bytes::from(payload))
    }

    /// Fill `buf` from the raw file starting at byte `offset`.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock();
        inner.buf.flush()?;
        Ok(inner.buf.get_ref().read_at(buf, offset)?)
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    pub fn close(self) -> Result<()> {
        let mut inner = self.inner.into_inner();
        inner.buf.flush()?;
        Ok(())
    }
}
