use std::fs::File;

use bytes::{Buf as _, BufMut as _};
use memmap2::MmapMut;

use super::error::{LogError, Result};

/// Width of the relative-offset column (u32 BE).
const REL_WIDTH: usize = 4;
/// Width of the store-position column (u64 BE).
const POS_WIDTH: usize = 8;
/// Total width of one index entry.
pub const ENTRY_WIDTH: usize = REL_WIDTH + POS_WIDTH;

/// Memory-mapped offset→position table of a segment.
///
/// The file is grown to `max_index_bytes` on open so the mapping never has to
/// be re-established while the segment is active; `size` shadows the logical
/// extent, which is always a multiple of [`ENTRY_WIDTH`]. On close the file is
/// truncated back to `size`, making the entry count self-describing on reopen.
#[derive(Debug)]
pub struct Index {
    file: File,
    mmap: MmapMut,
    size: usize,
}

impl Index {
    pub fn open(file: File, max_index_bytes: u64) -> Result<Self> {
        let size = file.metadata()?.len() as usize;
        if size % ENTRY_WIDTH != 0 {
            return Err(LogError::InvariantViolation(format!(
                "index file size {size} is not a multiple of the entry width {ENTRY_WIDTH}"
            )));
        }

        file.set_len(max_index_bytes)?;

        // SAFETY: the log directory is exclusive to this instance; nothing
        // else maps or resizes the file while the Index is alive.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self { file, mmap, size })
    }

    /// Look up the entry at relative position `rel`; `-1` selects the last
    /// entry (used to recover `next_offset` on segment open).
    ///
    /// The returned pair is the entry's own relative offset and the byte
    /// position of the matching frame within the store.
    pub fn read(&self, rel: i64) -> Result<(u32, u64)> {
        if self.size == 0 || rel < -1 {
            return Err(LogError::OffsetOutOfRange {
                offset: rel.max(0) as u64,
            });
        }

        let slot = if rel == -1 {
            self.size / ENTRY_WIDTH - 1
        } else {
            rel as usize
        };

        let pos = slot * ENTRY_WIDTH;
        if pos + ENTRY_WIDTH > self.size {
            return Err(LogError::OffsetOutOfRange { offset: rel as u64 });
        }

        let mut entry = &self.mmap[pos..pos + ENTRY_WIDTH];
        Ok((entry.get_u32(), entry.get_u64()))
    }

    /// Append an entry. Fails with [`LogError::IndexFull`] when the mapping
    /// has no room left, which signals the segment to roll over.
    pub fn write(&mut self, rel: u32, position: u64) -> Result<()> {
        if self.size + ENTRY_WIDTH > self.mmap.len() {
            return Err(LogError::IndexFull);
        }

        let mut entry = &mut self.mmap[self.size..self.size + ENTRY_WIDTH];
        entry.put_u32(rel);
        entry.put_u64(position);
        self.size += ENTRY_WIDTH;

        Ok(())
    }

    /// Logical size in bytes (`entries * ENTRY_WIDTH`).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Flush the mapping, then truncate the file back to the logical size so
    /// the zero tail from the pre-grow does not survive the segment.
    pub fn close(self) -> Result<()> {
        let Self { file, mmap, size } = self;

        mmap.flush()?;
        drop(mmap);

        file.set_len(size as u64)?;
        file.sync_all()?;

        Ok(())
    }
}
