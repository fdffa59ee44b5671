use std::fs::{self, File};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use super::error::{LogError, Result};
use super::index::Index;
use super::store::Store;
use super::Config;
use crate::wire::Record;

/// One contiguous slice of the log: a store file paired with its index, both
/// named after the absolute offset of the first record they hold.
#[derive(Debug)]
pub struct Segment {
    store: Store,
    index: Index,
    store_path: PathBuf,
    index_path: PathBuf,
    /// Absolute offset of the first record in this segment.
    base_offset: u64,
    /// Absolute offset the next append will receive.
    next_offset: u64,
    config: Config,
}

impl Segment {
    /// Open (or create) the `{base_offset:020}.store` / `.index` pair in
    /// `dir`, recovering `next_offset` from the last index entry.
    pub fn open(dir: impl AsRef<Path>, base_offset: u64, config: Config) -> Result<Self> {
        let dir = dir.as_ref();

        let store_path = dir.join(format!("{base_offset:020}.store"));
        let store_file = File::options()
            .read(true)
            .create(true)
            .append(true)
            .open(&store_path)?;
        let store = Store::open(store_file)?;

        let index_path = dir.join(format!("{base_offset:020}.index"));
        let index_file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(&index_path)?;
        let index = Index::open(index_file, config.segment.max_index_bytes)?;

        let next_offset = match index.read(-1) {
            Ok((rel, _)) => base_offset + rel as u64 + 1,
            Err(LogError::OffsetOutOfRange { .. }) => base_offset,
            Err(e) => return Err(e),
        };

        Ok(Self {
            store,
            index,
            store_path,
            index_path,
            base_offset,
            next_offset,
            config,
        })
    }

    /// Append `value` as the record at `next_offset` and return that offset.
    pub fn append(&mut self, value: Bytes) -> Result<u64> {
        let offset = self.next_offset;
        let record = Record { value, offset };

        let (_, position) = self.store.append(&record.encode())?;
        self.index
            .write((offset - self.base_offset) as u32, position)?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Read back the record stored at the absolute `offset`.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let rel = offset
            .checked_sub(self.base_offset)
            .ok_or(LogError::OffsetOutOfRange { offset })?;

        let (_, position) = self.index.read(rel as i64).map_err(|e| match e {
            LogError::OffsetOutOfRange { .. } => LogError::OffsetOutOfRange { offset },
            e => e,
        })?;

        let mut frame = self.store.read(position)?;
        let (record, _) = Record::decode(&mut frame).map_err(|e| {
            LogError::InvariantViolation(format!(
                "corrupt record at store position {position}: {e:#}"
            ))
        })?;

        Ok(record)
    }

    /// Whether either file has reached its configured bound; the log rolls
    /// over to a fresh segment once this turns true.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.segment.max_store_bytes
            || self.index.size() as u64 >= self.config.segment.max_index_bytes
    }

    #[inline]
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    #[inline]
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Whether `offset` falls within `[base_offset, next_offset)`.
    #[inline]
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    pub fn close(self) -> Result<()> {
        let Self { store, index, .. } = self;
        index.close()?;
        store.close()
    }

    /// Close, then unlink both files.
    pub fn remove(self) -> Result<()> {
        let store_path = self.store_path.clone();
        let index_path = self.index_path.clone();

        self.close()?;
        fs::remove_file(index_path)?;
        fs::remove_file(store_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::SegmentConfig;

    const VALUE: &[u8] = b"hello world";

    fn config(max_store_bytes: u64, max_index_bytes: u64) -> Config {
        Config {
            segment: SegmentConfig {
                max_store_bytes,
                max_index_bytes,
                initial_offset: 0,
            },
        }
    }

    #[test]
    fn append_read_recover() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(1024, 1024);

        let mut segment = Segment::open(dir.path(), 16, config).expect("open segment");
        assert_eq!(segment.next_offset(), 16, "empty segment starts at its base");

        for i in 0..3 {
            let offset = segment.append(Bytes::from_static(VALUE)).expect("append");
            assert_eq!(offset, 16 + i);

            let record = segment.read(offset).expect("read");
            assert_eq!(record.offset, offset);
            assert_eq!(&record.value[..], VALUE);
        }

        assert!(matches!(
            segment.read(19),
            Err(LogError::OffsetOutOfRange { offset: 19 })
        ));
        assert!(matches!(
            segment.read(3),
            Err(LogError::OffsetOutOfRange { offset: 3 })
        ));

        segment.close().expect("close");

        let segment = Segment::open(dir.path(), 16, config).expect("reopen segment");
        assert_eq!(segment.next_offset(), 19, "next offset recovered from index");
        let record = segment.read(18).expect("read after reopen");
        assert_eq!(record.offset, 18);
        assert_eq!(&record.value[..], VALUE);
    }

    #[test]
    fn maxed_by_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(1024, 3 * crate::log::index::ENTRY_WIDTH as u64);

        let mut segment = Segment::open(dir.path(), 0, config).expect("open segment");
        for _ in 0..3 {
            assert!(!segment.is_maxed());
            segment.append(Bytes::from_static(VALUE)).expect("append");
        }
        assert!(segment.is_maxed(), "index at capacity");
    }

    #[test]
    fn maxed_by_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        // room for roughly two frames of VALUE plus their prefixes
        let config = config(40, 1024);

        let mut segment = Segment::open(dir.path(), 0, config).expect("open segment");
        segment.append(Bytes::from_static(VALUE)).expect("append");
        assert!(!segment.is_maxed());
        segment.append(Bytes::from_static(VALUE)).expect("append");
        assert!(segment.is_maxed(), "store past its bound");
    }

    #[test]
    fn remove_unlinks_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(1024, 1024);

        let mut segment = Segment::open(dir.path(), 0, config).expect("open segment");
        segment.append(Bytes::from_static(VALUE)).expect("append");
        segment.remove().expect("remove");

        assert!(!dir.path().join(format!("{:020}.store", 0)).exists());
        assert!(!dir.path().join(format!("{:020}.index", 0)).exists());
    }
}
