use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::wire::Record;

pub use self::error::{LogError, Result};

pub mod error;
pub mod index;
pub mod segment;
pub mod store;

use self::segment::Segment;

const DEFAULT_MAX_STORE_BYTES: u64 = 1024;
const DEFAULT_MAX_INDEX_BYTES: u64 = 1024;

#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub segment: SegmentConfig,
}

/// Segment sizing knobs; zero values fall back to the defaults applied by
/// [`Log::open`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SegmentConfig {
    /// Store size at which the active segment rolls over.
    pub max_store_bytes: u64,
    /// Index file size; the index is pre-grown to this on segment open.
    pub max_index_bytes: u64,
    /// Base offset of the first segment in an empty log.
    pub initial_offset: u64,
}

/// The ordered collection of segments backing one commit log, with exactly
/// one active segment at the tail receiving appends.
///
/// The log directory is owned exclusively by this instance; opening two logs
/// over the same directory is undefined behavior.
#[derive(Debug)]
pub struct Log {
    dir: PathBuf,
    config: Config,
    inner: RwLock<LogInner>,
}

#[derive(Debug)]
struct LogInner {
    /// Segments in ascending `base_offset` order; the last one is active.
    segments: Vec<Segment>,
    closed: bool,
}

impl LogInner {
    fn active(&self) -> Result<&Segment> {
        if self.closed {
            return Err(LogError::Closed);
        }
        self.segments.last().ok_or(LogError::Closed)
    }

    fn active_mut(&mut self) -> Result<&mut Segment> {
        if self.closed {
            return Err(LogError::Closed);
        }
        self.segments.last_mut().ok_or(LogError::Closed)
    }
}

impl Log {
    /// Open the log in `dir`, recovering any existing segments from disk.
    ///
    /// Base offsets are parsed from the `{base:020}.store` / `.index` file
    /// names; one segment is opened per base, sorted ascending. An empty
    /// directory gets a fresh segment at `config.segment.initial_offset`.
    pub fn open(dir: impl AsRef<Path>, mut config: Config) -> Result<Self> {
        if config.segment.max_store_bytes == 0 {
            config.segment.max_store_bytes = DEFAULT_MAX_STORE_BYTES;
        }
        if config.segment.max_index_bytes == 0 {
            config.segment.max_index_bytes = DEFAULT_MAX_INDEX_BYTES;
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut bases = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
                continue;
            };
            if !matches!(ext, "store" | "index") {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let base = stem.parse::<u64>().map_err(|_| {
                LogError::InvariantViolation(format!(
                    "segment file {path:?} does not encode a base offset"
                ))
            })?;
            bases.push(base);
        }

        bases.sort_unstable();
        bases.dedup();

        let mut segments = Vec::with_capacity(bases.len().max(1));
        for base in bases {
            segments.push(Segment::open(&dir, base, config)?);
        }

        for pair in segments.windows(2) {
            if pair[1].base_offset() != pair[0].next_offset() {
                return Err(LogError::InvariantViolation(format!(
                    "segments are not contiguous: {} follows {}",
                    pair[1].base_offset(),
                    pair[0].next_offset()
                )));
            }
        }

        if segments.is_empty() {
            segments.push(Segment::open(&dir, config.segment.initial_offset, config)?);
        } else {
            info!(
                segments = segments.len(),
                lowest = segments[0].base_offset(),
                "recovered log from {dir:?}"
            );
        }

        Ok(Self {
            dir,
            config,
            inner: RwLock::new(LogInner {
                segments,
                closed: false,
            }),
        })
    }

    /// Append `value` to the active segment, rolling over to a new segment
    /// when the active one is full. Returns the assigned absolute offset.
    pub fn append(&self, value: Bytes) -> Result<u64> {
        let mut inner = self.inner.write();

        let offset = match inner.active_mut()?.append(value.clone()) {
            // no room left in the index: install a fresh segment and retry
            Err(LogError::IndexFull) => {
                let base = inner.active()?.next_offset();
                let segment = Segment::open(&self.dir, base, self.config)?;
                inner.segments.push(segment);
                inner.active_mut()?.append(value)?
            }
            other => other?,
        };

        if inner.active()?.is_maxed() {
            let base = offset + 1;
            debug!(base_offset = base, "active segment maxed, rolling over");
            let segment = Segment::open(&self.dir, base, self.config)?;
            inner.segments.push(segment);
        }

        Ok(offset)
    }

    /// Read the record stored at `offset`.
    pub fn read(&self, offset: u64) -> Result<Record> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(LogError::Closed);
        }

        inner
            .segments
            .iter()
            .find(|segment| segment.contains(offset))
            .ok_or(LogError::OffsetOutOfRange { offset })?
            .read(offset)
    }

    /// The offset of the most recently appended record; 0 for a log that has
    /// never been appended to.
    pub fn highest_offset(&self) -> Result<u64> {
        let inner = self.inner.read();
        let next = inner.active()?.next_offset();
        Ok(next.saturating_sub(1))
    }

    /// The base offset of the oldest retained segment.
    pub fn lowest_offset(&self) -> Result<u64> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(LogError::Closed);
        }
        inner
            .segments
            .first()
            .map(Segment::base_offset)
            .ok_or(LogError::Closed)
    }

    /// Drop every segment whose records all lie below `lowest`.
    ///
    /// Ages out old data a whole segment at a time; records within retained
    /// segments are never touched.
    pub fn truncate(&self, lowest: u64) -> Result<()> {
        let mut inner = self.inner.write();
        let next = inner.active()?.next_offset();

        let mut removed = std::mem::take(&mut inner.segments);
        let split = removed.partition_point(|segment| segment.next_offset() <= lowest);
        inner.segments = removed.split_off(split);

        // everything fell below the low-water mark: re-seed the tail
        if inner.segments.is_empty() {
            inner.segments.push(Segment::open(&self.dir, next, self.config)?);
        }

        for segment in removed {
            info!(
                base_offset = segment.base_offset(),
                "removing segment below low-water mark {lowest}"
            );
            segment.remove()?;
        }

        Ok(())
    }

    /// Close every segment in order. Further operations fail with
    /// [`LogError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        for segment in std::mem::take(&mut inner.segments) {
            segment.close()?;
        }

        Ok(())
    }

    /// Close the log and delete its directory tree.
    pub fn remove(&self) -> Result<()> {
        self.close()?;
        fs::remove_dir_all(&self.dir)?;
        Ok(())
    }

    /// Remove the log, then re-open it empty in the same directory.
    pub fn reset(&self) -> Result<()> {
        self.remove()?;

        let mut inner = self.inner.write();
        fs::create_dir_all(&self.dir)?;
        inner
            .segments
            .push(Segment::open(&self.dir, self.config.segment.initial_offset, self.config)?);
        inner.closed = false;

        Ok(())
    }
}
