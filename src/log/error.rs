use thiserror::Error;

pub type Result<T, E = LogError> = std::result::Result<T, E>;

/// Errors surfaced by the log engine.
///
/// `IndexFull` is internal to the engine: the log answers it with a segment
/// rollover and a retry, so callers above [`crate::log::Log`] never observe it.
#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The requested offset has no corresponding record: below the lowest
    /// segment's base, above the highest recorded offset, or in a truncated
    /// gap.
    #[error("the requested offset is outside the log's range: {offset}")]
    OffsetOutOfRange { offset: u64 },

    /// The index has no room for another entry and the segment must roll over.
    #[error("index has no room for another entry")]
    IndexFull,

    /// On-disk state contradicts a structural invariant; the log refuses to
    /// operate on it.
    #[error("log invariant violated: {0}")]
    InvariantViolation(String),

    #[error("log is closed")]
    Closed,
}
