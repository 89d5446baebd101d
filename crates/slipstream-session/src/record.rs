//! The recorder seam: what the session produces and where it goes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use slipstream_protocol::TopicName;

// ---------------------------------------------------------------------------
// DecodedRecord
// ---------------------------------------------------------------------------

/// One fully decoded feed message, ready for durable storage.
///
/// The payload is always the final UTF-8 text form — compressed or
/// base64-encoded bytes never cross this boundary. The timestamp is
/// *receive* time: the feed's own timestamps live inside the payload and
/// are a downstream concern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    /// Which topic this message belongs to.
    pub topic: TopicName,
    /// When the client received the message.
    pub timestamp: DateTime<Utc>,
    /// Decoded payload text.
    pub payload: String,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Errors a recorder can report back to the session.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The underlying storage failed.
    #[error("sink i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Any other append failure.
    #[error("sink failure: {0}")]
    Other(String),
}

/// Durable destination for decoded records.
///
/// `append` is deliberately synchronous: the session calls it inline from
/// the read path, so a slow recorder slows ingestion instead of silently
/// dropping data — there is no buffering layer between the socket and the
/// sink. Implementations must flush enough that an accepted record
/// survives a crash of the *feed*, though not necessarily of the process.
pub trait Recorder: Send {
    /// Appends one record.
    ///
    /// # Errors
    /// Returns [`SinkError`] when the record could not be stored; the
    /// session treats this as fatal for the current attempt.
    fn append(&mut self, record: &DecodedRecord) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// MemoryRecorder
// ---------------------------------------------------------------------------

/// A recorder that keeps everything in memory.
///
/// Mainly for tests and short interactive experiments; real runs want an
/// append-only file sink.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Vec<DecodedRecord>,
}

impl MemoryRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The records appended so far, in order.
    pub fn records(&self) -> &[DecodedRecord] {
        &self.records
    }

    /// Consumes the recorder, yielding the records.
    pub fn into_records(self) -> Vec<DecodedRecord> {
        self.records
    }
}

impl Recorder for MemoryRecorder {
    fn append(&mut self, record: &DecodedRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}
