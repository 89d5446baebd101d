//! File-friendly recorder glue.

use std::io::Write;

use slipstream_session::{DecodedRecord, Recorder, SinkError};

/// Appends records as JSON lines to any [`Write`] sink.
///
/// One line per record — `{"topic":…,"timestamp":…,"payload":…}` — flushed
/// after every append so an accepted record is out of process buffers
/// before the next one is read off the socket. Wrap a
/// [`File`](std::fs::File) opened in append mode for the usual deployment.
pub struct JsonLinesRecorder<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesRecorder<W> {
    /// Wraps a writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Recorder for JsonLinesRecorder<W> {
    fn append(&mut self, record: &DecodedRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)
            .map_err(|e| SinkError::Other(format!("serialize record: {e}")))?;
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use slipstream_protocol::TopicName;

    fn record(topic: &str, payload: &str) -> DecodedRecord {
        DecodedRecord {
            topic: TopicName::new(topic).unwrap(),
            timestamp: Utc::now(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_append_writes_one_json_line_per_record() {
        let mut recorder = JsonLinesRecorder::new(Vec::new());
        recorder.append(&record("DriverList", "[]")).unwrap();
        recorder
            .append(&record("TimingData", r#"{"n":1}"#))
            .unwrap();

        let output = String::from_utf8(recorder.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["topic"], "DriverList");
        assert_eq!(first["payload"], "[]");
    }

    #[test]
    fn test_append_propagates_io_failure() {
        /// A writer that always fails.
        struct BrokenPipe;
        impl Write for BrokenPipe {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut recorder = JsonLinesRecorder::new(BrokenPipe);
        let result = recorder.append(&record("DriverList", "[]"));
        assert!(matches!(result, Err(SinkError::Io(_))));
    }
}
