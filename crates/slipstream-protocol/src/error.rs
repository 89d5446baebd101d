//! Error types for the protocol layer.
//!
//! Each crate in Slipstream defines its own error enum. A `ProtocolError`
//! always means "the bytes were wrong", never "the network failed" — that
//! distinction is what lets the session drop a single bad entry and keep
//! streaming instead of tearing the connection down.

/// Errors that can occur while decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The envelope text frame is not valid JSON of the expected shape.
    #[error("malformed envelope frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// A topic payload survived neither the plain-text nor the
    /// compressed-binary decode branch.
    ///
    /// This is always recoverable: the offending entry is dropped and
    /// streaming continues.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A topic name was empty. Topic names are caller-supplied and the
    /// feed silently ignores unknown ones, but an empty name is never valid.
    #[error("topic name must not be empty")]
    EmptyTopic,
}
