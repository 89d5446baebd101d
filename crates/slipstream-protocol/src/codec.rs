//! Payload codec: recovering topic payloads from their two wire encodings.
//!
//! A topic payload arrives in one of two forms:
//!
//! 1. **Plain** — the payload is JSON embedded directly in the envelope
//!    (an object, array, number, …) or a string that is itself JSON text.
//! 2. **Compressed** — a base64 string wrapping raw-deflate-compressed
//!    UTF-8 text. The feed uses this for high-volume topics (by convention
//!    their names end in `.z`, e.g. `CarData.z`).
//!
//! Which form a given topic uses is a feed convention the client is never
//! told, so [`decode_payload`] tries plain first and falls back to the
//! compressed branch instead of consulting a per-topic table. Both branches
//! failing means the payload is genuinely malformed.
//!
//! Everything here is pure: no I/O, no state, one allocation for the
//! decoded text.

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

use crate::ProtocolError;

/// Decodes a wire payload into its final UTF-8 text form.
///
/// Decode order:
/// 1. A non-string JSON value is already plain — it is re-serialized
///    compactly.
/// 2. A string that parses as JSON is plain text and used as-is.
/// 3. Otherwise the string must be base64 + raw deflate; it is decoded,
///    inflated, and validated as UTF-8.
///
/// # Errors
/// Returns [`ProtocolError::MalformedPayload`] when no branch succeeds.
pub fn decode_payload(payload: &Value) -> Result<String, ProtocolError> {
    let text = match payload {
        Value::String(s) => s,
        other => return Ok(other.to_string()),
    };

    if serde_json::from_str::<Value>(text).is_ok() {
        return Ok(text.clone());
    }

    let compressed = general_purpose::STANDARD
        .decode(text)
        .map_err(|e| ProtocolError::MalformedPayload(format!("not plain text or base64: {e}")))?;
    let inflated = miniz_oxide::inflate::decompress_to_vec(&compressed)
        .map_err(|e| ProtocolError::MalformedPayload(format!("deflate stream: {e}")))?;
    String::from_utf8(inflated)
        .map_err(|e| ProtocolError::MalformedPayload(format!("inflated bytes not UTF-8: {e}")))
}

/// Encodes text the way the feed encodes compressed topics: raw deflate,
/// then base64.
///
/// The recorder never sends payloads — this is the test-side inverse of
/// the compressed branch of [`decode_payload`], and what a mock feed uses
/// to produce realistic `.z` traffic.
pub fn encode_compressed(text: &str) -> String {
    let deflated = miniz_oxide::deflate::compress_to_vec(text.as_bytes(), 6);
    general_purpose::STANDARD.encode(deflated)
}

// =========================================================================
// Tests
// =========================================================================
