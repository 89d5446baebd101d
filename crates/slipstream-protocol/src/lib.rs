//! Wire protocol for the Slipstream feed client.
//!
//! This crate defines the "language" the live timing feed speaks:
//!
//! - **Types** ([`Envelope`], [`MethodCall`], [`TopicUpdate`], [`TopicName`])
//!   — the structures that travel on the wire.
//! - **Payload codec** ([`decode_payload`], [`encode_compressed`]) — how a
//!   topic payload is recovered from its two wire encodings (plain JSON
//!   text; base64 + raw-deflate binary).
//! - **Subscribe builder** ([`subscribe_invocation`]) — the control message
//!   that requests server-side subscription to a topic set.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and session
//! (connection lifecycle). It performs no I/O and holds no state — every
//! function here is pure, so the whole wire format is testable without a
//! network.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope / TopicUpdate) → Session (records)
//! ```

mod codec;
mod error;
mod subscribe;
mod types;

pub use codec::{decode_payload, encode_compressed};
pub use error::ProtocolError;
pub use subscribe::subscribe_invocation;
pub use types::{Envelope, MethodCall, TopicName, TopicUpdate};
