//! Session layer for the Slipstream feed client.
//!
//! A [`ConnectionSession`] owns one physical connection from open to close
//! and turns the inbound envelope stream into [`DecodedRecord`]s delivered
//! to a [`Recorder`]. It is deliberately a single-attempt unit: it never
//! negotiates, never retries, and reports exactly one [`SessionEnd`] — all
//! of which keeps every state transition testable against a mock feed
//! without a supervisor in the loop.

mod error;
mod record;
mod session;
mod stop;

pub use error::SessionError;
pub use record::{DecodedRecord, MemoryRecorder, Recorder, SinkError};
pub use session::{ConnectionSession, SessionConfig, SessionEnd, SessionState};
pub use stop::{stop_pair, StopHandle, StopSignal};
