//! # Slipstream
//!
//! Resilient recording client for live motorsport timing feeds.
//!
//! Slipstream connects to a SignalR-style push feed, subscribes to a
//! caller-chosen set of topics, decodes every message (plain JSON and
//! compressed `.z` payloads alike) and appends the resulting records to a
//! durable sink, in strict arrival order, reconnecting with backoff when
//! the connection fails.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use slipstream::{AuthContext, FeedClient, JsonLinesRecorder, TopicName};
//!
//! # async fn record() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FeedClient::builder()
//!     .topic(TopicName::new("DriverList")?)
//!     .topic(TopicName::new("TimingData")?)
//!     .auth(AuthContext::Anonymous)
//!     .build()?;
//!
//! let file = std::fs::File::create("session.jsonl")?;
//! let mut recorder = JsonLinesRecorder::new(file);
//! let report = client.run(&mut recorder).await;
//! println!("{} records, outcome {:?}", report.records_delivered, report.outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layering
//!
//! The meta-crate re-exports the pieces most callers need; the underlying
//! crates (`slipstream-protocol`, `slipstream-transport`,
//! `slipstream-session`) stay importable on their own for anything finer.

mod backoff;
mod client;
mod error;
mod recorder;

pub use backoff::BackoffPolicy;
pub use client::{FeedClient, FeedClientBuilder, RunReport, TransientFailure};
pub use error::{BuildError, FatalError};
pub use recorder::JsonLinesRecorder;

pub use slipstream_protocol::TopicName;
pub use slipstream_session::{
    DecodedRecord, MemoryRecorder, Recorder, SessionConfig, SinkError, StopHandle,
};
pub use slipstream_transport::{AuthContext, FeedConfig};
