//! Records live timing topics to a JSON-lines file.
//!
//! ```text
//! feed-recorder <output.jsonl> <topic> [topic ...]
//! ```
//!
//! Credentials come from the environment: set `FEED_TOKEN` to attach a
//! bearer token, or leave it unset for the anonymous feed. Ctrl-C stops
//! the run cleanly; the file is flushed after every record either way.

use std::io::BufWriter;

use slipstream::{AuthContext, FeedClient, JsonLinesRecorder, TopicName};
use tracing::{error, info};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: feed-recorder <output.jsonl> <topic> [topic ...]");
        std::process::exit(2);
    };
    let topic_names: Vec<String> = args.collect();
    if topic_names.is_empty() {
        eprintln!("usage: feed-recorder <output.jsonl> <topic> [topic ...]");
        std::process::exit(2);
    }

    let auth = match std::env::var("FEED_TOKEN") {
        Ok(token) => {
            info!("using bearer token from FEED_TOKEN");
            AuthContext::Bearer(token)
        }
        Err(_) => AuthContext::Anonymous,
    };

    let mut builder = FeedClient::builder().auth(auth);
    for name in &topic_names {
        builder = builder.topic(TopicName::new(name.as_str())?);
    }
    let client = builder.build()?;

    // Ctrl-C requests a clean stop; the supervisor reports Completed.
    let stop = client.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — stopping");
            stop.stop();
        }
    });

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    let mut recorder = JsonLinesRecorder::new(BufWriter::new(file));

    info!(file = %path, topics = topic_names.len(), "recording started");
    let report = client.run(&mut recorder).await;

    for transient in &report.transients {
        info!(
            at = %transient.at,
            attempt = transient.attempt,
            reason = %transient.reason,
            "transient failure during run"
        );
    }

    match report.outcome {
        Ok(()) => {
            info!(
                records = report.records_delivered,
                reconnects = report.reconnects,
                "recording complete"
            );
            Ok(())
        }
        Err(fatal) => {
            error!(
                records = report.records_delivered,
                error = %fatal,
                "recording failed"
            );
            std::process::exit(1);
        }
    }
}
