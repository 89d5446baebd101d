//! Builder for the subscribe control message.
//!
//! Subscriptions are requested with a client→server hub invocation:
//!
//! ```json
//! {"H":"Streaming","M":"Subscribe","A":[["CarData.z","DriverList"]],"I":0}
//! ```
//!
//! Subscriptions do not survive a physical disconnect, so the supervisor
//! re-sends this message after every reconnect. The builder itself is
//! stateless and pure: the topic set is a `BTreeSet`, so equal sets produce
//! byte-identical output no matter the insertion order — which is also what
//! makes the message trivially testable.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::TopicName;

/// Client→server invocation frame. Field order here is wire order.
#[derive(Serialize)]
struct Invocation<'a> {
    #[serde(rename = "H")]
    hub: &'a str,
    #[serde(rename = "M")]
    method: &'a str,
    #[serde(rename = "A")]
    args: [Vec<&'a TopicName>; 1],
    #[serde(rename = "I")]
    invocation_id: u64,
}

/// Builds the subscribe invocation for the given topic set.
///
/// `invocation_id` is the per-connection send counter; the server echoes
/// it (as `I`) on the reply that carries the reference data.
pub fn subscribe_invocation(
    hub: &str,
    topics: &BTreeSet<TopicName>,
    invocation_id: u64,
) -> String {
    let invocation = Invocation {
        hub,
        method: "Subscribe",
        args: [topics.iter().collect()],
        invocation_id,
    };
    // Serialization of borrowed strings cannot fail.
    serde_json::to_string(&invocation).unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================
