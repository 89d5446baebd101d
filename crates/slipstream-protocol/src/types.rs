//! Core wire types for the feed's message envelope.
//!
//! The feed speaks the classic SignalR 1.5 hub protocol: every inbound
//! frame is one JSON *envelope* with short single-letter field names.
//! The fields relevant to a recording client:
//!
//! - `C` — a cursor the server advances per envelope. Retransmitted
//!   envelopes carry the cursor they were first sent with, which is what
//!   makes duplicate detection possible.
//! - `R` — reference data: a map of `topic → full-state payload`, sent
//!   exactly once as the reply to the subscribe invocation.
//! - `I` — invocation id, echoed on replies to client invocations.
//! - `M` — method calls: the continuous stream of per-topic updates.
//! - `E` — a server-reported error string.
//!
//! An empty object `{}` is a valid envelope — the server uses it as a
//! keep-alive — so every field here is optional.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// TopicName
// ---------------------------------------------------------------------------

/// The name of a feed data category, e.g. `"DriverList"` or `"CarData.z"`.
///
/// Newtype wrapper so a topic can't be confused with any other string in a
/// signature, and so emptiness is checked once at the boundary instead of
/// everywhere a topic is used. The `.z` suffix is a feed convention for
/// topics whose payloads arrive compressed; the codec does not rely on it
/// (see [`decode_payload`](crate::decode_payload)).
///
/// `#[serde(transparent)]` serializes a `TopicName` as the bare string, so
/// `TopicName("DriverList")` is `"DriverList"` on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TopicName(String);

impl TopicName {
    /// Creates a topic name, rejecting the empty string.
    ///
    /// # Errors
    /// Returns [`ProtocolError::EmptyTopic`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProtocolError::EmptyTopic);
        }
        Ok(Self(name))
    }

    /// Returns the topic as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// MethodCall
// ---------------------------------------------------------------------------

/// The hub method the feed uses to push topic updates.
pub const FEED_METHOD: &str = "feed";

/// One server→client hub invocation inside an envelope's `M` array.
///
/// For the timing feed the only interesting shape is
/// `{"H": "<hub>", "M": "feed", "A": [topic, payload, feed timestamp]}`,
/// but the struct tolerates anything — unknown hubs and methods are
/// filtered out during flattening, not rejected during parsing, so a new
/// server-side method can never break the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// The hub that originated the call (`H`).
    #[serde(rename = "H", default)]
    pub hub: String,

    /// The method name (`M`).
    #[serde(rename = "M", default)]
    pub method: String,

    /// Positional arguments (`A`). For `feed` calls: topic name, payload,
    /// and the feed's own timestamp (which the recorder ignores — records
    /// are stamped with receive time).
    #[serde(rename = "A", default)]
    pub args: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One wire frame from the feed, parsed but not yet flattened.
///
/// ```text
/// ┌──────────────────────────────────────────────┐
/// │ C: "d-8A47,0|BP,2"          ← cursor          │
/// │ R: { "DriverList": {...} }  ← reference data  │
/// │ M: [ {H,M,A}, {H,M,A} ]     ← method calls    │
/// └──────────────────────────────────────────────┘
/// ```
///
/// All fields are optional: `{}` decodes to an empty envelope and is a
/// keep-alive, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message cursor (`C`). Shared by every method call in the envelope;
    /// a retransmitted envelope repeats its original cursor.
    #[serde(rename = "C", skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    /// Reference data (`R`): topic → initial full-state payload. Present
    /// exactly once per subscription, on the reply to the subscribe
    /// invocation. A `BTreeMap` keeps flattening order stable.
    #[serde(rename = "R", skip_serializing_if = "Option::is_none")]
    pub reference: Option<BTreeMap<String, Value>>,

    /// Invocation id (`I`) echoed on replies. Some server builds send it
    /// as a string, some as a number, so it stays a raw [`Value`].
    #[serde(rename = "I", skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<Value>,

    /// Method calls (`M`) in server send order.
    #[serde(rename = "M", default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<MethodCall>,

    /// Server-reported error (`E`).
    #[serde(rename = "E", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Parses one raw text frame into an `Envelope`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Frame`] if the frame is not valid JSON of
    /// the envelope shape.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Serializes the envelope back to a wire frame.
    ///
    /// The recorder never sends envelopes; this exists for tests and mock
    /// feeds, and keeps the field attributes honest in both directions.
    pub fn encode(&self) -> String {
        // Serialization of a Value-bearing struct cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// `true` if this envelope carries nothing: no reference data, no
    /// method calls, no error. The server sends these as keep-alives.
    pub fn is_keepalive(&self) -> bool {
        self.reference.is_none() && self.messages.is_empty() && self.error.is_none()
    }

    /// `true` if this envelope carries reference data — the implicit
    /// acknowledgement of a subscribe invocation.
    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Flattens the envelope into per-topic updates, in emission order:
    /// reference entries first (stable topic order), then method calls in
    /// server send order.
    ///
    /// Method calls are tagged with a sequence id derived from the
    /// envelope cursor and the call's index, so a retransmitted envelope
    /// produces colliding ids while two distinct calls in one envelope do
    /// not. Reference entries carry no sequence id — a reconnect may
    /// legitimately re-deliver them as full-state replacements.
    ///
    /// Calls from foreign hubs, with methods other than [`FEED_METHOD`],
    /// or with malformed argument shapes are skipped.
    pub fn updates(&self, hub: &str) -> Vec<TopicUpdate> {
        let mut out = Vec::new();

        if let Some(reference) = &self.reference {
            for (topic, payload) in reference {
                let Ok(topic) = TopicName::new(topic.as_str()) else {
                    continue;
                };
                out.push(TopicUpdate {
                    topic,
                    payload: payload.clone(),
                    seq: None,
                });
            }
        }

        for (index, call) in self.messages.iter().enumerate() {
            if !call.hub.eq_ignore_ascii_case(hub) || call.method != FEED_METHOD {
                continue;
            }
            let Some(Value::String(topic)) = call.args.first() else {
                continue;
            };
            let Some(payload) = call.args.get(1) else {
                continue;
            };
            let Ok(topic) = TopicName::new(topic.as_str()) else {
                continue;
            };
            out.push(TopicUpdate {
                topic,
                payload: payload.clone(),
                seq: self.cursor.as_ref().map(|c| format!("{c}.{index}")),
            });
        }

        out
    }
}

// ---------------------------------------------------------------------------
// TopicUpdate
// ---------------------------------------------------------------------------

/// One flattened per-topic entry, ready for payload decoding.
///
/// This is the unit the session deduplicates and turns into a record. The
/// payload is still in wire form here — [`decode_payload`](crate::decode_payload)
/// produces the final text.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicUpdate {
    /// The topic this update belongs to.
    pub topic: TopicName,

    /// The raw payload value as it appeared on the wire.
    pub payload: Value,

    /// Sequence id for duplicate detection, `None` for reference entries
    /// and for method calls in cursor-less envelopes.
    pub seq: Option<String>,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The feed's wire format is an external contract — these tests pin
    //! the exact JSON shapes so a serde attribute change can't silently
    //! desynchronize us from the server.

    use super::*;
    use serde_json::json;

    // =====================================================================
    // TopicName
    // =====================================================================

    #[test]
    fn test_topic_name_rejects_empty() {
        assert!(matches!(
            TopicName::new(""),
            Err(ProtocolError::EmptyTopic)
        ));
    }

    #[test]
    fn test_topic_name_serializes_as_bare_string() {
        let topic = TopicName::new("DriverList").unwrap();
        let json = serde_json::to_string(&topic).unwrap();
        assert_eq!(json, "\"DriverList\"");
    }

    #[test]
    fn test_topic_name_display() {
        let topic = TopicName::new("CarData.z").unwrap();
        assert_eq!(topic.to_string(), "CarData.z");
    }

    // =====================================================================
    // Envelope decoding — shapes observed from the live feed
    // =====================================================================

    #[test]
    fn test_decode_empty_object_is_keepalive() {
        let envelope = Envelope::decode("{}").expect("keep-alive must decode");
        assert!(envelope.is_keepalive());
        assert!(envelope.updates("Streaming").is_empty());
    }

    #[test]
    fn test_decode_subscribe_reply_with_reference_data() {
        let frame = r#"{"R":{"DriverList":{"1":"VER"},"SessionInfo":{"Name":"Race"}},"I":"0"}"#;
        let envelope = Envelope::decode(frame).unwrap();

        assert!(envelope.has_reference());
        assert_eq!(envelope.invocation_id, Some(json!("0")));
        let reference = envelope.reference.as_ref().unwrap();
        assert_eq!(reference.len(), 2);
    }

    #[test]
    fn test_decode_feed_frame_with_cursor_and_messages() {
        let frame = r#"{"C":"d-1,2|F,3","M":[{"H":"Streaming","M":"feed","A":["TimingData",{"Lines":{}},"2026-08-02T14:03:11.32Z"]}]}"#;
        let envelope = Envelope::decode(frame).unwrap();

        assert_eq!(envelope.cursor.as_deref(), Some("d-1,2|F,3"));
        assert_eq!(envelope.messages.len(), 1);
        assert_eq!(envelope.messages[0].hub, "Streaming");
        assert_eq!(envelope.messages[0].method, "feed");
    }

    #[test]
    fn test_decode_numeric_invocation_id() {
        let envelope = Envelope::decode(r#"{"I":7}"#).unwrap();
        assert_eq!(envelope.invocation_id, Some(json!(7)));
    }

    #[test]
    fn test_decode_server_error_field() {
        let envelope = Envelope::decode(r#"{"E":"subscription rejected"}"#).unwrap();
        assert_eq!(envelope.error.as_deref(), Some("subscription rejected"));
        assert!(!envelope.is_keepalive());
    }

    #[test]
    fn test_decode_garbage_returns_frame_error() {
        let result = Envelope::decode("not json at all");
        assert!(matches!(result, Err(ProtocolError::Frame(_))));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let envelope = Envelope {
            cursor: Some("d-9".into()),
            reference: None,
            invocation_id: None,
            messages: vec![MethodCall {
                hub: "Streaming".into(),
                method: "feed".into(),
                args: vec![json!("WeatherData"), json!({"AirTemp": "24.1"})],
            }],
            error: None,
        };
        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_encode_omits_absent_fields() {
        // A default envelope must encode as `{}`, matching the server's
        // own keep-alive frame.
        assert_eq!(Envelope::default().encode(), "{}");
    }

    // =====================================================================
    // Flattening
    // =====================================================================

    fn feed_call(topic: &str, payload: Value) -> MethodCall {
        MethodCall {
            hub: "Streaming".into(),
            method: FEED_METHOD.into(),
            args: vec![json!(topic), payload, json!("2026-08-02T14:00:00Z")],
        }
    }

    #[test]
    fn test_updates_reference_entries_come_first() {
        let envelope = Envelope {
            cursor: Some("c1".into()),
            reference: Some(BTreeMap::from([(
                "DriverList".to_string(),
                json!({"1": "VER"}),
            )])),
            messages: vec![feed_call("TimingData", json!({"n": 1}))],
            ..Default::default()
        };

        let updates = envelope.updates("Streaming");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].topic.as_str(), "DriverList");
        assert_eq!(updates[1].topic.as_str(), "TimingData");
    }

    #[test]
    fn test_updates_preserve_message_arrival_order() {
        let envelope = Envelope {
            messages: vec![
                feed_call("TimingData", json!(1)),
                feed_call("WeatherData", json!(2)),
                feed_call("TimingData", json!(3)),
            ],
            ..Default::default()
        };

        let payloads: Vec<_> = envelope
            .updates("Streaming")
            .into_iter()
            .map(|u| u.payload)
            .collect();
        assert_eq!(payloads, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_updates_seq_derives_from_cursor_and_index() {
        let envelope = Envelope {
            cursor: Some("d-5".into()),
            messages: vec![
                feed_call("TimingData", json!(1)),
                feed_call("TimingData", json!(2)),
            ],
            ..Default::default()
        };

        let updates = envelope.updates("Streaming");
        assert_eq!(updates[0].seq.as_deref(), Some("d-5.0"));
        assert_eq!(updates[1].seq.as_deref(), Some("d-5.1"));
    }

    #[test]
    fn test_updates_without_cursor_have_no_seq() {
        let envelope = Envelope {
            messages: vec![feed_call("TimingData", json!(1))],
            ..Default::default()
        };
        assert_eq!(envelope.updates("Streaming")[0].seq, None);
    }

    #[test]
    fn test_updates_reference_entries_have_no_seq() {
        let envelope = Envelope {
            cursor: Some("c1".into()),
            reference: Some(BTreeMap::from([("DriverList".to_string(), json!([]))])),
            ..Default::default()
        };
        assert_eq!(envelope.updates("Streaming")[0].seq, None);
    }

    #[test]
    fn test_updates_skip_foreign_hub() {
        let mut call = feed_call("TimingData", json!(1));
        call.hub = "Chat".into();
        let envelope = Envelope {
            messages: vec![call],
            ..Default::default()
        };
        assert!(envelope.updates("Streaming").is_empty());
    }

    #[test]
    fn test_updates_hub_match_is_case_insensitive() {
        let mut call = feed_call("TimingData", json!(1));
        call.hub = "streaming".into();
        let envelope = Envelope {
            messages: vec![call],
            ..Default::default()
        };
        assert_eq!(envelope.updates("Streaming").len(), 1);
    }

    #[test]
    fn test_updates_skip_non_feed_methods() {
        let mut call = feed_call("TimingData", json!(1));
        call.method = "ping".into();
        let envelope = Envelope {
            messages: vec![call],
            ..Default::default()
        };
        assert!(envelope.updates("Streaming").is_empty());
    }

    #[test]
    fn test_updates_skip_malformed_argument_shapes() {
        let envelope = Envelope {
            messages: vec![
                // no args at all
                MethodCall {
                    hub: "Streaming".into(),
                    method: FEED_METHOD.into(),
                    args: vec![],
                },
                // topic is not a string
                MethodCall {
                    hub: "Streaming".into(),
                    method: FEED_METHOD.into(),
                    args: vec![json!(42), json!({})],
                },
                // topic but no payload
                MethodCall {
                    hub: "Streaming".into(),
                    method: FEED_METHOD.into(),
                    args: vec![json!("TimingData")],
                },
                feed_call("TimingData", json!({"ok": true})),
            ],
            ..Default::default()
        };

        let updates = envelope.updates("Streaming");
        assert_eq!(updates.len(), 1, "only the well-formed call survives");
        assert_eq!(updates[0].payload, json!({"ok": true}));
    }
}
