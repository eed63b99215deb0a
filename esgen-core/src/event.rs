//! Event sum types and their log encoding.
//!
//! Each log entry holds one JSON envelope:
//!
//! ```json
//! {"type": "Shipped", "payload": {"at": "2024-05-01T10:00:00Z"}}
//! ```
//!
//! An append carries a JSON array of envelopes, one per emitted event.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A closed set of events, usually an enum with one variant per schema
/// event. Derive it with `#[derive(EventSet)]`.
pub trait EventSet: Sized + Send + Sync + 'static {
    /// Name of every member, as declared in the schema.
    const NAMES: &'static [&'static str];

    /// Name of this event.
    fn name(&self) -> &'static str;

    /// Serializes the event body without its name.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    fn to_payload(&self) -> Result<Value, serde_json::Error>;

    /// Rebuilds the member called `name` from its body.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownEvent`] if `name` is not a member and
    /// [`DecodeError::Payload`] if the body doesn't fit it.
    fn from_payload(name: &str, payload: Value) -> Result<Self, DecodeError>;

    #[must_use]
    fn is_member(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }
}

/// Error decoding a stored event.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown event `{name}`, expected one of {expected:?}")]
    UnknownEvent {
        name: String,
        expected: &'static [&'static str],
    },
    #[error("malformed event: {0}")]
    Payload(#[source] serde_json::Error),
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    #[serde(rename = "type")]
    name: &'a str,
    payload: Value,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    name: String,
    #[serde(default)]
    payload: Value,
}

/// Encodes a batch as a JSON array of envelopes.
///
/// # Errors
///
/// Returns the first serialization error.
pub fn encode_events<E: EventSet>(events: &NonEmpty<E>) -> Result<Vec<u8>, serde_json::Error> {
    let envelopes = events
        .iter()
        .map(|event| {
            Ok(EnvelopeRef {
                name: event.name(),
                payload: event.to_payload()?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    serde_json::to_vec(&envelopes)
}

/// Decodes a single envelope.
///
/// # Errors
///
/// See [`EventSet::from_payload`].
pub fn decode_event<E: EventSet>(bytes: &[u8]) -> Result<E, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(DecodeError::Payload)?;
    E::from_payload(&envelope.name, envelope.payload)
}
