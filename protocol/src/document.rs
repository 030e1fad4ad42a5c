/*!
Shape of the shared call document.

```json
{ "phone": { "offer": {"type":"offer","sdp":"..."}, "iceCandidates":[{"label":"0","id":"audio","candidate":"..."}] },
  "dispatcher": { "answer": {"type":"answer","sdp":"..."}, "iceCandidates":[...] } }
```
*/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Role;

/// Kind of a session description in the offer/answer exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    /// Proposal sent by the phone.
    Offer,
    /// Reply sent by the dispatcher.
    Answer,
}

impl SdpType {
    /// The description kind a given role publishes.
    #[must_use]
    pub const fn published_by(role: Role) -> Self {
        match role {
            Role::Phone => Self::Offer,
            Role::Dispatcher => Self::Answer,
        }
    }
}

/// `SDP` payload together with its kind. The `sdp` text is owned by the media layer
/// and passed through without interpretation.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct SessionDescription {
    /// Offer or answer.
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    /// Opaque session description text.
    pub sdp: String,
}

impl SessionDescription {
    /// Build an offer from raw `SDP` text.
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Build an answer from raw `SDP` text.
    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Media kind marker carried next to each candidate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio m-line.
    Audio,
    /// Video m-line.
    Video,
}

impl MediaKind {
    /// Infer the media kind from an `SDP` media id.
    /// Media ids are either named (`"audio"`, `"video"`) or positional (`"0"`, `"1"`),
    /// in which case the second m-line is the video one.
    #[must_use]
    pub fn from_mid(mid: &str) -> Self {
        if mid.to_ascii_lowercase().contains("video") || mid == "1" {
            Self::Video
        } else {
            Self::Audio
        }
    }
}

/// Proposed ICE candidate of one participant, passed to the other one without modifications.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct IceCandidate {
    /// Media-line index, carried as text.
    pub label: String,
    /// Media kind the candidate belongs to.
    pub id: MediaKind,
    /// Opaque candidate line.
    pub candidate: String,
}

impl IceCandidate {
    /// Build a candidate the way the media engine reports it.
    #[must_use]
    pub fn new(sdp_m_line_index: u32, sdp_mid: &str, candidate: impl Into<String>) -> Self {
        Self {
            label: sdp_m_line_index.to_string(),
            id: MediaKind::from_mid(sdp_mid),
            candidate: candidate.into(),
        }
    }
}

/// State published by one participant under its role's field.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Offer, only present in the phone record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    /// Answer, only present in the dispatcher record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
    /// Candidates gathered so far, in the order they were gathered.
    #[serde(
        rename = "iceCandidates",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ice_candidates: Vec<IceCandidate>,
}

impl ParticipantRecord {
    /// The description this record publishes when it belongs to `role`.
    #[must_use]
    pub const fn description(&self, role: Role) -> Option<&SessionDescription> {
        match role {
            Role::Phone => self.offer.as_ref(),
            Role::Dispatcher => self.answer.as_ref(),
        }
    }

    /// Store `description` in the slot owned by `role`.
    pub fn set_description(&mut self, role: Role, description: SessionDescription) {
        match role {
            Role::Phone => self.offer = Some(description),
            Role::Dispatcher => self.answer = Some(description),
        }
    }
}

/// The single shared record of one call.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallDocument {
    /// Record of the initiating participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<ParticipantRecord>,
    /// Record of the answering participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatcher: Option<ParticipantRecord>,
}

impl CallDocument {
    /// Decode a raw document body. Unknown top-level fields are ignored.
    ///
    /// # Errors
    /// Fails when a known field is present but has the wrong shape.
    pub fn from_data(data: &Map<String, Value>) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(data.clone()))
    }

    /// Record published under `role`'s field, if any.
    #[must_use]
    pub const fn record(&self, role: Role) -> Option<&ParticipantRecord> {
        match role {
            Role::Phone => self.phone.as_ref(),
            Role::Dispatcher => self.dispatcher.as_ref(),
        }
    }

    /// Build the merge payload that writes `record` under `role`'s field and nothing else.
    ///
    /// # Errors
    /// Fails only if the record cannot be represented as JSON.
    pub fn merge_payload(
        role: Role,
        record: &ParticipantRecord,
    ) -> serde_json::Result<Map<String, Value>> {
        let mut payload = Map::new();
        payload.insert(role.field().to_owned(), serde_json::to_value(record)?);
        Ok(payload)
    }
}

/// What a store subscription delivers on every change of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// `false` once the document has been deleted, or if it never existed.
    pub exists: bool,
    /// Raw document body, empty when the document does not exist.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl DocumentSnapshot {
    /// Snapshot of an existing document.
    #[must_use]
    pub const fn existing(data: Map<String, Value>) -> Self {
        Self { exists: true, data }
    }

    /// Snapshot signalling that the document is gone.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            exists: false,
            data: Map::new(),
        }
    }
}
