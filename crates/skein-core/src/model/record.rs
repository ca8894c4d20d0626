use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// A unique identifier for a record within a session.
/// Logs written by agent frontends use UUIDs here, but any non-empty
/// string is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a fresh id as UUID v4 hex (no dashes), for synthetic records.
    pub fn new() -> Self {
        Self(Uuid::new_v4().as_simple().to_string())
    }

    /// Parse and validate an ID string. Must be non-empty.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(CoreError::InvalidId("record id is empty".into()));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier shared by every record of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The kind of a log record, tagged as `type` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A turn authored by the requesting side of the conversation.
    Participant,
    /// A turn authored by the responding side.
    Responder,
    /// Infrastructure noise: hook output, status lines, reminders.
    Note,
    /// A compaction marker; phase and statistics live in `metadata`.
    Compaction,
}

/// Delegation payload carried by a record that hands work to a sub-agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Delegation {
    /// Label of the target agent, e.g. "bug-hunter".
    pub agent: String,
    /// The prompt text the sub-agent was started with. Sidechain
    /// attribution matches this against the first record of a run.
    pub prompt: String,
}

/// Compaction marker phase. Markers arrive as begin/end pairs, with an
/// optional restore marker after a completed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionPhase {
    Begin,
    End,
    Restore,
}

/// Structured metadata attached to a record. Populated on compaction
/// markers; other kinds may carry arbitrary fields, kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<CompactionPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserved_records: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of a session log, parsed from one JSONL line.
///
/// Required on the wire: `type`, `uuid`, `sessionId`, `timestamp`.
/// Everything else is optional and defaults off. Unknown fields are kept
/// in `extra` so re-serializing a record reproduces its original line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(rename = "uuid")]
    pub id: RecordId,
    #[serde(default, rename = "parentUuid", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<RecordId>,
    /// Reference that survives compaction: set by the writer when the
    /// structural parent is about to be discarded.
    #[serde(
        default,
        rename = "logicalParentUuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub logical_parent_id: Option<RecordId>,
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation: Option<Delegation>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_sidechain: bool,
    /// Marks the role reversal inside a sidechain: the controlling
    /// process is the requester of this turn, not the human operator.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_external_requester: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_aborted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RecordMetadata>,
    /// Stream ordinal, assigned by the ingestor. Not part of the wire
    /// format; used for child ordering and branch tie-breaking.
    #[serde(skip)]
    pub sequence_position: u64,
    /// Unknown wire fields, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Record {
    /// A minimal record with everything optional switched off.
    pub fn new(
        kind: RecordKind,
        id: impl Into<RecordId>,
        session_id: impl Into<SessionId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            parent_id: None,
            logical_parent_id: None,
            session_id: session_id.into(),
            timestamp,
            payload: None,
            delegation: None,
            is_sidechain: false,
            is_external_requester: false,
            is_deleted: false,
            is_aborted: false,
            is_error: false,
            metadata: None,
            sequence_position: 0,
            extra: serde_json::Map::new(),
        }
    }

    /// True for a compaction marker in the given phase.
    pub fn compaction_phase(&self) -> Option<CompactionPhase> {
        if self.kind != RecordKind::Compaction {
            return None;
        }
        self.metadata.as_ref().and_then(|m| m.phase)
    }

    /// True for a non-sidechain record that hands work to a sub-agent.
    pub fn is_delegation_invocation(&self) -> bool {
        !self.is_sidechain && self.delegation.is_some()
    }
}
