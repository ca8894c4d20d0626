use serde::{Deserialize, Serialize};

use super::record::{Record, RecordKind};

/// Conversational role of a record, independent of who is playing it.
///
/// On the main thread the requester is the human operator and the
/// responder is the controlling process. Inside a sidechain the roles
/// reverse: the controlling process asks and a specialized sub-agent
/// answers. The reversal is a reinterpretation of the same two variants,
/// signalled by `is_external_requester` on the record, not a separate
/// record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Requester,
    Responder,
    Infrastructure,
}

impl Record {
    /// The role this record plays in its enclosing thread.
    pub fn role(&self) -> Role {
        match self.kind {
            RecordKind::Participant => Role::Requester,
            RecordKind::Responder => Role::Responder,
            RecordKind::Note | RecordKind::Compaction => Role::Infrastructure,
        }
    }

    /// True when the requester side of this turn is the controlling
    /// process delegating work, rather than the human operator.
    pub fn requester_is_controller(&self) -> bool {
        self.is_sidechain && self.is_external_requester
    }
}
