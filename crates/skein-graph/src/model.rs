use serde::Serialize;
use thiserror::Error;

use skein_core::model::RecordId;

/// Label assigned to every node once forks are resolved. At a fork the
/// latest child supersedes the rest ("edit and continue from here");
/// superseded subtrees stay in the graph for audit but are off the
/// canonical thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchLabel {
    Active,
    Abandoned,
}

/// Non-fatal structural anomalies collected while building a graph.
/// Each has a defined fallback; none of them aborts reconstruction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("duplicate record id {id} at position {position}, record dropped")]
    DuplicateId { id: RecordId, position: u64 },

    #[error("cycle broken: severed parent edge {child} -> {parent}")]
    CycleBroken { child: RecordId, parent: RecordId },

    #[error("malformed compaction sequence at position {position}: {detail}")]
    MalformedCompaction { position: u64, detail: String },

    #[error("sidechain run starting at {head} has no resolvable invocation")]
    UnattributedSidechain { head: RecordId },
}
