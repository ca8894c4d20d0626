//! Core data model for skein: the record types that make up an agent
//! session log, and their JSONL wire format.
//!
//! A session log is an append-only stream of records, one JSON object per
//! line. Records are immutable once parsed; everything derived from them
//! (graph structure, branch labels, epoch and sidechain annotations) lives
//! in downstream crates and never gets written back into the record.

pub mod error;
pub mod model;

pub use error::CoreError;
pub use model::{
    CompactionPhase, Delegation, Record, RecordId, RecordKind, RecordMetadata, Role, SessionId,
};
