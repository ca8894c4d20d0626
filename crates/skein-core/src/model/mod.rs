pub mod record;
pub mod role;

pub use record::{
    CompactionPhase, Delegation, Record, RecordId, RecordKind, RecordMetadata, SessionId,
};
pub use role::Role;
