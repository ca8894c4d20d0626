//! Graph reconstruction for skein session logs.
//!
//! Takes the flat record stream produced by `skein-ingest` and rebuilds
//! the conversation as a DAG: unresolvable parents become roots, cycles
//! are severed defensively, compaction epochs are segmented, sidechain
//! runs are attributed to their delegating invocations, and the result
//! is exposed through ancestor/descendant/branch queries plus an
//! aggregate statistics report.

pub mod branch;
pub mod builder;
pub mod compaction;
pub mod error;
pub mod model;
pub mod query;
pub mod sidechain;
pub mod stats;

#[cfg(test)]
pub(crate) mod testutil;

pub use builder::{reconstruct_path, SessionGraph};
pub use compaction::{CompactionEpoch, CompactionStats};
pub use error::GraphError;
pub use model::{BranchLabel, Warning};
pub use sidechain::{MatchConfidence, SidechainRun, UNKNOWN_AGENT};
pub use stats::SessionStats;
