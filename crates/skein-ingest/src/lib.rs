//! Streaming ingestor for skein session logs.
//!
//! Reads a JSONL log line by line in constant memory, validating each
//! line independently. A malformed line — bad JSON, a missing field,
//! bad encoding — rejects that one record and is accumulated as a
//! [`ParseError`]; the run never aborts on bad input. Opening the file
//! and transient read errors are wrapped in a bounded exponential
//! backoff so "not ready" conditions from network-backed storage do
//! not kill a batch run; exhausting the retry budget is the one fatal
//! case.

pub mod error;
pub mod ingest;
pub mod reader;

pub use error::IngestError;
pub use ingest::{ingest_path, ingest_reader, IngestOutcome, RetryPolicy};
pub use reader::{ParseError, ParsedLine, RecordStream};
