use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};

use skein_core::model::Record;

use crate::error::IngestError;
use crate::reader::{ParseError, ParsedLine, RecordStream};

/// Bounded exponential backoff for file IO. Network-backed or
/// virtualized storage sometimes reports "not ready" for a file that
/// appears moments later; retrying the open and transient read errors
/// covers that without hiding a genuinely unreadable input forever.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(500),
        }
    }
}

/// Everything produced by ingesting one session log.
#[derive(Debug)]
pub struct IngestOutcome {
    /// Accepted records, in stream order, positions already assigned.
    pub records: Vec<Record>,
    /// Rejected lines, in stream order.
    pub errors: Vec<ParseError>,
    /// SHA-256 of the raw input bytes, when the source was a file.
    pub source_hash: Option<String>,
}

/// Ingest a session log from a path, retrying the open and any
/// transient read error per `policy`.
pub fn ingest_path(path: &Path, policy: RetryPolicy) -> Result<IngestOutcome, IngestError> {
    let file = open_with_retry(path, policy)?;
    let mut stream = RecordStream::with_retry(BufReader::new(HashingReader::new(file)), policy);
    let (records, errors) = drain(&mut stream)?;
    let hash = stream.into_inner().into_inner().finalize();
    Ok(IngestOutcome {
        records,
        errors,
        source_hash: Some(hash),
    })
}

/// Ingest from any buffered reader (no source hash; reads use the
/// default retry policy).
pub fn ingest_reader(reader: impl BufRead) -> Result<IngestOutcome, IngestError> {
    let mut stream = RecordStream::new(reader);
    let (records, errors) = drain(&mut stream)?;
    Ok(IngestOutcome {
        records,
        errors,
        source_hash: None,
    })
}

fn drain<R: BufRead>(
    stream: &mut RecordStream<R>,
) -> Result<(Vec<Record>, Vec<ParseError>), IngestError> {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for item in stream {
        match item? {
            ParsedLine::Record(rec) => records.push(rec),
            ParsedLine::Rejected(err) => {
                tracing::debug!("Skipping unparseable log line: {err}");
                errors.push(err);
            }
        }
    }
    Ok((records, errors))
}

fn open_with_retry(path: &Path, policy: RetryPolicy) -> Result<File, IngestError> {
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match File::open(path) {
            Ok(f) => return Ok(f),
            Err(e) if attempt < policy.attempts => {
                tracing::warn!(
                    "Open of {} failed (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                    path.display(),
                    policy.attempts,
                );
                std::thread::sleep(delay);
                delay *= 2;
                attempt += 1;
            }
            Err(e) => {
                return Err(IngestError::RetriesExhausted {
                    path: path.to_path_buf(),
                    attempts: policy.attempts,
                    source: e,
                });
            }
        }
    }
}

/// Reader wrapper that hashes every byte as it passes through, so the
/// source hash comes out of the same single pass as the parse.
struct HashingReader<R: Read> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finalize(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const LOG: &str = r#"{"type":"participant","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:00Z","payload":"hi"}
{"type":"responder","uuid":"b","parentUuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:02Z","payload":"hello"}
garbage line
"#;

    #[test]
    fn test_ingest_path_hashes_and_parses() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("session.jsonl");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(LOG.as_bytes())
            .unwrap();

        let outcome = ingest_path(&path, RetryPolicy::default()).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.errors.len(), 1);

        let expected = format!("{:x}", Sha256::digest(LOG.as_bytes()));
        assert_eq!(outcome.source_hash.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_ingest_reader_has_no_hash() {
        let outcome = ingest_reader(LOG.as_bytes()).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.source_hash.is_none());
    }

    #[test]
    fn test_retries_exhausted_is_fatal() {
        let policy = RetryPolicy {
            attempts: 2,
            initial_delay: Duration::from_millis(1),
        };
        let err = ingest_path(Path::new("/nonexistent/skein.jsonl"), policy).unwrap_err();
        match err {
            IngestError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected RetriesExhausted, got {other}"),
        }
    }
}
