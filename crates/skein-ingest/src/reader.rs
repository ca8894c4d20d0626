use std::collections::HashSet;
use std::io::{BufRead, ErrorKind};

use skein_core::model::{Record, RecordId};

use crate::error::IngestError;
use crate::ingest::RetryPolicy;

/// A single rejected line: why it was dropped and where it was.
/// Line numbers are 1-based and count every physical line, including
/// the rejected ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: u64,
    pub reason: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Outcome of parsing one physical line.
#[derive(Debug)]
pub enum ParsedLine {
    Record(Record),
    Rejected(ParseError),
}

/// Streaming record reader over any buffered source.
///
/// Yields records in stream order with `sequence_position` assigned as
/// the ordinal among accepted records. Memory use is bounded by one
/// line plus the id set used for duplicate rejection, never the whole
/// file. Lines are read as raw bytes, so bad encoding rejects that one
/// line like any other malformed record. Transient read errors are
/// retried with the same bounded backoff as the open; only an
/// exhausted budget or a hard IO failure is fatal.
pub struct RecordStream<R: BufRead> {
    reader: R,
    retry: RetryPolicy,
    buf: Vec<u8>,
    line_no: u64,
    next_position: u64,
    seen: HashSet<RecordId>,
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        Self::with_retry(reader, RetryPolicy::default())
    }

    pub fn with_retry(reader: R, retry: RetryPolicy) -> Self {
        Self {
            reader,
            retry,
            buf: Vec::new(),
            line_no: 0,
            next_position: 0,
            seen: HashSet::new(),
        }
    }

    /// Unwrap back to the underlying reader, e.g. to finalize a
    /// source hash after the stream is exhausted.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn parse_line(&mut self, line: &str) -> ParsedLine {
        match serde_json::from_str::<Record>(line) {
            Ok(mut rec) => {
                if !self.seen.insert(rec.id.clone()) {
                    return ParsedLine::Rejected(ParseError {
                        line: self.line_no,
                        reason: format!("duplicate record id {}", rec.id),
                    });
                }
                rec.sequence_position = self.next_position;
                self.next_position += 1;
                ParsedLine::Record(rec)
            }
            Err(e) => ParsedLine::Rejected(ParseError {
                line: self.line_no,
                reason: e.to_string(),
            }),
        }
    }

    /// Read the next physical line into `buf`, retrying transient
    /// errors. `read_until` keeps the bytes it consumed before an
    /// error in `buf`, so a retry resumes mid-line instead of
    /// dropping data.
    fn fill_line(&mut self) -> Result<usize, IngestError> {
        self.buf.clear();
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;
        loop {
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(_) => return Ok(self.buf.len()),
                Err(e) if is_transient(e.kind()) && attempt < self.retry.attempts => {
                    tracing::warn!(
                        "Read failed (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                        self.retry.attempts,
                    );
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(IngestError::Io(e)),
            }
        }
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<ParsedLine, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.fill_line() {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.line_no += 1;
            let mut end = self.buf.len();
            while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
                end -= 1;
            }
            let line = match std::str::from_utf8(&self.buf[..end]) {
                Ok(s) => s.to_owned(),
                Err(e) => {
                    return Some(Ok(ParsedLine::Rejected(ParseError {
                        line: self.line_no,
                        reason: format!("invalid UTF-8: {e}"),
                    })))
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(Ok(self.parse_line(&line)));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Read};
    use std::time::Duration;

    use super::*;

    fn drain(input: &str) -> (Vec<Record>, Vec<ParseError>) {
        drain_stream(RecordStream::new(input.as_bytes()))
    }

    fn drain_stream<R: BufRead>(stream: RecordStream<R>) -> (Vec<Record>, Vec<ParseError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for item in stream {
            match item.unwrap() {
                ParsedLine::Record(r) => records.push(r),
                ParsedLine::Rejected(e) => errors.push(e),
            }
        }
        (records, errors)
    }

    /// Fails the first `failures` reads with a transient error, then
    /// reads normally.
    struct FlakyReader<R> {
        inner: R,
        failures: u32,
    }

    impl<R: Read> Read for FlakyReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::new(ErrorKind::TimedOut, "slow storage"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_stream_assigns_sequence_positions() {
        let input = r#"{"type":"participant","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:00Z"}

{"type":"responder","uuid":"b","parentUuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:01Z"}
"#;
        let (records, errors) = drain(input);
        assert!(errors.is_empty());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence_position, 0);
        assert_eq!(records[1].sequence_position, 1);
    }

    #[test]
    fn test_malformed_line_is_rejected_not_fatal() {
        let input = r#"{"type":"participant","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:00Z"}
{not json at all
{"type":"responder","uuid":"b","sessionId":"s","timestamp":"2026-02-10T09:00:01Z"}
"#;
        let (records, errors) = drain(input);
        assert_eq!(records.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
        // Position ordinals count accepted records only.
        assert_eq!(records[1].sequence_position, 1);
    }

    #[test]
    fn test_missing_required_field_names_the_field() {
        let input = r#"{"type":"participant","sessionId":"s","timestamp":"2026-02-10T09:00:00Z"}"#;
        let (records, errors) = drain(input);
        assert!(records.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("uuid"), "{}", errors[0].reason);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let input = r#"{"type":"astral","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:00Z"}"#;
        let (records, errors) = drain(input);
        assert!(records.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_invalid_utf8_line_is_rejected_not_fatal() {
        let mut input = Vec::new();
        input.extend_from_slice(
            br#"{"type":"participant","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:00Z"}"#,
        );
        input.push(b'\n');
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(
            br#"{"type":"responder","uuid":"b","sessionId":"s","timestamp":"2026-02-10T09:00:01Z"}"#,
        );
        input.push(b'\n');

        let (records, errors) = drain_stream(RecordStream::new(&input[..]));
        assert_eq!(records.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
        assert!(errors[0].reason.contains("UTF-8"), "{}", errors[0].reason);
        assert_eq!(records[1].sequence_position, 1);
    }

    #[test]
    fn test_transient_read_errors_are_retried() {
        let input = "{\"type\":\"participant\",\"uuid\":\"a\",\"sessionId\":\"s\",\"timestamp\":\"2026-02-10T09:00:00Z\"}\n\
                     {\"type\":\"responder\",\"uuid\":\"b\",\"sessionId\":\"s\",\"timestamp\":\"2026-02-10T09:00:01Z\"}\n";
        let flaky = FlakyReader {
            inner: input.as_bytes(),
            failures: 2,
        };
        let policy = RetryPolicy {
            attempts: 3,
            initial_delay: Duration::from_millis(1),
        };
        let (records, errors) = drain_stream(RecordStream::with_retry(BufReader::new(flaky), policy));
        assert!(errors.is_empty());
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_persistent_read_errors_exhaust_the_budget() {
        let flaky = FlakyReader {
            inner: "{}\n".as_bytes(),
            failures: 10,
        };
        let policy = RetryPolicy {
            attempts: 2,
            initial_delay: Duration::from_millis(1),
        };
        let mut stream = RecordStream::with_retry(BufReader::new(flaky), policy);
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, IngestError::Io(_)), "{err}");
    }

    #[test]
    fn test_duplicate_id_rejects_later_record() {
        let input = r#"{"type":"participant","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:00Z"}
{"type":"responder","uuid":"a","sessionId":"s","timestamp":"2026-02-10T09:00:01Z"}
{"type":"responder","uuid":"b","sessionId":"s","timestamp":"2026-02-10T09:00:02Z"}
"#;
        let (records, errors) = drain(input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_str(), "a");
        assert_eq!(records[1].id.as_str(), "b");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("duplicate"));
    }
}
