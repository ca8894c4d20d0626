//! Shared fixtures for the unit tests in this crate.

use chrono::{Duration, TimeZone, Utc};

use skein_core::model::{CompactionPhase, Delegation, Record, RecordKind, RecordMetadata};

/// A participant record at `pos`, timestamped one second per position.
pub fn rec(id: &str, parent: Option<&str>, pos: u64) -> Record {
    let ts = Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap() + Duration::seconds(pos as i64);
    let mut r = Record::new(RecordKind::Participant, id, "s1", ts);
    r.parent_id = parent.map(Into::into);
    r.sequence_position = pos;
    r
}

pub fn responder(id: &str, parent: Option<&str>, pos: u64) -> Record {
    let mut r = rec(id, parent, pos);
    r.kind = RecordKind::Responder;
    r
}

/// A responder turn that delegates to a sub-agent.
pub fn invocation(id: &str, parent: Option<&str>, pos: u64, agent: &str, prompt: &str) -> Record {
    let mut r = responder(id, parent, pos);
    r.delegation = Some(Delegation {
        agent: agent.into(),
        prompt: prompt.into(),
    });
    r
}

/// A sidechain-flagged record; the head of a run carries the prompt as
/// its payload and the external-requester flag.
pub fn sidechain(id: &str, parent: Option<&str>, pos: u64, payload: &str, head: bool) -> Record {
    let mut r = if head {
        rec(id, parent, pos)
    } else {
        responder(id, parent, pos)
    };
    r.is_sidechain = true;
    r.is_external_requester = head;
    r.payload = Some(payload.into());
    r
}

pub fn marker(id: &str, parent: Option<&str>, pos: u64, phase: CompactionPhase) -> Record {
    let mut r = rec(id, parent, pos);
    r.kind = RecordKind::Compaction;
    r.metadata = Some(RecordMetadata {
        phase: Some(phase),
        ..Default::default()
    });
    r
}
