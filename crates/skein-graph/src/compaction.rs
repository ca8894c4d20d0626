use serde::Serialize;

use skein_core::model::{CompactionPhase, Record, RecordKind, RecordMetadata};

use crate::model::Warning;

/// Statistics reported by a compaction end marker, when present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactionStats {
    pub preserved_records: Option<u64>,
    pub total_records: Option<u64>,
    pub compression_ratio: Option<f64>,
    pub trigger: Option<String>,
}

impl CompactionStats {
    fn from_metadata(meta: &RecordMetadata) -> Option<Self> {
        if meta.preserved_records.is_none()
            && meta.total_records.is_none()
            && meta.compression_ratio.is_none()
            && meta.trigger.is_none()
        {
            return None;
        }
        Some(Self {
            preserved_records: meta.preserved_records,
            total_records: meta.total_records,
            compression_ratio: meta.compression_ratio,
            trigger: meta.trigger.clone(),
        })
    }
}

/// One completed compaction: a begin/end marker pair, optionally
/// followed by a restore marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactionEpoch {
    /// 1-based; the first completed pair produces epoch 1. Long
    /// sessions compact many times.
    pub index: u32,
    pub begin_position: u64,
    pub end_position: u64,
    pub stats: Option<CompactionStats>,
    pub restored: bool,
}

/// Marker pairing is an explicit state machine so malformed sequences
/// reject cleanly instead of leaking flag state across records.
enum State {
    Idle,
    Compacting { begin: usize },
    Compacted,
}

/// Single ordered pass: assigns every record its epoch (the number of
/// completed compactions before it) and collects the epoch log.
/// Malformed marker sequences are non-fatal anomalies.
pub(crate) fn annotate(records: &[Record]) -> (Vec<u32>, Vec<CompactionEpoch>, Vec<Warning>) {
    let mut epoch = vec![0u32; records.len()];
    let mut epochs = Vec::new();
    let mut warnings = Vec::new();
    let mut counter = 0u32;
    let mut state = State::Idle;

    for (i, rec) in records.iter().enumerate() {
        epoch[i] = counter;
        if rec.kind != RecordKind::Compaction {
            if matches!(state, State::Compacted) {
                state = State::Idle;
            }
            continue;
        }
        let position = rec.sequence_position;
        match rec.compaction_phase() {
            Some(CompactionPhase::Begin) => {
                if let State::Compacting { begin } = state {
                    warnings.push(Warning::MalformedCompaction {
                        position,
                        detail: format!(
                            "begin marker while the pair begun at position {} is still open",
                            records[begin].sequence_position
                        ),
                    });
                }
                state = State::Compacting { begin: i };
            }
            Some(CompactionPhase::End) => match state {
                State::Compacting { begin } => {
                    // The end marker itself still belongs to the epoch
                    // it closes; everything after it is in the next.
                    counter += 1;
                    epochs.push(CompactionEpoch {
                        index: counter,
                        begin_position: records[begin].sequence_position,
                        end_position: position,
                        stats: rec.metadata.as_ref().and_then(CompactionStats::from_metadata),
                        restored: false,
                    });
                    state = State::Compacted;
                }
                _ => {
                    tracing::warn!("Compaction end marker with no matching begin at {position}");
                    warnings.push(Warning::MalformedCompaction {
                        position,
                        detail: "end marker with no matching begin".into(),
                    });
                    state = State::Idle;
                }
            },
            Some(CompactionPhase::Restore) => match state {
                State::Compacted => {
                    if let Some(last) = epochs.last_mut() {
                        last.restored = true;
                    }
                    state = State::Idle;
                }
                _ => warnings.push(Warning::MalformedCompaction {
                    position,
                    detail: "restore marker outside a completed compaction".into(),
                }),
            },
            None => warnings.push(Warning::MalformedCompaction {
                position,
                detail: "compaction marker without a phase".into(),
            }),
        }
    }

    if let State::Compacting { begin } = state {
        warnings.push(Warning::MalformedCompaction {
            position: records[begin].sequence_position,
            detail: "begin marker never closed".into(),
        });
    }

    (epoch, epochs, warnings)
}
