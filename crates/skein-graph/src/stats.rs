use std::collections::BTreeSet;

use serde::Serialize;

use skein_core::model::RecordKind;

use crate::builder::SessionGraph;
use crate::sidechain::UNKNOWN_AGENT;

/// Aggregate report over one reconstructed session. This is the whole
/// reporting boundary of the engine; rendering is a consumer concern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_records: usize,
    pub participant_turns: usize,
    pub responder_turns: usize,
    pub infrastructure_notes: usize,
    pub compaction_markers: usize,
    pub orphans: usize,
    /// Conversation branches: root-to-leaf paths over non-sidechain
    /// participant/responder records, logical links included.
    pub branches: usize,
    pub sidechain_runs: usize,
    pub compaction_epochs: usize,
    /// Distinct delegated-agent labels, sorted; unresolved runs are
    /// not labels and are excluded.
    pub delegated_agents: Vec<String>,
    pub parse_errors: usize,
    pub warnings: usize,
    /// First to last record timestamp, in stream order.
    pub duration_ms: Option<i64>,
}

impl SessionGraph {
    pub fn stats(&self) -> SessionStats {
        let mut participant_turns = 0;
        let mut responder_turns = 0;
        let mut infrastructure_notes = 0;
        let mut compaction_markers = 0;
        let mut agents = BTreeSet::new();

        for rec in &self.records {
            match rec.kind {
                RecordKind::Participant => participant_turns += 1,
                RecordKind::Responder => responder_turns += 1,
                RecordKind::Note => infrastructure_notes += 1,
                RecordKind::Compaction => compaction_markers += 1,
            }
            if let Some(d) = &rec.delegation {
                agents.insert(d.agent.clone());
            }
        }
        for run in &self.runs {
            if run.agent != UNKNOWN_AGENT {
                agents.insert(run.agent.clone());
            }
        }

        let duration_ms = match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((last.timestamp - first.timestamp).num_milliseconds()),
            _ => None,
        };

        SessionStats {
            total_records: self.records.len(),
            participant_turns,
            responder_turns,
            infrastructure_notes,
            compaction_markers,
            orphans: self.orphan.iter().filter(|&&o| o).count(),
            branches: self.conversation_branches(),
            sidechain_runs: self.runs.len(),
            compaction_epochs: self.epochs.len(),
            delegated_agents: agents.into_iter().collect(),
            parse_errors: self.parse_error_count,
            warnings: self.warnings.len(),
            duration_ms,
        }
    }

    /// Count leaves of the conversation forest: non-sidechain turns
    /// linked through their nearest non-sidechain turn ancestor, so a
    /// logically-continued post-compaction chain stays one branch and
    /// markers or notes never open one.
    fn conversation_branches(&self) -> usize {
        let n = self.records.len();
        let eligible = |i: usize| {
            let r = &self.records[i];
            !r.is_sidechain
                && matches!(r.kind, RecordKind::Participant | RecordKind::Responder)
        };

        let mut has_turn_child = vec![false; n];
        for i in (0..n).filter(|&i| eligible(i)) {
            let mut cur = i;
            let mut steps = 0;
            while let Some(p) = self.effective_parent(cur) {
                if eligible(p) {
                    has_turn_child[p] = true;
                    break;
                }
                cur = p;
                steps += 1;
                if steps > n {
                    break;
                }
            }
        }
        (0..n)
            .filter(|&i| eligible(i) && !has_turn_child[i])
            .count()
    }
}
