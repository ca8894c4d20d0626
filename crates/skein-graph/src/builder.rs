use std::collections::HashMap;
use std::path::Path;

use skein_core::model::{Record, RecordId};
use skein_ingest::{ingest_path, IngestOutcome, RetryPolicy};

use crate::branch;
use crate::compaction::{self, CompactionEpoch};
use crate::error::GraphError;
use crate::model::{BranchLabel, Warning};
use crate::sidechain::{self, SidechainRun};

/// A reconstructed session: an arena of records plus index maps, never
/// a pointer-linked tree. One instance owns one session; it is built in
/// a single ordered pass and read-only afterwards.
pub struct SessionGraph {
    pub(crate) records: Vec<Record>,
    pub(crate) index: HashMap<RecordId, usize>,
    /// Structural parent, after orphan promotion and cycle severing.
    pub(crate) parent: Vec<Option<usize>>,
    /// Logical link that survives compaction: either carried on the
    /// record itself or preserved from an unresolvable parent id.
    pub(crate) logical_parent: Vec<Option<RecordId>>,
    /// Effective children: structural children plus records attached
    /// through a resolvable logical link. Ordered by sequence position.
    pub(crate) echildren: Vec<Vec<usize>>,
    pub(crate) orphan: Vec<bool>,
    pub(crate) roots: Vec<usize>,
    pub(crate) branch: Vec<BranchLabel>,
    /// Compaction epoch of each record: how many completed begin/end
    /// pairs preceded it.
    pub(crate) epoch: Vec<u32>,
    pub(crate) epochs: Vec<CompactionEpoch>,
    pub(crate) runs: Vec<SidechainRun>,
    pub(crate) run_of: Vec<Option<usize>>,
    pub(crate) warnings: Vec<Warning>,
    pub(crate) parse_error_count: usize,
}

/// Ingest a log file and reconstruct its graph in one call.
pub fn reconstruct_path(path: &Path, policy: RetryPolicy) -> Result<SessionGraph, GraphError> {
    let outcome = ingest_path(path, policy)?;
    Ok(SessionGraph::from_outcome(outcome))
}

impl SessionGraph {
    /// Build from an ingest outcome, carrying its parse-error count
    /// into the statistics report.
    pub fn from_outcome(outcome: IngestOutcome) -> Self {
        Self::build(outcome.records, outcome.errors.len())
    }

    /// Build the graph from records in stream order.
    ///
    /// Never fails: duplicate ids, cycles, unmatched markers and
    /// unattributed sidechains all degrade to warnings with a defined
    /// fallback. The result is always acyclic along structural parents.
    pub fn build(mut records: Vec<Record>, parse_error_count: usize) -> Self {
        records.sort_by_key(|r| r.sequence_position);
        let mut warnings = Vec::new();

        // Arena + id index. The ingestor already rejects duplicates;
        // this guards callers feeding records directly.
        let mut arena: Vec<Record> = Vec::with_capacity(records.len());
        let mut index: HashMap<RecordId, usize> = HashMap::with_capacity(records.len());
        for rec in records {
            if index.contains_key(&rec.id) {
                tracing::warn!("Dropping duplicate record id {}", rec.id);
                warnings.push(Warning::DuplicateId {
                    id: rec.id.clone(),
                    position: rec.sequence_position,
                });
                continue;
            }
            index.insert(rec.id.clone(), arena.len());
            arena.push(rec);
        }

        let n = arena.len();
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut logical_parent: Vec<Option<RecordId>> = vec![None; n];
        let mut orphan = vec![false; n];

        for i in 0..n {
            logical_parent[i] = arena[i].logical_parent_id.clone();
            let Some(pid) = arena[i].parent_id.clone() else {
                continue;
            };
            match index.get(&pid).copied() {
                Some(p) if p == i => {
                    // Self-parent is the degenerate cycle; sever it.
                    warnings.push(Warning::CycleBroken {
                        child: arena[i].id.clone(),
                        parent: pid,
                    });
                }
                Some(p) => parent[i] = Some(p),
                None => {
                    // A missing parent is expected after compaction or
                    // in a truncated log, not an error: the record is
                    // promoted to a root and the dangling reference is
                    // preserved as its logical parent.
                    orphan[i] = true;
                    if logical_parent[i].is_none() {
                        logical_parent[i] = Some(pid);
                    }
                }
            }
        }

        sever_cycles(&arena, &mut parent, &mut warnings);

        let roots: Vec<usize> = (0..n).filter(|&i| parent[i].is_none()).collect();

        let (epoch, epochs, compaction_warnings) = compaction::annotate(&arena);
        warnings.extend(compaction_warnings);

        let mut graph = SessionGraph {
            records: arena,
            index,
            parent,
            logical_parent,
            echildren: Vec::new(),
            orphan,
            roots,
            branch: Vec::new(),
            epoch,
            epochs,
            runs: Vec::new(),
            run_of: Vec::new(),
            warnings,
            parse_error_count,
        };

        graph.link_effective();
        graph.branch = branch::resolve(&graph);

        let (runs, run_of, sidechain_warnings) = sidechain::extract(&graph);
        graph.runs = runs;
        graph.run_of = run_of;
        graph.warnings.extend(sidechain_warnings);

        graph
    }

    fn link_effective(&mut self) {
        let n = self.records.len();
        let mut echildren: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            if let Some(p) = self.effective_parent(i) {
                echildren[p].push(i);
            }
        }
        for list in &mut echildren {
            list.sort_by_key(|&i| self.records[i].sequence_position);
        }
        self.echildren = echildren;
    }

    /// Structural parent first, logical link as the fallback at a
    /// compaction boundary. A logical link pointing at the record
    /// itself is ignored.
    pub(crate) fn effective_parent(&self, i: usize) -> Option<usize> {
        if let Some(p) = self.parent[i] {
            return Some(p);
        }
        self.logical_parent[i]
            .as_ref()
            .and_then(|id| self.index.get(id).copied())
            .filter(|&p| p != i)
    }

    pub(crate) fn idx(&self, id: &RecordId) -> Result<usize, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NotFound(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in stream order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Structural roots: explicit roots plus promoted orphans.
    pub fn roots(&self) -> Vec<&Record> {
        self.roots.iter().map(|&i| &self.records[i]).collect()
    }

    pub fn is_orphan(&self, id: &RecordId) -> Result<bool, GraphError> {
        Ok(self.orphan[self.idx(id)?])
    }

    pub fn branch_label(&self, id: &RecordId) -> Result<BranchLabel, GraphError> {
        Ok(self.branch[self.idx(id)?])
    }

    /// Compaction epoch of a record: the number of completed
    /// compactions that preceded it in the stream.
    pub fn epoch_of(&self, id: &RecordId) -> Result<u32, GraphError> {
        Ok(self.epoch[self.idx(id)?])
    }

    /// The preserved logical predecessor of a record, when it resolves.
    pub fn logical_parent(&self, id: &RecordId) -> Result<Option<&Record>, GraphError> {
        let i = self.idx(id)?;
        Ok(self.logical_parent[i]
            .as_ref()
            .and_then(|pid| self.record(pid)))
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn epochs(&self) -> &[CompactionEpoch] {
        &self.epochs
    }

    pub fn sidechain_runs(&self) -> &[SidechainRun] {
        &self.runs
    }

    /// Records of one sidechain run, in stream order.
    pub fn run_records(&self, run: &SidechainRun) -> Vec<&Record> {
        run.records.iter().map(|&i| &self.records[i]).collect()
    }

    pub fn parse_error_count(&self) -> usize {
        self.parse_error_count
    }
}

/// Structural parent edges form a functional graph (at most one parent
/// per node), so cycle detection is a colored walk up the parent chain
/// from every node. A back-edge into the current walk is severed and
/// the child reclassified as a root; traversal must survive any input.
fn sever_cycles(arena: &[Record], parent: &mut [Option<usize>], warnings: &mut Vec<Warning>) {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color = vec![WHITE; arena.len()];
    for start in 0..arena.len() {
        if color[start] != WHITE {
            continue;
        }
        let mut path = Vec::new();
        let mut cur = start;
        loop {
            color[cur] = GRAY;
            path.push(cur);
            match parent[cur] {
                Some(p) if color[p] == GRAY => {
                    tracing::warn!(
                        "Breaking parent cycle at {} -> {}",
                        arena[cur].id,
                        arena[p].id
                    );
                    warnings.push(Warning::CycleBroken {
                        child: arena[cur].id.clone(),
                        parent: arena[p].id.clone(),
                    });
                    parent[cur] = None;
                    break;
                }
                Some(p) if color[p] == WHITE => cur = p,
                // Root, severed, or a chain already cleared.
                _ => break,
            }
        }
        for i in path {
            color[i] = BLACK;
        }
    }
}
