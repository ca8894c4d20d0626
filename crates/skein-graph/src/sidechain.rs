use serde::Serialize;

use skein_core::model::RecordId;

use crate::builder::SessionGraph;
use crate::model::Warning;

/// Agent label used for runs whose invocation cannot be resolved,
/// e.g. when the log was truncated before the invoking record.
pub const UNKNOWN_AGENT: &str = "unknown";

/// How a run was bound to its delegation invocation. Prompt-text
/// equality is preferred; parent-chain linkage is the fallback when
/// the text was truncated or rewritten, and is reported as such so
/// consumers can treat the attribution as low-confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    ChainLinked,
    Unknown,
}

/// A contiguous run of sidechain-flagged records: a delegated
/// sub-conversation in which the controlling process plays the
/// requester and a specialized agent responds.
#[derive(Debug, Clone, PartialEq)]
pub struct SidechainRun {
    pub agent: String,
    /// Id of the delegation invocation this run answers, if resolved.
    pub invocation: Option<RecordId>,
    /// First record of the run.
    pub head: RecordId,
    pub confidence: MatchConfidence,
    pub(crate) records: Vec<usize>,
}

impl SidechainRun {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Scan the stream in order, splitting out contiguous sidechain runs
/// and binding each to a pending delegation invocation.
pub(crate) fn extract(
    graph: &SessionGraph,
) -> (Vec<SidechainRun>, Vec<Option<usize>>, Vec<Warning>) {
    let n = graph.records.len();
    let mut runs: Vec<SidechainRun> = Vec::new();
    let mut run_of: Vec<Option<usize>> = vec![None; n];
    let mut warnings = Vec::new();

    // Invocations seen but not yet bound, in stream order. Several may
    // be outstanding at once when delegations are invoked together.
    let mut pending: Vec<usize> = Vec::new();

    let mut flush = |current: &mut Vec<usize>, pending: &mut Vec<usize>| {
        if current.is_empty() {
            return;
        }
        let run = attribute(graph, pending, std::mem::take(current), &mut warnings);
        for &r in &run.records {
            run_of[r] = Some(runs.len());
        }
        runs.push(run);
    };

    let mut current: Vec<usize> = Vec::new();
    for i in 0..n {
        let rec = &graph.records[i];
        if !rec.is_sidechain {
            flush(&mut current, &mut pending);
            if rec.is_delegation_invocation() {
                pending.push(i);
            }
            continue;
        }
        // Two runs can sit back to back when they complete together; a
        // fresh requester turn whose parent is outside the current run
        // starts the next one.
        let starts_new_run = rec.is_external_requester
            && !current.is_empty()
            && !graph.parent[i].is_some_and(|p| current.contains(&p));
        if starts_new_run {
            flush(&mut current, &mut pending);
        }
        current.push(i);
    }
    flush(&mut current, &mut pending);

    (runs, run_of, warnings)
}

fn attribute(
    graph: &SessionGraph,
    pending: &mut Vec<usize>,
    records: Vec<usize>,
    warnings: &mut Vec<Warning>,
) -> SidechainRun {
    let head_idx = records[0];
    let head = graph.records[head_idx].id.clone();

    let exact: Vec<usize> = pending
        .iter()
        .copied()
        .filter(|&p| {
            let prompt = graph.records[p].delegation.as_ref().map(|d| d.prompt.as_str());
            prompt == graph.records[head_idx].payload.as_deref()
        })
        .collect();

    // Runs may land in completion order rather than invocation order,
    // so when text alone is ambiguous the parent chain decides.
    let chain = chain_ancestors(graph, head_idx);
    let chosen = match exact.as_slice() {
        [single] => Some((*single, MatchConfidence::Exact)),
        [] => chain
            .iter()
            .find(|c| pending.contains(c))
            .map(|&c| (c, MatchConfidence::ChainLinked)),
        multiple => {
            // Same prompt on several outstanding invocations: the
            // nearest one on the head's chain wins.
            let confirmed = chain.iter().copied().find(|c| multiple.contains(c));
            Some((confirmed.unwrap_or(multiple[0]), MatchConfidence::Exact))
        }
    };

    match chosen {
        Some((inv, confidence)) => {
            pending.retain(|&p| p != inv);
            let agent = graph.records[inv]
                .delegation
                .as_ref()
                .map(|d| d.agent.clone())
                .unwrap_or_else(|| UNKNOWN_AGENT.into());
            SidechainRun {
                agent,
                invocation: Some(graph.records[inv].id.clone()),
                head,
                confidence,
                records,
            }
        }
        None => {
            tracing::warn!("Sidechain run at {head} has no resolvable invocation");
            warnings.push(Warning::UnattributedSidechain { head: head.clone() });
            SidechainRun {
                agent: UNKNOWN_AGENT.into(),
                invocation: None,
                head,
                confidence: MatchConfidence::Unknown,
                records,
            }
        }
    }
}

/// Ancestor indices of `start` along structural-then-logical parents,
/// guarded against aliasing so damaged links cannot loop the walk.
fn chain_ancestors(graph: &SessionGraph, start: usize) -> Vec<usize> {
    let mut seen = vec![start];
    let mut cur = start;
    while let Some(p) = graph.effective_parent(cur) {
        if seen.contains(&p) {
            break;
        }
        seen.push(p);
        cur = p;
    }
    seen.remove(0);
    seen
}
