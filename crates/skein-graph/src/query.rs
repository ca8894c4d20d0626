use std::collections::BTreeMap;

use skein_core::model::{Record, RecordId};

use crate::builder::SessionGraph;
use crate::error::GraphError;
use crate::sidechain::SidechainRun;

/// Traversal queries over a built graph. All of them assume the
/// structural parents are already acyclic (the builder guarantees it);
/// logical links are additionally alias-guarded so that even a damaged
/// logical reference can only truncate a walk, never hang it.
impl SessionGraph {
    /// Children of a record: structural children plus records attached
    /// through a resolvable logical link, in sequence order.
    pub fn children(&self, id: &RecordId) -> Result<Vec<&Record>, GraphError> {
        let i = self.idx(id)?;
        Ok(self.echildren[i].iter().map(|&c| &self.records[c]).collect())
    }

    /// Ancestors nearest-first, walking the structural parent and
    /// falling back to the logical parent at compaction boundaries.
    pub fn ancestors(&self, id: &RecordId) -> Result<Vec<&Record>, GraphError> {
        let mut cur = self.idx(id)?;
        let mut on_path = vec![false; self.records.len()];
        on_path[cur] = true;
        let mut out = Vec::new();
        while let Some(p) = self.effective_parent(cur) {
            if on_path[p] {
                break;
            }
            on_path[p] = true;
            out.push(&self.records[p]);
            cur = p;
        }
        Ok(out)
    }

    /// Every record below `id`, preorder, excluding `id` itself.
    pub fn descendants(&self, id: &RecordId) -> Result<Vec<&Record>, GraphError> {
        let start = self.idx(id)?;
        let mut visited = vec![false; self.records.len()];
        visited[start] = true;
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.echildren[start].iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            out.push(&self.records[i]);
            stack.extend(self.echildren[i].iter().rev());
        }
        Ok(out)
    }

    /// Every root-to-leaf path, for audit: abandoned branches included.
    pub fn all_branches(&self) -> Vec<Vec<&Record>> {
        let mut out = Vec::new();
        let mut on_path = vec![false; self.records.len()];
        for root in self.effective_roots() {
            self.collect_paths(root, &mut on_path, &mut out);
        }
        out
    }

    fn collect_paths<'a>(
        &'a self,
        root: usize,
        on_path: &mut [bool],
        out: &mut Vec<Vec<&'a Record>>,
    ) {
        // Iterative path enumeration: deep chains are the common case
        // in long sessions and must not exhaust the call stack.
        let mut path: Vec<usize> = Vec::new();
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(&(node, cursor)) = stack.last() {
            if cursor == 0 {
                path.push(node);
                on_path[node] = true;
                if self.echildren[node].is_empty() {
                    out.push(path.iter().map(|&i| &self.records[i]).collect());
                }
            }
            if let Some(&child) = self.echildren[node].get(cursor) {
                let top = stack.len() - 1;
                stack[top].1 += 1;
                if !on_path[child] {
                    stack.push((child, 0));
                }
            } else {
                on_path[node] = false;
                path.pop();
                stack.pop();
            }
        }
    }

    /// The canonical "current" conversation: start at the latest
    /// non-sidechain root and take the latest child at every fork.
    pub fn active_thread(&self) -> Vec<&Record> {
        let eroots = self.effective_roots();
        let start = eroots
            .iter()
            .rev()
            .find(|&&i| !self.records[i].is_sidechain)
            .or(eroots.last())
            .copied();
        let Some(mut cur) = start else {
            return Vec::new();
        };
        let mut visited = vec![false; self.records.len()];
        visited[cur] = true;
        let mut out = vec![&self.records[cur]];
        while let Some(&next) = self.echildren[cur].last() {
            if visited[next] {
                break;
            }
            visited[next] = true;
            out.push(&self.records[next]);
            cur = next;
        }
        out
    }

    /// The active thread with all sidechain runs filtered out.
    pub fn main_thread(&self) -> Vec<&Record> {
        self.active_thread()
            .into_iter()
            .filter(|r| !r.is_sidechain)
            .collect()
    }

    /// The sidechain run a record belongs to, if any.
    pub fn sidechain_run_of(&self, id: &RecordId) -> Result<Option<&SidechainRun>, GraphError> {
        let i = self.idx(id)?;
        Ok(self.run_of[i].map(|r| &self.runs[r]))
    }

    /// Sidechain runs grouped by their delegated agent label.
    pub fn sidechain_groups(&self) -> BTreeMap<&str, Vec<&SidechainRun>> {
        let mut groups: BTreeMap<&str, Vec<&SidechainRun>> = BTreeMap::new();
        for run in &self.runs {
            groups.entry(run.agent.as_str()).or_default().push(run);
        }
        groups
    }

    pub(crate) fn effective_roots(&self) -> Vec<usize> {
        (0..self.records.len())
            .filter(|&i| self.effective_parent(i).is_none())
            .collect()
    }
}
