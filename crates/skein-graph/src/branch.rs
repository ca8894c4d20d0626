use crate::builder::SessionGraph;
use crate::model::BranchLabel;

/// Label every node Active or Abandoned.
///
/// At any fork the child with the greatest sequence position is the
/// active branch; its siblings and their subtrees were superseded by a
/// later "edit and continue" and stay in the graph for audit only. The
/// root set behaves like children of a virtual fork: the latest
/// non-sidechain root starts the active thread.
pub(crate) fn resolve(graph: &SessionGraph) -> Vec<BranchLabel> {
    let n = graph.records.len();
    let mut labels = vec![BranchLabel::Active; n];
    let mut visited = vec![false; n];

    let eroots = graph.effective_roots();
    let active_root = eroots
        .iter()
        .rev()
        .find(|&&i| !graph.records[i].is_sidechain)
        .or(eroots.last())
        .copied();

    for &root in &eroots {
        mark(graph, root, Some(root) != active_root, &mut labels, &mut visited);
    }
    labels
}

fn mark(
    graph: &SessionGraph,
    start: usize,
    abandoned: bool,
    labels: &mut [BranchLabel],
    visited: &mut [bool],
) {
    let mut stack = vec![(start, abandoned)];
    while let Some((i, abandoned)) = stack.pop() {
        // Logical links can alias subtrees in damaged input; visit once.
        if visited[i] {
            continue;
        }
        visited[i] = true;
        if abandoned {
            labels[i] = BranchLabel::Abandoned;
        }
        let kids = &graph.echildren[i];
        let active_child = kids.last().copied();
        for &k in kids {
            stack.push((k, abandoned || Some(k) != active_child));
        }
    }
}
