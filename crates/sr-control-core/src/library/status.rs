//! Interpreting status command output.

use super::types::LibraryStatus;

/// Check that every expected node name occurs in `output`.
///
/// Each name is a substring match against a single line, and a line can
/// account for at most one expected name. Names are paired with lines by
/// maximum matching, so the order of the output does not matter. An empty
/// `nodes` list is trivially satisfied.
pub fn all_nodes_present<'a, I>(lines: I, nodes: &[String]) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let lines: Vec<&str> = lines.into_iter().collect();
    let candidates: Vec<Vec<usize>> = nodes
        .iter()
        .map(|node| {
            lines
                .iter()
                .enumerate()
                .filter(|(_, line)| line.contains(node.as_str()))
                .map(|(index, _)| index)
                .collect()
        })
        .collect();
    if candidates.iter().any(Vec::is_empty) {
        return false;
    }

    let mut owner: Vec<Option<usize>> = vec![None; lines.len()];
    for node in 0..nodes.len() {
        let mut visited = vec![false; lines.len()];
        if !claim_line(node, &candidates, &mut owner, &mut visited) {
            return false;
        }
    }
    true
}

/// Find a line for `node`, moving earlier claims along an augmenting path.
fn claim_line(
    node: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &line in &candidates[node] {
        if visited[line] {
            continue;
        }
        visited[line] = true;
        let free = match owner[line] {
            None => true,
            Some(other) => claim_line(other, candidates, owner, visited),
        };
        if free {
            owner[line] = Some(node);
            return true;
        }
    }
    false
}

/// Status a finished status check should leave behind, or `None` to keep
/// `current`.
///
/// A missing node never overrides `Starting`: the launch may still be
/// bringing nodes up.
pub fn reconcile(current: LibraryStatus, all_present: bool) -> Option<LibraryStatus> {
    let next = if all_present {
        LibraryStatus::Started
    } else if current == LibraryStatus::Starting {
        return None;
    } else {
        LibraryStatus::Stopped
    };
    (next != current).then_some(next)
}
