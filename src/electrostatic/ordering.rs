use std::collections::VecDeque;

use crate::electrostatic::CsrMatrix;

/// Reverse Cuthill-McKee ordering of the symmetrised sparsity pattern of `a`.
///
/// Returns `order` where `order[k]` is the original index placed at position `k`.
/// Each connected component starts from a pseudo-peripheral node so that the
/// breadth first levels, and hence the bandwidth, stay narrow.
pub fn reverse_cuthill_mckee(a: &CsrMatrix) -> Vec<usize> {
    let adjacency = symmetric_adjacency(a);
    let n = adjacency.len();
    let degree: Vec<usize> = adjacency.iter().map(|nodes| nodes.len()).collect();

    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    for seed in 0..n {
        if visited[seed] {
            continue;
        }
        let start = pseudo_peripheral_node(&adjacency, &degree, seed);
        visited[start] = true;
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            order.push(node);
            let mut neighbours: Vec<usize> = adjacency[node].iter()
                .copied()
                .filter(|&other| !visited[other])
                .collect();
            neighbours.sort_by_key(|&other| degree[other]);
            for other in neighbours {
                visited[other] = true;
                queue.push_back(other);
            }
        }
    }
    order.reverse();
    order
}

/// Bandwidth of `a` after permuting rows and columns by `order`.
pub fn bandwidth(a: &CsrMatrix, order: &[usize]) -> usize {
    let mut position = vec![0; order.len()];
    for (k, &node) in order.iter().enumerate() {
        position[node] = k;
    }
    let mut width = 0;
    for row in 0..a.nrows() {
        let (cols, _) = a.row(row);
        for &col in cols {
            width = width.max(position[row].abs_diff(position[col]));
        }
    }
    width
}

fn symmetric_adjacency(a: &CsrMatrix) -> Vec<Vec<usize>> {
    let n = a.nrows().max(a.ncols());
    let mut adjacency = vec![Vec::new(); n];
    for row in 0..a.nrows() {
        let (cols, _) = a.row(row);
        for &col in cols {
            if col != row {
                adjacency[row].push(col);
                adjacency[col].push(row);
            }
        }
    }
    for nodes in adjacency.iter_mut() {
        nodes.sort_unstable();
        nodes.dedup();
    }
    adjacency
}

/// Walks to the lowest degree node of the deepest level until the depth stops growing.
fn pseudo_peripheral_node(adjacency: &[Vec<usize>], degree: &[usize], seed: usize) -> usize {
    let mut node = seed;
    let (mut depth, mut last_level) = level_structure(adjacency, node);
    loop {
        let candidate = match last_level.iter().copied().min_by_key(|&other| degree[other]) {
            Some(candidate) => candidate,
            None => return node,
        };
        let (candidate_depth, candidate_level) = level_structure(adjacency, candidate);
        if candidate_depth <= depth {
            return node;
        }
        node = candidate;
        depth = candidate_depth;
        last_level = candidate_level;
    }
}

/// Depth of the breadth first search from `root` and the nodes in its last level.
fn level_structure(adjacency: &[Vec<usize>], root: usize) -> (usize, Vec<usize>) {
    let mut seen = vec![false; adjacency.len()];
    seen[root] = true;
    let mut level = vec![root];
    let mut depth = 0;
    loop {
        let mut next = Vec::new();
        for &node in level.iter() {
            for &other in adjacency[node].iter() {
                if !seen[other] {
                    seen[other] = true;
                    next.push(other);
                }
            }
        }
        if next.is_empty() {
            return (depth, level);
        }
        depth += 1;
        level = next;
    }
}
