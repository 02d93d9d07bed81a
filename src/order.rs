//! Initial vertex orderings for the branch-and-bound engines.
//!
//! The ordering fixes the vertex labelling inside the bit graph; witnesses
//! are translated back to original labels before being returned.

use crate::graph::Graph;

/// Which permutation the clique engine applies before recoding the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexOrder {
    /// Non-increasing degree, ties broken by lower original index.
    Degree,
    /// Repeatedly remove a minimum-degree vertex of the remaining graph;
    /// the order is the reverse of the removal order.
    MinWidth,
    /// Non-increasing (degree, sum of neighbour degrees), ties by lower index.
    ExDegree,
    /// Greedy maximum (degree, exdegree) selection, both recomputed on the
    /// remaining graph at every step.
    DynExDegree,
}

impl VertexOrder {
    /// Produces the permutation: position `i` holds the original id of the
    /// vertex labelled `i` in the recoded graph.
    pub fn permutation(self, g: &Graph) -> Vec<usize> {
        match self {
            VertexOrder::Degree => degree_sort(g),
            VertexOrder::MinWidth => min_width_sort(g),
            VertexOrder::ExDegree => exdegree_sort(g),
            VertexOrder::DynExDegree => dyn_exdegree_sort(g),
        }
    }
}

fn degree_sort(g: &Graph) -> Vec<usize> {
    let mut order: Vec<usize> = (0..g.size()).collect();
    order.sort_by_key(|&v| (std::cmp::Reverse(g.degree(v)), v));
    order
}

fn exdegree_sort(g: &Graph) -> Vec<usize> {
    let n = g.size();
    let exdegree: Vec<usize> = (0..n)
        .map(|v| (0..n).filter(|&w| g.adjacent(v, w)).map(|w| g.degree(w)).sum())
        .collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&v| (std::cmp::Reverse((g.degree(v), exdegree[v])), v));
    order
}

fn min_width_sort(g: &Graph) -> Vec<usize> {
    let n = g.size();
    let mut remaining = vec![true; n];
    let mut degree: Vec<usize> = (0..n).map(|v| g.degree(v)).collect();
    let mut removal = Vec::with_capacity(n);

    for _ in 0..n {
        let mut best = usize::MAX;
        let mut best_deg = usize::MAX;
        for v in 0..n {
            if remaining[v] && degree[v] < best_deg {
                best_deg = degree[v];
                best = v;
            }
        }
        remaining[best] = false;
        removal.push(best);
        for w in 0..n {
            if remaining[w] && g.adjacent(best, w) {
                degree[w] -= 1;
            }
        }
    }

    removal.reverse();
    removal
}

fn dyn_exdegree_sort(g: &Graph) -> Vec<usize> {
    let n = g.size();
    let mut remaining = vec![true; n];
    let mut degree: Vec<usize> = (0..n).map(|v| g.degree(v)).collect();
    let mut order = Vec::with_capacity(n);

    for _ in 0..n {
        let mut best = usize::MAX;
        let mut best_key = (0usize, 0usize);
        for v in 0..n {
            if !remaining[v] {
                continue;
            }
            let exdeg: usize = (0..n)
                .filter(|&w| remaining[w] && g.adjacent(v, w))
                .map(|w| degree[w])
                .sum();
            let key = (degree[v], exdeg);
            if best == usize::MAX || key > best_key {
                best_key = key;
                best = v;
            }
        }
        remaining[best] = false;
        order.push(best);
        for w in 0..n {
            if remaining[w] && g.adjacent(best, w) {
                degree[w] -= 1;
            }
        }
    }

    order
}

// ============================================================================
// Tests
// ============================================================================
