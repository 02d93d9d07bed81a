//! Modular product graphs for the maximum common subgraph reduction.
//!
//! A clique in the modular product of two graphs corresponds to a common
//! induced subgraph; in the subgraph variant, non-edges of the first graph
//! are unconstrained, so a clique covering all of it is a non-induced
//! subgraph isomorphism.

use crate::graph::Graph;

/// Vertex `(i, j)` of a product over `(g1, g2)` is encoded as `i * n2 + j`.
#[inline(always)]
fn encode(g2: &Graph, i: usize, j: usize) -> usize {
    i * g2.size() + j
}

/// Inverts a product vertex back to its `(g1 vertex, g2 vertex)` pair.
pub fn unproduct(_g1: &Graph, g2: &Graph, v: usize) -> (usize, usize) {
    debug_assert!(g2.size() > 0);
    (v / g2.size(), v % g2.size())
}

/// The modular product: `(u1, v1) ~ (u2, v2)` iff `u1 != u2`, `v1 != v2`,
/// and the two graphs agree on adjacency between the pairs.
pub fn modular_product(g1: &Graph, g2: &Graph) -> Graph {
    product_with(g1, g2, |a1, a2| (a1 && a2) || (!a1 && !a2))
}

/// The subgraph modular product: as [`modular_product`], except non-edges of
/// the first graph place no constraint on the second.
pub fn subgraph_modular_product(g1: &Graph, g2: &Graph) -> Graph {
    product_with(g1, g2, |a1, a2| (a1 && a2) || !a1)
}

fn product_with(g1: &Graph, g2: &Graph, keep: impl Fn(bool, bool) -> bool) -> Graph {
    let n1 = g1.size();
    let n2 = g2.size();
    let mut product = Graph::new(n1 * n2, false);

    for u1 in 0..n1 {
        for u2 in 0..n1 {
            if u1 == u2 {
                continue;
            }
            let a1 = g1.adjacent(u1, u2);
            for v1 in 0..n2 {
                for v2 in 0..n2 {
                    if v1 == v2 {
                        continue;
                    }
                    if keep(a1, g2.adjacent(v1, v2)) {
                        product.set_edge(encode(g2, u1, v1), encode(g2, u2, v2));
                    }
                }
            }
        }
    }

    product
}

// ============================================================================
// Tests
// ============================================================================
