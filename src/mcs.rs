//! Maximum common subgraph as clique search on a modular product.

use crate::clique::max_clique;
use crate::graph::Graph;
use crate::params::{MaxCommonSubgraphParams, MaxCommonSubgraphResult};
use crate::product::{modular_product, subgraph_modular_product, unproduct};

/// Finds a maximum common (induced) subgraph of `g1` and `g2`.
///
/// With `subgraph_isomorphism` set, the subgraph modular product is used and
/// the initial bound is seeded to `|g1| - 1`, so a witness is only reported
/// when the whole of `g1` embeds into `g2` (non-induced).
pub fn max_common_subgraph(
    g1: &Graph,
    g2: &Graph,
    params: &MaxCommonSubgraphParams,
) -> MaxCommonSubgraphResult {
    let mut clique_params = params.clique.clone();
    clique_params.stop_after_finding = clique_params
        .stop_after_finding
        .min(g1.size())
        .min(g2.size());

    let product = if params.subgraph_isomorphism {
        clique_params.initial_bound = g1.size().saturating_sub(1);
        subgraph_modular_product(g1, g2)
    } else {
        modular_product(g1, g2)
    };

    let clique = max_clique(&product, &clique_params);

    MaxCommonSubgraphResult {
        size: clique.size,
        isomorphism: clique
            .members
            .iter()
            .map(|&v| unproduct(g1, g2, v))
            .collect(),
        nodes: clique.nodes,
        times: clique.times,
        aborted: clique.aborted,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    fn random_graph(rng: &mut XorShiftRng, n: usize, p: f64) -> Graph {
        let mut g = Graph::new(n, false);
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.random_bool(p) {
                    g.add_edge(i, j).unwrap();
                }
            }
        }
        g
    }

    fn complete(n: usize) -> Graph {
        let mut g = Graph::new(n, false);
        for i in 0..n {
            for j in (i + 1)..n {
                g.add_edge(i, j).unwrap();
            }
        }
        g
    }

    fn cycle(n: usize) -> Graph {
        Graph::from_edges(n, false, (0..n).map(|i| (i, (i + 1) % n))).unwrap()
    }

    /// Checks the witness describes a common induced subgraph.
    fn assert_common_induced(g1: &Graph, g2: &Graph, iso: &[(usize, usize)]) {
        for (x, &(a, b)) in iso.iter().enumerate() {
            for &(c, d) in &iso[x + 1..] {
                assert_ne!(a, c, "first-graph vertex repeated");
                assert_ne!(b, d, "second-graph vertex repeated");
                assert_eq!(
                    g1.adjacent(a, c),
                    g2.adjacent(b, d),
                    "adjacency disagrees on pairs ({a},{b}) and ({c},{d})"
                );
            }
        }
    }

    fn brute_force_sgi(pattern: &Graph, target: &Graph) -> bool {
        fn go(pattern: &Graph, target: &Graph, map: &mut Vec<usize>, used: &mut Vec<bool>) -> bool {
            let v = map.len();
            if v == pattern.size() {
                return true;
            }
            'target: for t in 0..target.size() {
                if used[t] {
                    continue;
                }
                for (u, &tu) in map.iter().enumerate() {
                    if pattern.adjacent(u, v) && !target.adjacent(tu, t) {
                        continue 'target;
                    }
                }
                map.push(t);
                used[t] = true;
                if go(pattern, target, map, used) {
                    return true;
                }
                map.pop();
                used[t] = false;
            }
            false
        }
        go(pattern, target, &mut Vec::new(), &mut vec![false; target.size()])
    }

    #[test]
    fn graph_with_itself_is_fully_covered() {
        let mut rng = XorShiftRng::seed_from_u64(0x5E1F);
        for _case in 0..10 {
            let n = rng.random_range(1..7);
            let g = random_graph(&mut rng, n, 0.5);
            let result = max_common_subgraph(&g, &g, &MaxCommonSubgraphParams::default());
            assert_eq!(result.size, n);
            assert_eq!(result.isomorphism.len(), n);
            assert_common_induced(&g, &g, &result.isomorphism);
        }
    }

    #[test]
    fn k3_and_k4_share_a_triangle() {
        let result =
            max_common_subgraph(&complete(3), &complete(4), &MaxCommonSubgraphParams::default());
        assert_eq!(result.size, 3);
        assert_common_induced(&complete(3), &complete(4), &result.isomorphism);
    }

    #[test]
    fn c5_and_c4_share_a_path_on_three_vertices() {
        // C5 has no induced C4 and no induced P4 fits in C4, so the best
        // common induced subgraph is P3
        let result = max_common_subgraph(&cycle(5), &cycle(4), &MaxCommonSubgraphParams::default());
        assert_eq!(result.size, 3);
        assert_common_induced(&cycle(5), &cycle(4), &result.isomorphism);
    }

    #[test]
    fn witnesses_are_always_common_induced_subgraphs() {
        let mut rng = XorShiftRng::seed_from_u64(0x3C5);
        for _case in 0..15 {
            let n1 = rng.random_range(1..6);
            let g1 = random_graph(&mut rng, n1, 0.5);
            let n2 = rng.random_range(1..6);
            let g2 = random_graph(&mut rng, n2, 0.5);
            let result = max_common_subgraph(&g1, &g2, &MaxCommonSubgraphParams::default());
            assert_eq!(result.size, result.isomorphism.len());
            assert_common_induced(&g1, &g2, &result.isomorphism);
            assert!(result.size <= g1.size().min(g2.size()));
        }
    }

    #[test]
    fn subgraph_flag_reproduces_subgraph_isomorphism() {
        let mut rng = XorShiftRng::seed_from_u64(0x51);
        for _case in 0..25 {
            let np = rng.random_range(1..5);
            let nt = rng.random_range(np..7);
            let g1 = random_graph(&mut rng, np, 0.5);
            let g2 = random_graph(&mut rng, nt, 0.5);

            let params = MaxCommonSubgraphParams {
                subgraph_isomorphism: true,
                ..MaxCommonSubgraphParams::default()
            };
            let result = max_common_subgraph(&g1, &g2, &params);
            let expected = brute_force_sgi(&g1, &g2);
            assert_eq!(
                !result.isomorphism.is_empty(),
                expected,
                "subgraph-product MCS disagrees with brute force"
            );
            if expected {
                assert_eq!(result.isomorphism.len(), np);
                // pattern edges must be preserved
                for (x, &(a, b)) in result.isomorphism.iter().enumerate() {
                    for &(c, d) in &result.isomorphism[x + 1..] {
                        if g1.adjacent(a, c) {
                            assert!(g2.adjacent(b, d));
                        }
                    }
                }
            }
        }
    }
}
