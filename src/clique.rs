//! Bit-parallel branch-and-bound for maximum clique.
//!
//! The engine recodes the input graph against the chosen vertex ordering,
//! then grows a clique `C` while a colour-class ordering of the candidate
//! set `P` supplies the bound: candidates are taken in reverse colouring
//! order, and a branch is cut as soon as `|C| + bound <= |C*|`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_utils::CachePadded;
use rayon::prelude::*;

use crate::bitgraph::BitGraph;
use crate::bitset::FixedBitSet;
use crate::cco::{colour_class_order, tags, CcoPermutations};
use crate::dispatch::dispatch_words;
use crate::graph::Graph;
use crate::params::{MaxCliqueParams, MaxCliqueResult};

/// Finds a maximum clique of `graph`.
///
/// Members are reported in original vertex ids, ascending. Graphs larger
/// than [`crate::dispatch::MAX_VERTICES`] yield an empty result with zero
/// nodes. Two serial solves (`n_threads == 1`) of the same input produce
/// identical results; the parallel engine guarantees the size but not the
/// tie-broken witness or the node count.
pub fn max_clique(graph: &Graph, params: &MaxCliqueParams) -> MaxCliqueResult {
    dispatch_words!(
        graph.size(),
        solve,
        (graph, params),
        MaxCliqueResult {
            size: params.initial_bound,
            ..MaxCliqueResult::default()
        },
    )
}

fn solve<const W: usize>(graph: &Graph, params: &MaxCliqueParams) -> MaxCliqueResult {
    match params.permutations {
        CcoPermutations::None => run::<W, { tags::NONE }>(graph, params),
        CcoPermutations::Defer1 => run::<W, { tags::DEFER1 }>(graph, params),
        CcoPermutations::RepairAll => run::<W, { tags::REPAIR_ALL }>(graph, params),
        CcoPermutations::RepairAllDefer1 => run::<W, { tags::REPAIR_ALL_DEFER1 }>(graph, params),
        CcoPermutations::RepairSelected => run::<W, { tags::REPAIR_SELECTED }>(graph, params),
        CcoPermutations::RepairSelectedDefer1 => {
            run::<W, { tags::REPAIR_SELECTED_DEFER1 }>(graph, params)
        }
        CcoPermutations::RepairAllFast => run::<W, { tags::REPAIR_ALL_FAST }>(graph, params),
        CcoPermutations::RepairSelectedFast => {
            run::<W, { tags::REPAIR_SELECTED_FAST }>(graph, params)
        }
    }
}

fn run<const W: usize, const PERM: u8>(graph: &Graph, params: &MaxCliqueParams) -> MaxCliqueResult {
    let order = params.order.permutation(graph);
    let bitgraph = BitGraph::<W>::from_graph(graph, &order);

    if params.n_threads > 1 {
        return run_parallel::<W, PERM>(&bitgraph, &order, params);
    }

    let mut search = SerialSearch::<W, PERM> {
        graph: &bitgraph,
        order: &order,
        params,
        best_size: params.initial_bound,
        best_members: Vec::new(),
        nodes: 0,
        times: Vec::new(),
        aborted: false,
        stopped: false,
    };

    let mut clique = Vec::with_capacity(bitgraph.size());
    let mut candidates = FixedBitSet::<W>::new();
    candidates.set_up_to(bitgraph.size());
    search.expand(&mut clique, &mut candidates);

    let mut members: Vec<usize> = search.best_members.iter().map(|&v| order[v]).collect();
    members.sort_unstable();
    MaxCliqueResult {
        size: search.best_size,
        members,
        nodes: search.nodes,
        times: search.times,
        aborted: search.aborted,
    }
}

// ============================================================================
// Serial engine
// ============================================================================

struct SerialSearch<'a, const W: usize, const PERM: u8> {
    graph: &'a BitGraph<W>,
    order: &'a [usize],
    params: &'a MaxCliqueParams,
    best_size: usize,
    best_members: Vec<usize>,
    nodes: u64,
    times: Vec<Duration>,
    aborted: bool,
    stopped: bool,
}

impl<const W: usize, const PERM: u8> SerialSearch<'_, W, PERM> {
    fn record_incumbent(&mut self, clique: &[usize]) {
        self.best_size = clique.len();
        self.best_members = clique.to_vec();
        let elapsed = self.params.start_time.elapsed();
        self.times.push(elapsed);
        report_incumbent(self.params, self.order, clique, elapsed);
        if self.best_size >= self.params.stop_after_finding {
            self.stopped = true;
        }
    }

    fn expand(&mut self, clique: &mut Vec<usize>, p: &mut FixedBitSet<W>) {
        if self.params.abort.load(Ordering::Relaxed) {
            self.aborted = true;
            return;
        }
        self.nodes += 1;

        let count = p.popcount();
        let mut p_order = vec![0usize; count];
        let mut p_bounds = vec![0usize; count];
        let len = colour_class_order::<W, PERM, false>(
            self.graph,
            p,
            &mut p_order,
            &mut p_bounds,
            self.best_size,
        );
        debug_assert_eq!(len, count);

        for idx in (0..len).rev() {
            if clique.len() + p_bounds[idx] <= self.best_size {
                return;
            }

            let v = p_order[idx];
            clique.push(v);
            if clique.len() > self.best_size {
                self.record_incumbent(clique);
            }

            let mut next = *p;
            self.graph.intersect_with_row(v, &mut next);
            if !next.empty() && !self.stopped {
                self.expand(clique, &mut next);
            }

            clique.pop();
            if self.aborted || self.stopped {
                return;
            }
            p.unset(v);
        }
    }
}

fn report_incumbent(
    params: &MaxCliqueParams,
    order: &[usize],
    clique: &[usize],
    elapsed: Duration,
) {
    if params.print_incumbents {
        if let Some(sink) = &params.incumbent_sink {
            let mut members: Vec<usize> = clique.iter().map(|&v| order[v]).collect();
            members.sort_unstable();
            sink(elapsed.as_millis() as u64, clique.len(), &members);
        }
    }
}

// ============================================================================
// Parallel engine
// ============================================================================

struct SharedIncumbent {
    /// Best size so far, read lock-free by the prune test.
    bound: CachePadded<AtomicUsize>,
    /// Total nodes across workers.
    nodes: CachePadded<AtomicU64>,
    aborted: AtomicBool,
    best: Mutex<SharedBest>,
}

struct SharedBest {
    size: usize,
    members: Vec<usize>,
    times: Vec<Duration>,
}

/// Splits the root branching across a worker pool.
///
/// Each root position gets the candidate set the serial engine would have
/// seen there; below the root, workers run the serial recursion against the
/// shared incumbent.
fn run_parallel<const W: usize, const PERM: u8>(
    bitgraph: &BitGraph<W>,
    order: &[usize],
    params: &MaxCliqueParams,
) -> MaxCliqueResult {
    let n = bitgraph.size();
    let mut full = FixedBitSet::<W>::new();
    full.set_up_to(n);

    let mut p_order = vec![0usize; n];
    let mut p_bounds = vec![0usize; n];
    let len = colour_class_order::<W, PERM, false>(
        bitgraph,
        &full,
        &mut p_order,
        &mut p_bounds,
        params.initial_bound,
    );

    // root subproblems in the order the serial engine would branch
    let mut p = full;
    let mut subproblems = Vec::with_capacity(len);
    for idx in (0..len).rev() {
        let v = p_order[idx];
        let mut candidates = p;
        bitgraph.intersect_with_row(v, &mut candidates);
        subproblems.push((v, p_bounds[idx], candidates));
        p.unset(v);
    }

    let shared = SharedIncumbent {
        bound: CachePadded::new(AtomicUsize::new(params.initial_bound)),
        nodes: CachePadded::new(AtomicU64::new(0)),
        aborted: AtomicBool::new(false),
        best: Mutex::new(SharedBest {
            size: params.initial_bound,
            members: Vec::new(),
            times: Vec::new(),
        }),
    };

    let work = || {
        subproblems.par_iter().for_each(|(v, bound, candidates)| {
            if shared.aborted.load(Ordering::Relaxed)
                || shared.bound.load(Ordering::Relaxed) >= params.stop_after_finding
                || *bound <= shared.bound.load(Ordering::Relaxed)
            {
                return;
            }
            let mut worker = ParallelWorker::<W, PERM> {
                graph: bitgraph,
                order,
                params,
                shared: &shared,
                nodes: 0,
            };
            let mut clique = vec![*v];
            worker.try_record(&clique);
            let mut candidates = *candidates;
            if !candidates.empty() {
                worker.expand(&mut clique, &mut candidates);
            }
            shared.nodes.fetch_add(worker.nodes, Ordering::Relaxed);
        });
    };

    match rayon::ThreadPoolBuilder::new()
        .num_threads(params.n_threads)
        .build()
    {
        Ok(pool) => pool.install(work),
        Err(_) => work(),
    }

    let best = shared
        .best
        .into_inner()
        .unwrap_or_else(|poison| poison.into_inner());
    let mut members: Vec<usize> = best.members.iter().map(|&v| order[v]).collect();
    members.sort_unstable();
    MaxCliqueResult {
        size: best.size,
        members,
        nodes: shared.nodes.into_inner().into_inner(),
        times: best.times,
        aborted: shared.aborted.into_inner(),
    }
}

struct ParallelWorker<'a, const W: usize, const PERM: u8> {
    graph: &'a BitGraph<W>,
    order: &'a [usize],
    params: &'a MaxCliqueParams,
    shared: &'a SharedIncumbent,
    nodes: u64,
}

impl<const W: usize, const PERM: u8> ParallelWorker<'_, W, PERM> {
    fn try_record(&mut self, clique: &[usize]) {
        if clique.len() <= self.shared.bound.load(Ordering::Relaxed) {
            return;
        }
        let mut best = self
            .shared
            .best
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if clique.len() > best.size {
            best.size = clique.len();
            best.members = clique.to_vec();
            let elapsed = self.params.start_time.elapsed();
            best.times.push(elapsed);
            self.shared.bound.fetch_max(clique.len(), Ordering::Relaxed);
            report_incumbent(self.params, self.order, clique, elapsed);
        }
    }

    fn expand(&mut self, clique: &mut Vec<usize>, p: &mut FixedBitSet<W>) {
        if self.params.abort.load(Ordering::Relaxed) {
            self.shared.aborted.store(true, Ordering::Relaxed);
            return;
        }
        self.nodes += 1;

        let bound_now = self.shared.bound.load(Ordering::Relaxed);
        let count = p.popcount();
        let mut p_order = vec![0usize; count];
        let mut p_bounds = vec![0usize; count];
        let len =
            colour_class_order::<W, PERM, false>(self.graph, p, &mut p_order, &mut p_bounds, bound_now);
        debug_assert_eq!(len, count);

        for idx in (0..len).rev() {
            let best = self.shared.bound.load(Ordering::Relaxed);
            if clique.len() + p_bounds[idx] <= best || best >= self.params.stop_after_finding {
                return;
            }

            let v = p_order[idx];
            clique.push(v);
            self.try_record(clique);

            let mut next = *p;
            self.graph.intersect_with_row(v, &mut next);
            if !next.empty() {
                self.expand(clique, &mut next);
            }

            clique.pop();
            if self.shared.aborted.load(Ordering::Relaxed) {
                return;
            }
            p.unset(v);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::VertexOrder;
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    const ALL_PERMS: [CcoPermutations; 8] = [
        CcoPermutations::None,
        CcoPermutations::Defer1,
        CcoPermutations::RepairAll,
        CcoPermutations::RepairAllDefer1,
        CcoPermutations::RepairSelected,
        CcoPermutations::RepairSelectedDefer1,
        CcoPermutations::RepairAllFast,
        CcoPermutations::RepairSelectedFast,
    ];

    const ALL_ORDERS: [VertexOrder; 4] = [
        VertexOrder::Degree,
        VertexOrder::MinWidth,
        VertexOrder::ExDegree,
        VertexOrder::DynExDegree,
    ];

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

    fn brute_omega(g: &Graph) -> usize {
        let n = g.size();
        assert!(n <= 20);
        let adj: Vec<u64> = (0..n)
            .map(|v| (0..n).filter(|&w| g.adjacent(v, w)).fold(0u64, |m, w| m | 1 << w))
            .collect();
        let mut best = 0usize;
        for mask in 0u64..(1u64 << n) {
            let size = mask.count_ones() as usize;
            if size <= best {
                continue;
            }
            let mut t = mask;
            let mut clique = true;
            while t != 0 {
                let v = t.trailing_zeros() as usize;
                t &= t - 1;
                if adj[v] & mask != mask & !(1 << v) {
                    clique = false;
                    break;
                }
            }
            if clique {
                best = size;
            }
        }
        best
    }

    fn assert_is_clique(g: &Graph, members: &[usize]) {
        for (a, &u) in members.iter().enumerate() {
            for &w in &members[a + 1..] {
                assert!(g.adjacent(u, w), "members {u} and {w} not adjacent");
            }
        }
    }

    fn petersen() -> Graph {
        Graph::from_edges(
            10,
            false,
            [
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 4),
                (4, 0), // outer cycle
                (0, 5),
                (1, 6),
                (2, 7),
                (3, 8),
                (4, 9), // spokes
                (5, 7),
                (7, 9),
                (9, 6),
                (6, 8),
                (8, 5), // inner pentagram
            ],
        )
        .unwrap()
    }

    #[test]
    fn k4_has_clique_of_four() {
        let g = Graph::from_edges(4, false, [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)])
            .unwrap();
        let result = max_clique(&g, &MaxCliqueParams::default());
        assert_eq!(result.size, 4);
        assert_eq!(result.members, vec![0, 1, 2, 3]);
        assert!(!result.aborted);
        assert!(result.nodes > 0);
    }

    #[test]
    fn petersen_has_omega_two() {
        let result = max_clique(&petersen(), &MaxCliqueParams::default());
        assert_eq!(result.size, 2);
        assert_is_clique(&petersen(), &result.members);
    }

    #[test]
    fn five_cycle_has_omega_two() {
        let g = Graph::from_edges(5, false, [(0, 1), (1, 2), (2, 3), (3, 4), (4, 0)]).unwrap();
        let result = max_clique(&g, &MaxCliqueParams::default());
        assert_eq!(result.size, 2);
        assert_is_clique(&g, &result.members);
    }

    #[test]
    fn every_variant_matches_brute_force() {
        let mut rng = XorShiftRng::seed_from_u64(0x0A31);
        for _case in 0..12 {
            let n = rng.random_range(6..15);
            let p = rng.random_range(0.2..0.8);
            let g = random_graph(&mut rng, n, p);
            let omega = brute_omega(&g);

            for perm in ALL_PERMS {
                for order in ALL_ORDERS {
                    let params = MaxCliqueParams {
                        permutations: perm,
                        order,
                        ..MaxCliqueParams::default()
                    };
                    let result = max_clique(&g, &params);
                    assert_eq!(
                        result.size, omega,
                        "{perm:?}/{order:?} disagreed with brute force"
                    );
                    assert_eq!(result.members.len(), omega);
                    assert_is_clique(&g, &result.members);
                }
            }
        }
    }

    #[test]
    fn fifty_seeds_at_twenty_vertices() {
        for seed in 0..50u64 {
            let mut rng = XorShiftRng::seed_from_u64(seed);
            let g = random_graph(&mut rng, 20, 0.5);
            let omega = brute_omega(&g);
            for perm in ALL_PERMS {
                let params = MaxCliqueParams {
                    permutations: perm,
                    ..MaxCliqueParams::default()
                };
                let result = max_clique(&g, &params);
                assert_eq!(result.size, omega, "seed {seed}, {perm:?}");
            }
        }
    }

    #[test]
    fn serial_solves_are_deterministic() {
        let mut rng = XorShiftRng::seed_from_u64(0xDE7);
        let g = random_graph(&mut rng, 18, 0.6);
        for perm in ALL_PERMS {
            let params = MaxCliqueParams {
                permutations: perm,
                ..MaxCliqueParams::default()
            };
            let a = max_clique(&g, &params);
            let b = max_clique(&g, &params);
            assert_eq!((a.size, &a.members, a.nodes), (b.size, &b.members, b.nodes));
        }
    }

    #[test]
    fn initial_bound_suppresses_smaller_witnesses() {
        let g = petersen();
        let omega = 2;

        let seeded = MaxCliqueParams {
            initial_bound: omega,
            ..MaxCliqueParams::default()
        };
        let result = max_clique(&g, &seeded);
        assert_eq!(result.size, omega);
        assert!(result.members.is_empty(), "no strictly better clique exists");

        let below = MaxCliqueParams {
            initial_bound: omega - 1,
            ..MaxCliqueParams::default()
        };
        let result = max_clique(&g, &below);
        assert_eq!(result.size, omega);
        assert_eq!(result.members.len(), omega);
    }

    #[test]
    fn stop_after_finding_returns_early() {
        let mut rng = XorShiftRng::seed_from_u64(0x570);
        let g = random_graph(&mut rng, 18, 0.7);
        let omega = brute_omega(&g);
        assert!(omega >= 3, "test graph too sparse");

        let params = MaxCliqueParams {
            stop_after_finding: 3,
            ..MaxCliqueParams::default()
        };
        let result = max_clique(&g, &params);
        assert!(result.size >= 3);
        assert_is_clique(&g, &result.members);

        let full = max_clique(&g, &MaxCliqueParams::default());
        assert!(result.nodes <= full.nodes);
    }

    #[test]
    fn preset_abort_flag_returns_aborted() {
        let g = petersen();
        let params = MaxCliqueParams {
            abort: Arc::new(AtomicBool::new(true)),
            ..MaxCliqueParams::default()
        };
        let result = max_clique(&g, &params);
        assert!(result.aborted);
        assert!(result.members.is_empty());
    }

    #[test]
    fn oversized_graph_reports_too_large() {
        let g = Graph::new(5000, false);
        let result = max_clique(&g, &MaxCliqueParams::default());
        assert_eq!(result.size, 0);
        assert!(result.members.is_empty());
        assert_eq!(result.nodes, 0);
        assert!(!result.aborted);
    }

    #[test]
    fn empty_and_singleton_graphs() {
        let empty = Graph::new(0, false);
        let result = max_clique(&empty, &MaxCliqueParams::default());
        assert_eq!(result.size, 0);

        let single = Graph::new(1, false);
        let result = max_clique(&single, &MaxCliqueParams::default());
        assert_eq!(result.size, 1);
        assert_eq!(result.members, vec![0]);
    }

    #[test]
    fn parallel_engine_finds_the_same_size() {
        let mut rng = XorShiftRng::seed_from_u64(0x9A7);
        for _case in 0..6 {
            let n = rng.random_range(10..18);
            let g = random_graph(&mut rng, n, 0.6);
            let serial = max_clique(&g, &MaxCliqueParams::default());
            let parallel = max_clique(
                &g,
                &MaxCliqueParams {
                    n_threads: 4,
                    ..MaxCliqueParams::default()
                },
            );
            assert_eq!(parallel.size, serial.size);
            assert_is_clique(&g, &parallel.members);
        }
    }

    #[test]
    fn incumbent_sink_sees_improvements() {
        use std::sync::Mutex as StdMutex;
        let seen: Arc<StdMutex<Vec<(usize, Vec<usize>)>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_in_sink = Arc::clone(&seen);
        let g = Graph::from_edges(4, false, [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)])
            .unwrap();
        let params = MaxCliqueParams {
            print_incumbents: true,
            incumbent_sink: Some(Arc::new(move |_ms, size, members| {
                seen_in_sink.lock().unwrap().push((size, members.to_vec()));
            })),
            ..MaxCliqueParams::default()
        };
        let result = max_clique(&g, &params);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().map(|(s, _)| *s), Some(result.size));
        // sizes strictly increase
        for pair in seen.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }
}
