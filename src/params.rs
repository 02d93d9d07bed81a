//! Configuration surfaces and result records for the three solvers.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cco::CcoPermutations;
use crate::order::VertexOrder;

/// Callback invoked whenever the clique engine improves its incumbent, with
/// `(elapsed milliseconds, incumbent size, members in original labels)`.
///
/// The core serializes nothing itself; sinks shared between threads must
/// serialize their own output (see [`stdout_incumbent_sink`]).
pub type IncumbentSink = Arc<dyn Fn(u64, usize, &[usize]) + Send + Sync>;

/// Returns a sink that prints `-- <ms> found <size> at <members>` lines to
/// stdout, serialized behind a lock so concurrent workers cannot interleave.
pub fn stdout_incumbent_sink() -> IncumbentSink {
    static OUTPUT_LOCK: Mutex<()> = Mutex::new(());
    Arc::new(|elapsed_ms, size, members| {
        let _guard = OUTPUT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut line = format!("-- {elapsed_ms} found {size} at");
        for v in members {
            line.push(' ');
            line.push_str(&v.to_string());
        }
        println!("{line}");
    })
}

// ============================================================================
// Max clique
// ============================================================================

/// Parameters for the maximum clique engine.
#[derive(Clone)]
pub struct MaxCliqueParams {
    /// Override the initial size of the incumbent. A witness is reported
    /// only if the search finds a clique strictly larger than this.
    pub initial_bound: usize,
    /// Unwind as soon as the incumbent reaches this size; the result is then
    /// sound but not proven optimal.
    pub stop_after_finding: usize,
    /// Number of worker threads; 1 selects the deterministic serial engine.
    pub n_threads: usize,
    /// If true, report every incumbent improvement through the sink.
    pub print_incumbents: bool,
    /// Where incumbent reports go. `None` with `print_incumbents` set means
    /// improvements are silently dropped.
    pub incumbent_sink: Option<IncumbentSink>,
    /// Cooperative cancellation flag, polled at the top of every recursion.
    pub abort: Arc<AtomicBool>,
    /// Solve start, used to timestamp incumbent improvements.
    pub start_time: Instant,
    /// Initial vertex ordering.
    pub order: VertexOrder,
    /// Colour-class ordering variant used for the bound.
    pub permutations: CcoPermutations,
}

impl Default for MaxCliqueParams {
    fn default() -> Self {
        Self {
            initial_bound: 0,
            stop_after_finding: usize::MAX,
            n_threads: 1,
            print_incumbents: false,
            incumbent_sink: None,
            abort: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
            order: VertexOrder::Degree,
            permutations: CcoPermutations::Defer1,
        }
    }
}

/// Outcome of a maximum clique solve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaxCliqueResult {
    /// Size of the best clique found (at least `initial_bound`).
    pub size: usize,
    /// Members of the best clique found, in original labels, ascending.
    /// Empty if no clique larger than `initial_bound` was found.
    pub members: Vec<usize>,
    /// Number of search tree nodes expanded.
    pub nodes: u64,
    /// Elapsed time at each incumbent improvement.
    pub times: Vec<Duration>,
    /// Whether the solve was cut short by the abort flag.
    pub aborted: bool,
}

// ============================================================================
// Subgraph isomorphism
// ============================================================================

/// How many supplemental path-multiplicity filter graphs the subgraph
/// isomorphism engine materialises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupplementalFilters {
    /// Only the base adjacency (and, in induced mode, its complement).
    None,
    /// Two-step path multiplicities 1..=2.
    Distance2,
    /// Two- and three-step path multiplicities 1..=3.
    Distance3,
}

impl SupplementalFilters {
    /// The `(k, l)` pair: multiplicities `1..=k` of path lengths `2..=l`.
    pub(crate) fn depth(self) -> (usize, usize) {
        match self {
            SupplementalFilters::None => (1, 1),
            SupplementalFilters::Distance2 => (2, 2),
            SupplementalFilters::Distance3 => (3, 3),
        }
    }
}

/// Parameters for the subgraph isomorphism engine.
#[derive(Clone)]
pub struct SubgraphIsomorphismParams {
    /// Require non-edges of the pattern to map to non-edges of the target.
    pub induced: bool,
    /// Enable conflict-directed backjumping.
    pub backjumping: bool,
    /// Supplemental filter graph depth.
    pub filters: SupplementalFilters,
    /// Filter domains on neighbourhood degree sequences of every filter
    /// graph pair, not just pairs rooted at the base adjacency.
    pub double_filter: bool,
    /// Run the Hall-counting all-different propagator on every assignment.
    pub cheap_all_different: bool,
    /// Run the matching-based all-different propagator on every assignment.
    pub full_all_different: bool,
    /// Break branch-variable ties by higher pattern degree instead of lower
    /// pattern vertex id.
    pub dom_plus_deg: bool,
    /// Cooperative cancellation flag.
    pub abort: Arc<AtomicBool>,
    /// Solve start.
    pub start_time: Instant,
}

impl Default for SubgraphIsomorphismParams {
    fn default() -> Self {
        Self {
            induced: false,
            backjumping: true,
            filters: SupplementalFilters::Distance3,
            double_filter: false,
            cheap_all_different: true,
            full_all_different: false,
            dom_plus_deg: true,
            abort: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
        }
    }
}

/// Outcome of a subgraph isomorphism solve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubgraphIsomorphismResult {
    /// The witness mapping as `(pattern vertex, target vertex)` pairs sorted
    /// by pattern vertex; empty when unsatisfiable (or aborted).
    pub isomorphism: Vec<(usize, usize)>,
    /// Number of search tree nodes expanded.
    pub nodes: u64,
    /// Whether the solve was cut short by the abort flag.
    pub aborted: bool,
}

// ============================================================================
// Maximum common subgraph
// ============================================================================

/// Parameters for the maximum common subgraph driver.
#[derive(Clone, Default)]
pub struct MaxCommonSubgraphParams {
    /// Settings handed to the clique engine running on the product graph.
    pub clique: MaxCliqueParams,
    /// Solve the subgraph variant: the whole first graph must be covered,
    /// with its non-edges unconstrained.
    pub subgraph_isomorphism: bool,
}

/// Outcome of a maximum common subgraph solve.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaxCommonSubgraphResult {
    /// Number of vertex pairs in the best common subgraph found.
    pub size: usize,
    /// The witness as `(first graph vertex, second graph vertex)` pairs.
    pub isomorphism: Vec<(usize, usize)>,
    /// Number of clique search tree nodes expanded.
    pub nodes: u64,
    /// Elapsed time at each incumbent improvement.
    pub times: Vec<Duration>,
    /// Whether the solve was cut short by the abort flag.
    pub aborted: bool,
}
