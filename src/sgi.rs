//! Domain-based propagate-and-branch search for subgraph isomorphism.
//!
//! The pattern and target are recoded into bit graphs together with a set of
//! supplemental filter graphs (path multiplicities, and in induced mode the
//! complement and its compositions). Every pattern vertex carries a domain
//! of candidate target vertices; assignment propagates through all filter
//! graphs at once, with optional all-different propagation and
//! conflict-directed backjumping on top.

use std::marker::PhantomData;
use std::sync::atomic::Ordering;

use crate::alldiff::{cheap_all_different, regin_all_different, Domain};
use crate::bitgraph::BitGraph;
use crate::bitset::FixedBitSet;
use crate::dispatch::dispatch_words;
use crate::graph::Graph;
use crate::order::VertexOrder;
use crate::params::{SubgraphIsomorphismParams, SubgraphIsomorphismResult};

/// Finds a subgraph isomorphism from `pattern` into `target`.
///
/// The result carries the witness mapping in original vertex ids when
/// satisfiable. Patterns larger than the target, and inputs beyond
/// [`crate::dispatch::MAX_VERTICES`], yield the empty result with zero
/// nodes.
pub fn subgraph_isomorphism(
    pattern: &Graph,
    target: &Graph,
    params: &SubgraphIsomorphismParams,
) -> SubgraphIsomorphismResult {
    if pattern.size() > target.size() {
        return SubgraphIsomorphismResult::default();
    }
    dispatch_words!(
        target.size(),
        solve,
        (pattern, target, params),
        SubgraphIsomorphismResult::default(),
    )
}

fn solve<const W: usize>(
    pattern: &Graph,
    target: &Graph,
    params: &SubgraphIsomorphismParams,
) -> SubgraphIsomorphismResult {
    if params.backjumping {
        Sgi::<W, Backjumping<W>>::new(pattern, target, params).run()
    } else {
        Sgi::<W, NoBackjumping>::new(pattern, target, params).run()
    }
}

// ============================================================================
// Failed-variable policies
// ============================================================================

/// The set of pattern variables blamed for a subtree's failure.
///
/// With backjumping disabled this is a zero-sized no-op whose
/// `independent_of` never fires; with backjumping enabled it is a bitset
/// over pattern vertices.
pub(crate) trait FailedVariables<const W: usize> {
    fn new() -> Self;
    fn add_var(&mut self, v: usize);
    fn add_set(&mut self, other: &Self);
    /// Whether every blamed variable has the same domain before and after
    /// the branch (domains only shrink, so equal popcounts mean equal
    /// domains). If so, the remaining sibling values cannot repair the
    /// failure and the caller may propagate it without trying them.
    fn independent_of(&self, old: &[Domain<W>], new: &[Domain<W>]) -> bool;
}

pub(crate) struct NoBackjumping;

impl<const W: usize> FailedVariables<W> for NoBackjumping {
    fn new() -> Self {
        NoBackjumping
    }
    fn add_var(&mut self, _v: usize) {}
    fn add_set(&mut self, _other: &Self) {}
    fn independent_of(&self, _old: &[Domain<W>], _new: &[Domain<W>]) -> bool {
        false
    }
}

pub(crate) struct Backjumping<const W: usize> {
    variables: FixedBitSet<W>,
}

impl<const W: usize> FailedVariables<W> for Backjumping<W> {
    fn new() -> Self {
        Backjumping {
            variables: FixedBitSet::new(),
        }
    }

    fn add_var(&mut self, v: usize) {
        self.variables.set(v);
    }

    fn add_set(&mut self, other: &Self) {
        self.variables.union_with(&other.variables);
    }

    fn independent_of(&self, old: &[Domain<W>], new: &[Domain<W>]) -> bool {
        for v in self.variables.iter() {
            let old_pc = old
                .iter()
                .find(|d| d.v == v)
                .map_or(1, |d| d.popcount);
            let new_pc = new
                .iter()
                .find(|d| d.v == v)
                .map_or(1, |d| d.popcount);
            if old_pc != new_pc {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Filter graphs
// ============================================================================

/// Builds the filter graph list for one side: the base adjacency, the
/// `>= c` path-multiplicity graphs for lengths `2..=l`, and in induced mode
/// the complement plus its two composed families. Pattern and target go
/// through this identically, so a filter edge in the pattern always demands
/// the corresponding filter edge in the target.
fn build_filter_graphs<const W: usize>(
    base: &BitGraph<W>,
    induced: bool,
    k: usize,
    l: usize,
) -> Vec<BitGraph<W>> {
    let n = base.size();
    let mut graphs = vec![base.clone()];

    let empty = |_: usize| {
        let mut g = BitGraph::<W>::new();
        g.resize(n);
        g
    };

    if l >= 2 {
        // walks of length two: common neighbour multiplicities
        let mut path2: Vec<BitGraph<W>> = (0..k).map(empty).collect();
        for u in 0..n {
            for v in u..n {
                let mut common = *base.row(u);
                common.intersect_with(base.row(v));
                let c = common.popcount();
                for (idx, g) in path2.iter_mut().enumerate() {
                    if c > idx {
                        g.add_edge(u, v);
                    }
                }
            }
        }
        graphs.append(&mut path2);
    }

    if l >= 3 {
        // walks of length three
        let mut path3: Vec<BitGraph<W>> = (0..k).map(empty).collect();
        for u in 0..n {
            for v in u..n {
                let mut c = 0usize;
                for x in base.row(u).iter() {
                    let mut step = *base.row(x);
                    step.intersect_with(base.row(v));
                    c += step.popcount();
                }
                for (idx, g) in path3.iter_mut().enumerate() {
                    if c > idx {
                        g.add_edge(u, v);
                    }
                }
            }
        }
        graphs.append(&mut path3);
    }

    if induced {
        let comp = base.complement();

        if l >= 2 {
            // compositions: complement two-steps, and mixed two-steps with
            // one adjacency hop and one complement hop (summed so the count
            // stays symmetric)
            let mut comp2: Vec<BitGraph<W>> = (0..k).map(empty).collect();
            let mut mixed: Vec<BitGraph<W>> = (0..k).map(empty).collect();
            for u in 0..n {
                for v in u..n {
                    let mut cc = *comp.row(u);
                    cc.intersect_with(comp.row(v));
                    let comp_count = cc.popcount();

                    let mut ac = *base.row(u);
                    ac.intersect_with(comp.row(v));
                    let mut ca = *comp.row(u);
                    ca.intersect_with(base.row(v));
                    let mixed_count = ac.popcount() + ca.popcount();

                    for idx in 0..k {
                        if comp_count > idx {
                            comp2[idx].add_edge(u, v);
                        }
                        if mixed_count > idx {
                            mixed[idx].add_edge(u, v);
                        }
                    }
                }
            }
            graphs.append(&mut comp2);
            graphs.append(&mut mixed);
        }

        graphs.push(comp);
    }

    graphs
}

// ============================================================================
// Engine
// ============================================================================

enum SearchResult {
    Aborted,
    Unsatisfiable,
    Satisfiable,
}

struct Sgi<'a, const W: usize, F: FailedVariables<W>> {
    params: &'a SubgraphIsomorphismParams,
    pattern_graphs: Vec<BitGraph<W>>,
    target_graphs: Vec<BitGraph<W>>,
    pattern_order: Vec<usize>,
    target_order: Vec<usize>,
    isolated: Vec<usize>,
    degree_tiebreak: Vec<usize>,
    pattern_size: usize,
    full_pattern_size: usize,
    target_size: usize,
    nodes: u64,
    _failed: PhantomData<F>,
}

impl<'a, const W: usize, F: FailedVariables<W>> Sgi<'a, W, F> {
    fn new(pattern: &Graph, target: &Graph, params: &'a SubgraphIsomorphismParams) -> Self {
        let full_pattern_size = pattern.size();
        let target_size = target.size();

        // isolated pattern vertices cannot constrain anything in non-induced
        // mode; strip them and re-attach during witness reconstruction
        let mut pattern_order = Vec::with_capacity(full_pattern_size);
        let mut isolated = Vec::new();
        for v in 0..full_pattern_size {
            if !params.induced && pattern.degree(v) == 0 {
                isolated.push(v);
            } else {
                pattern_order.push(v);
            }
        }
        let pattern_size = pattern_order.len();

        let pattern_base = BitGraph::<W>::from_graph(pattern, &pattern_order);

        // more connected targets get lower bitmask indices
        let target_order = VertexOrder::Degree.permutation(target);
        let target_base = BitGraph::<W>::from_graph(target, &target_order);

        let (k, l) = params.filters.depth();
        let pattern_graphs = build_filter_graphs(&pattern_base, params.induced, k, l);
        let target_graphs = build_filter_graphs(&target_base, params.induced, k, l);

        let degree_tiebreak: Vec<usize> =
            (0..pattern_size).map(|v| pattern_graphs[0].degree(v)).collect();

        Sgi {
            params,
            pattern_graphs,
            target_graphs,
            pattern_order,
            target_order,
            isolated,
            degree_tiebreak,
            pattern_size,
            full_pattern_size,
            target_size,
            nodes: 0,
            _failed: PhantomData,
        }
    }

    fn run(mut self) -> SubgraphIsomorphismResult {
        let mut result = SubgraphIsomorphismResult::default();

        if self.params.abort.load(Ordering::Relaxed) {
            result.aborted = true;
            return result;
        }

        let mut domains: Vec<Domain<W>> = (0..self.pattern_size)
            .map(|v| Domain {
                v,
                popcount: 0,
                values: FixedBitSet::new(),
            })
            .collect();

        if !self.initialise_domains(&mut domains) {
            return result;
        }
        if !cheap_all_different(&mut domains, &self.degree_tiebreak, |_| {}) {
            return result;
        }
        if self.params.full_all_different && !regin_all_different(&mut domains, self.target_size) {
            return result;
        }
        for d in &mut domains {
            d.popcount = d.values.popcount();
        }

        let mut assignments: Vec<Option<usize>> = vec![None; self.pattern_size];
        let (outcome, _) = self.search(&mut assignments, &domains);
        result.nodes = self.nodes;
        match outcome {
            SearchResult::Satisfiable => self.save_result(&assignments, &mut result),
            SearchResult::Unsatisfiable => {}
            SearchResult::Aborted => result.aborted = true,
        }
        result
    }

    /// Fixpoint domain initialisation over the shrinking allowed target set.
    fn initialise_domains(&self, domains: &mut [Domain<W>]) -> bool {
        let g_count = self.pattern_graphs.len();
        let g1_count = if self.params.double_filter { g_count } else { 1 };

        let mut allowed = FixedBitSet::<W>::new();
        allowed.set_up_to(self.target_size);
        let mut remaining_targets = self.target_size;

        loop {
            let pattern_degrees: Vec<Vec<usize>> = (0..g_count)
                .map(|g| {
                    (0..self.pattern_size)
                        .map(|i| self.pattern_graphs[g].degree(i))
                        .collect()
                })
                .collect();
            let target_degrees: Vec<Vec<usize>> = (0..g_count)
                .map(|g| {
                    (0..self.target_size)
                        .map(|i| {
                            let mut row = allowed;
                            self.target_graphs[g].intersect_with_row(i, &mut row);
                            row.popcount()
                        })
                        .collect()
                })
                .collect();

            // neighbourhood degree sequences, sorted descending
            let patterns_nds: Vec<Vec<Vec<Vec<usize>>>> = (0..g1_count)
                .map(|g1| {
                    (0..g_count)
                        .map(|g2| {
                            (0..self.pattern_size)
                                .map(|i| {
                                    let mut nds: Vec<usize> = (0..self.pattern_size)
                                        .filter(|&j| self.pattern_graphs[g1].adjacent(i, j))
                                        .map(|j| pattern_degrees[g2][j])
                                        .collect();
                                    nds.sort_unstable_by(|a, b| b.cmp(a));
                                    nds
                                })
                                .collect()
                        })
                        .collect()
                })
                .collect();
            let targets_nds: Vec<Vec<Vec<Vec<usize>>>> = (0..g1_count)
                .map(|g1| {
                    (0..g_count)
                        .map(|g2| {
                            (0..self.target_size)
                                .map(|i| {
                                    let mut nds: Vec<usize> = (0..self.target_size)
                                        .filter(|&j| self.target_graphs[g1].adjacent(i, j))
                                        .map(|j| target_degrees[g2][j])
                                        .collect();
                                    nds.sort_unstable_by(|a, b| b.cmp(a));
                                    nds
                                })
                                .collect()
                        })
                        .collect()
                })
                .collect();

            for i in 0..self.pattern_size {
                domains[i].v = i;
                domains[i].values.unset_all();

                'target: for j in 0..self.target_size {
                    if !allowed.test(j) {
                        continue;
                    }
                    // loops in any filter graph must be matched by loops
                    for g in 0..g_count {
                        if self.pattern_graphs[g].adjacent(i, i)
                            && !self.target_graphs[g].adjacent(j, j)
                        {
                            continue 'target;
                        }
                    }
                    // the target must dominate every neighbourhood degree
                    // sequence of the pattern, in length and pointwise
                    for g1 in 0..g1_count {
                        for g2 in 0..g_count {
                            let p_nds = &patterns_nds[g1][g2][i];
                            let t_nds = &targets_nds[g1][g2][j];
                            if t_nds.len() < p_nds.len() {
                                continue 'target;
                            }
                            for (x, &pd) in p_nds.iter().enumerate() {
                                if t_nds[x] < pd {
                                    continue 'target;
                                }
                            }
                        }
                    }
                    domains[i].values.set(j);
                }

                domains[i].popcount = domains[i].values.popcount();
            }

            let mut union = FixedBitSet::<W>::new();
            for d in domains.iter() {
                union.union_with(&d.values);
            }
            let union_count = union.popcount();

            if union_count < self.pattern_size {
                return false;
            } else if union_count == remaining_targets {
                return true;
            }

            // some targets fell out of every domain; restrict and go again
            allowed.intersect_with(&union);
            remaining_targets = allowed.popcount();
        }
    }

    fn select_branch_domain(&self, domains: &[Domain<W>]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, d) in domains.iter().enumerate() {
            let better = match best {
                None => true,
                Some(b) => {
                    let e = &domains[b];
                    d.popcount < e.popcount
                        || (d.popcount == e.popcount
                            && if self.params.dom_plus_deg {
                                self.degree_tiebreak[d.v] > self.degree_tiebreak[e.v]
                            } else {
                                d.v < e.v
                            })
                }
            };
            if better {
                best = Some(idx);
            }
        }
        best
    }

    /// Propagates `branch_v <- f_v` into `new_domains`.
    fn assign(
        &self,
        new_domains: &mut [Domain<W>],
        branch_v: usize,
        f_v: usize,
        failed: &mut F,
    ) -> bool {
        for d in new_domains.iter_mut() {
            // all-different on the assigned value
            d.values.unset(f_v);

            // adjacency in any filter graph restricts to that graph's row
            for g in 0..self.pattern_graphs.len() {
                if self.pattern_graphs[g].adjacent(branch_v, d.v) {
                    self.target_graphs[g].intersect_with_row(f_v, &mut d.values);
                }
            }

            d.popcount = d.values.popcount();
            if d.popcount == 0 {
                failed.add_var(d.v);
                return false;
            }
        }

        if self.params.cheap_all_different {
            let mut ad_failed = F::new();
            if !cheap_all_different(new_domains, &self.degree_tiebreak, |v| ad_failed.add_var(v)) {
                failed.add_set(&ad_failed);
                return false;
            }
        }

        if self.params.full_all_different && !regin_all_different(new_domains, self.target_size) {
            for d in new_domains.iter() {
                failed.add_var(d.v);
            }
            return false;
        }

        true
    }

    fn search(
        &mut self,
        assignments: &mut [Option<usize>],
        domains: &[Domain<W>],
    ) -> (SearchResult, F) {
        if self.params.abort.load(Ordering::Relaxed) {
            return (SearchResult::Aborted, F::new());
        }
        self.nodes += 1;

        let branch = match self.select_branch_domain(domains) {
            Some(idx) => idx,
            None => return (SearchResult::Satisfiable, F::new()),
        };
        let branch_v = domains[branch].v;
        let mut remaining = domains[branch].values;

        let mut shared_failed = F::new();
        shared_failed.add_var(branch_v);

        while let Some(f_v) = remaining.first_set_bit() {
            remaining.unset(f_v);
            assignments[branch_v] = Some(f_v);

            let mut new_domains: Vec<Domain<W>> = Vec::with_capacity(domains.len() - 1);
            for d in domains {
                if d.v != branch_v {
                    new_domains.push(*d);
                }
            }

            if !self.assign(&mut new_domains, branch_v, f_v, &mut shared_failed) {
                continue;
            }

            let (outcome, child_failed) = self.search(assignments, &new_domains);
            match outcome {
                SearchResult::Satisfiable => return (SearchResult::Satisfiable, F::new()),
                SearchResult::Aborted => return (SearchResult::Aborted, F::new()),
                SearchResult::Unsatisfiable => {}
            }

            // if the child's failure does not depend on this branching
            // choice, no sibling value can fix it either
            if child_failed.independent_of(domains, &new_domains) {
                return (SearchResult::Unsatisfiable, child_failed);
            }
            shared_failed.add_set(&child_failed);
        }

        (SearchResult::Unsatisfiable, shared_failed)
    }

    fn save_result(&self, assignments: &[Option<usize>], result: &mut SubgraphIsomorphismResult) {
        let mut iso: Vec<(usize, usize)> = Vec::with_capacity(self.full_pattern_size);
        for v in 0..self.pattern_size {
            if let Some(f) = assignments[v] {
                iso.push((self.pattern_order[v], self.target_order[f]));
            } else {
                debug_assert!(false, "satisfiable search left a variable unassigned");
            }
        }

        // isolated pattern vertices take the lowest target ids still free
        let mut used: Vec<usize> = iso.iter().map(|&(_, t)| t).collect();
        let mut t = 0usize;
        for &v in &self.isolated {
            while used.contains(&t) {
                t += 1;
            }
            iso.push((v, t));
            used.push(t);
        }

        iso.sort_unstable();
        result.isomorphism = iso;
    }
}

// ============================================================================
// Tests
// ============================================================================
