//! All-different propagation over candidate-value domains.
//!
//! Two strengths are provided: a linear-time Hall-set counting pass, and
//! Régin's propagator (maximum matching, then removal of every value that
//! cannot take part in any maximum matching, identified through free-vertex
//! reachability and strongly connected components of the oriented value
//! graph).

use crate::bitset::FixedBitSet;

/// One pattern variable's candidate target values.
///
/// `popcount` caches `values.popcount()` and must be accurate whenever the
/// domain is handed to the search, the propagators, or branch selection;
/// whoever mutates `values` refreshes it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Domain<const W: usize> {
    /// Pattern vertex this domain belongs to.
    pub v: usize,
    /// Cached `values.popcount()`.
    pub popcount: usize,
    /// Candidate target vertices.
    pub values: FixedBitSet<W>,
}

// ============================================================================
// Hall-set counting
// ============================================================================

/// Cheap all-different: walks the domains smallest-first, accumulating the
/// union of their values. If ever fewer values than domains have been seen,
/// fails; when the counts tie, a Hall set has closed, and its values are
/// removed from every later domain.
///
/// `degree_tiebreak[v]` orders equal-popcount domains (higher first);
/// `inspected` is called for every domain examined, up to and including the
/// violating one, which is exactly the failed-set contract backjumping
/// needs.
pub(crate) fn cheap_all_different<const W: usize>(
    domains: &mut [Domain<W>],
    degree_tiebreak: &[usize],
    mut inspected: impl FnMut(usize),
) -> bool {
    let mut order: Vec<usize> = (0..domains.len()).collect();
    order.sort_by_key(|&a| {
        (
            domains[a].popcount,
            std::cmp::Reverse(degree_tiebreak[domains[a].v]),
            domains[a].v,
        )
    });

    let mut domains_so_far = FixedBitSet::<W>::new();
    let mut hall = FixedBitSet::<W>::new();
    let mut neighbours_so_far = 0usize;

    for &a in &order {
        let d = &mut domains[a];
        inspected(d.v);

        d.values.intersect_with_complement(&hall);
        d.popcount = d.values.popcount();
        if d.popcount == 0 {
            return false;
        }

        domains_so_far.union_with(&d.values);
        neighbours_so_far += 1;

        let so_far = domains_so_far.popcount();
        if so_far < neighbours_so_far {
            return false;
        } else if so_far == neighbours_so_far {
            // a Hall set has closed; later domains may not use its values
            neighbours_so_far = 0;
            hall.union_with(&domains_so_far);
            domains_so_far.unset_all();
        }
    }

    true
}

// ============================================================================
// Régin's propagator
// ============================================================================

/// Full all-different: fails iff no matching saturates the pattern side;
/// otherwise removes every value that is in no maximum matching and
/// refreshes the cached popcounts.
pub(crate) fn regin_all_different<const W: usize>(
    domains: &mut [Domain<W>],
    target_size: usize,
) -> bool {
    let n = domains.len();
    if n == 0 {
        return true;
    }
    // no value can be pruned when every domain has at least n values
    if domains.iter().all(|d| d.popcount >= n) {
        return true;
    }

    let mut pattern_match: Vec<Option<usize>> = vec![None; n];
    let mut target_match: Vec<Option<usize>> = vec![None; target_size];
    for i in 0..n {
        let mut visited = FixedBitSet::<W>::new();
        if !augment(i, domains, &mut pattern_match, &mut target_match, &mut visited) {
            return false;
        }
    }

    // candidate removals; edges proven usable are knocked out below
    let mut unused: Vec<FixedBitSet<W>> = domains.iter().map(|d| d.values).collect();

    // every edge reachable from an unmatched target vertex is usable
    let mut pending: Vec<usize> = (0..target_size)
        .filter(|&j| target_match[j].is_none())
        .map(|j| n + j)
        .collect();
    let mut seen = vec![false; n + target_size];
    while let Some(node) = pending.pop() {
        if seen[node] {
            continue;
        }
        seen[node] = true;
        if node < n {
            if let Some(j) = pattern_match[node] {
                unused[node].unset(j);
                pending.push(n + j);
            }
        } else {
            let j = node - n;
            for i in 0..n {
                if domains[i].values.test(j) && pattern_match[i] != Some(j) {
                    unused[i].unset(j);
                    pending.push(i);
                }
            }
        }
    }

    // every edge inside one strongly connected component is usable
    let component = strong_components(domains, &pattern_match, target_size);
    for i in 0..n {
        let candidates = unused[i];
        for j in candidates.iter() {
            if component[i] == component[n + j] {
                unused[i].unset(j);
            }
        }
    }

    for (i, d) in domains.iter_mut().enumerate() {
        for j in unused[i].iter() {
            if pattern_match[i] != Some(j) {
                d.values.unset(j);
            }
        }
        d.popcount = d.values.popcount();
    }

    true
}

fn augment<const W: usize>(
    i: usize,
    domains: &[Domain<W>],
    pattern_match: &mut [Option<usize>],
    target_match: &mut [Option<usize>],
    visited: &mut FixedBitSet<W>,
) -> bool {
    for j in domains[i].values.iter() {
        if visited.test(j) {
            continue;
        }
        visited.set(j);
        let free = match target_match[j] {
            None => true,
            Some(prev) => augment(prev, domains, pattern_match, target_match, visited),
        };
        if free {
            pattern_match[i] = Some(j);
            target_match[j] = Some(i);
            return true;
        }
    }
    false
}

/// Tarjan's algorithm over the oriented value graph: matched edges point
/// pattern to target, the rest point target to pattern.
fn strong_components<const W: usize>(
    domains: &[Domain<W>],
    pattern_match: &[Option<usize>],
    target_size: usize,
) -> Vec<usize> {
    let n = domains.len();
    let m = n + target_size;
    let mut state = TarjanState {
        index: vec![usize::MAX; m],
        lowlink: vec![0; m],
        on_stack: vec![false; m],
        stack: Vec::new(),
        counter: 0,
        component: vec![usize::MAX; m],
        components: 0,
    };
    for v in 0..m {
        if state.index[v] == usize::MAX {
            connect(v, domains, pattern_match, n, &mut state);
        }
    }
    state.component
}

struct TarjanState {
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    counter: usize,
    component: Vec<usize>,
    components: usize,
}

fn successors<const W: usize>(
    v: usize,
    domains: &[Domain<W>],
    pattern_match: &[Option<usize>],
    n: usize,
) -> Vec<usize> {
    if v < n {
        pattern_match[v].map(|j| n + j).into_iter().collect()
    } else {
        let j = v - n;
        (0..n)
            .filter(|&i| domains[i].values.test(j) && pattern_match[i] != Some(j))
            .collect()
    }
}

fn connect<const W: usize>(
    v: usize,
    domains: &[Domain<W>],
    pattern_match: &[Option<usize>],
    n: usize,
    state: &mut TarjanState,
) {
    state.index[v] = state.counter;
    state.lowlink[v] = state.counter;
    state.counter += 1;
    state.stack.push(v);
    state.on_stack[v] = true;

    for w in successors(v, domains, pattern_match, n) {
        if state.index[w] == usize::MAX {
            connect(w, domains, pattern_match, n, state);
            state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
        } else if state.on_stack[w] {
            state.lowlink[v] = state.lowlink[v].min(state.index[w]);
        }
    }

    if state.lowlink[v] == state.index[v] {
        loop {
            let w = match state.stack.pop() {
                Some(w) => w,
                None => break,
            };
            state.on_stack[w] = false;
            state.component[w] = state.components;
            if w == v {
                break;
            }
        }
        state.components += 1;
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

    fn domain<const W: usize>(v: usize, values: &[usize]) -> Domain<W> {
        let mut set = FixedBitSet::<W>::new();
        for &j in values {
            set.set(j);
        }
        Domain {
            v,
            popcount: set.popcount(),
            values: set,
        }
    }

    fn no_tiebreak(n: usize) -> Vec<usize> {
        vec![0; n]
    }

    #[test]
    fn cheap_detects_pigeonhole_failure() {
        let mut domains: Vec<Domain<1>> = vec![
            domain(0, &[0, 1]),
            domain(1, &[0, 1]),
            domain(2, &[0, 1]),
        ];
        let mut inspected = Vec::new();
        let ok = cheap_all_different(&mut domains, &no_tiebreak(3), |v| inspected.push(v));
        assert!(!ok);
        // the whole violating prefix is reported
        assert_eq!(inspected, vec![0, 1, 2]);
    }

    #[test]
    fn cheap_prunes_closed_hall_set() {
        let mut domains: Vec<Domain<1>> = vec![
            domain(0, &[0, 1]),
            domain(1, &[0, 1]),
            domain(2, &[0, 1, 2]),
        ];
        let ok = cheap_all_different(&mut domains, &no_tiebreak(3), |_| {});
        assert!(ok);
        let d2 = domains.iter().find(|d| d.v == 2).unwrap();
        assert_eq!(d2.values.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(d2.popcount, 1);
    }

    #[test]
    fn regin_detects_unsaturated_matching() {
        let mut domains: Vec<Domain<1>> = vec![
            domain(0, &[0, 1]),
            domain(1, &[0, 1]),
            domain(2, &[0, 1]),
        ];
        assert!(!regin_all_different(&mut domains, 3));
    }

    #[test]
    fn regin_removes_values_outside_every_maximum_matching() {
        // classic instance: with {0,1}, {0,1}, {0,1,2} the third variable
        // can only take 2 in a saturating matching
        let mut domains: Vec<Domain<1>> = vec![
            domain(0, &[0, 1]),
            domain(1, &[0, 1]),
            domain(2, &[0, 1, 2]),
        ];
        assert!(regin_all_different(&mut domains, 3));
        assert_eq!(domains[2].values.iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(domains[2].popcount, 1);
        // the tight pair keeps both options
        assert_eq!(domains[0].popcount, 2);
        assert_eq!(domains[1].popcount, 2);
    }

    #[test]
    fn regin_keeps_interchangeable_values() {
        // a 3-cycle of pairs: every value is in some perfect matching
        let mut domains: Vec<Domain<1>> = vec![
            domain(0, &[0, 1]),
            domain(1, &[1, 2]),
            domain(2, &[2, 0]),
        ];
        assert!(regin_all_different(&mut domains, 3));
        for d in &domains {
            assert_eq!(d.popcount, 2, "domain of {} lost a usable value", d.v);
        }
    }

    #[test]
    fn propagators_preserve_planted_solutions() {
        let mut rng = XorShiftRng::seed_from_u64(0xA11D1FF);
        for _case in 0..200 {
            let n = rng.random_range(1..12);
            let target_size = rng.random_range(n..16);

            // plant the identity assignment, then add noise values
            let mut base: Vec<Domain<1>> = (0..n)
                .map(|i| {
                    let mut values = vec![i];
                    for j in 0..target_size {
                        if rng.random_bool(0.3) {
                            values.push(j);
                        }
                    }
                    domain(i, &values)
                })
                .collect();
            let degrees: Vec<usize> = (0..n).map(|_| rng.random_range(0..5)).collect();

            let mut cheap = base.clone();
            assert!(
                cheap_all_different(&mut cheap, &degrees, |_| {}),
                "cheap ad failed a satisfiable instance"
            );
            for d in &cheap {
                assert!(d.values.test(d.v), "cheap ad removed the witness value");
                assert_eq!(d.popcount, d.values.popcount());
            }

            assert!(
                regin_all_different(&mut base, target_size),
                "regin failed a satisfiable instance"
            );
            for d in &base {
                assert!(d.values.test(d.v), "regin removed the witness value");
                assert_eq!(d.popcount, d.values.popcount());
            }
        }
    }

    #[test]
    fn regin_agrees_with_brute_force_on_small_instances() {
        let mut rng = XorShiftRng::seed_from_u64(0xBF0);
        for _case in 0..100 {
            let n = rng.random_range(1..6);
            let target_size = 6;
            let domains: Vec<Domain<1>> = (0..n)
                .map(|i| {
                    let values: Vec<usize> =
                        (0..target_size).filter(|_| rng.random_bool(0.4)).collect();
                    domain(i, &values)
                })
                .collect();

            let satisfiable = brute_force_satisfiable(&domains, target_size);
            let mut pruned = domains.clone();
            let ok = regin_all_different(&mut pruned, target_size);
            assert_eq!(ok, satisfiable, "regin verdict wrong");

            if ok {
                // every surviving value is in some saturating assignment,
                // and every such value survives
                for (i, d) in domains.iter().enumerate() {
                    for j in d.values.iter() {
                        let supported = value_in_some_solution(&domains, target_size, i, j);
                        assert_eq!(
                            pruned[i].values.test(j),
                            supported,
                            "variable {i} value {j}: support {supported}"
                        );
                    }
                }
            }
        }
    }

    fn brute_force_satisfiable<const W: usize>(domains: &[Domain<W>], target_size: usize) -> bool {
        fn go<const W: usize>(domains: &[Domain<W>], used: &mut Vec<bool>, i: usize) -> bool {
            if i == domains.len() {
                return true;
            }
            for j in domains[i].values.iter() {
                if !used[j] {
                    used[j] = true;
                    if go(domains, used, i + 1) {
                        used[j] = false;
                        return true;
                    }
                    used[j] = false;
                }
            }
            false
        }
        go(domains, &mut vec![false; target_size], 0)
    }

    fn value_in_some_solution<const W: usize>(
        domains: &[Domain<W>],
        target_size: usize,
        var: usize,
        value: usize,
    ) -> bool {
        let mut forced: Vec<Domain<W>> = domains.to_vec();
        let mut only = FixedBitSet::<W>::new();
        only.set(value);
        forced[var].values = only;
        forced[var].popcount = 1;
        brute_force_satisfiable(&forced, target_size)
    }
}
