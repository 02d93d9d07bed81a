//! Colour-class orderings used as clique bounds.
//!
//! Given a candidate set `P`, each variant fills two parallel arrays of
//! length `|P|`: `p_order` (a permutation of `P`'s set bits) and `p_bounds`
//! (a non-decreasing colour count). At position `i`, the clique extensible
//! from the already-chosen vertices plus the first `i + 1` entries of
//! `p_order` has at most `depth + p_bounds[i]` vertices, which is the prune
//! test the branch-and-bound applies while walking the arrays in reverse.

use std::cell::RefCell;

use crate::bitgraph::BitGraph;
use crate::bitset::FixedBitSet;

/// Which colour-class ordering the clique engine uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CcoPermutations {
    /// Greedy first-fit colouring, emitted class by class.
    None,
    /// As `None`, but colour classes of size one are held back and emitted
    /// last with fresh colours, so they are examined first when the engine
    /// walks the arrays in reverse.
    Defer1,
    /// First-fit with repair: before opening a colour class for a vertex,
    /// try to relocate the single conflicting vertex of an earlier class.
    RepairAll,
    /// `RepairAll` plus the `Defer1` singleton treatment.
    RepairAllDefer1,
    /// As `RepairAll`, but repair is only attempted once the number of
    /// colour classes has reached the engine-provided threshold.
    RepairSelected,
    /// `RepairSelected` plus the `Defer1` singleton treatment.
    RepairSelectedDefer1,
    /// Repair performed in place on the output arrays, no per-class buffers.
    RepairAllFast,
    /// `RepairAllFast` with the threshold of `RepairSelected`.
    RepairSelectedFast,
}

/// Const tags so the search kernels monomorphize per variant.
pub(crate) mod tags {
    pub const NONE: u8 = 0;
    pub const DEFER1: u8 = 1;
    pub const REPAIR_ALL: u8 = 2;
    pub const REPAIR_ALL_DEFER1: u8 = 3;
    pub const REPAIR_SELECTED: u8 = 4;
    pub const REPAIR_SELECTED_DEFER1: u8 = 5;
    pub const REPAIR_ALL_FAST: u8 = 6;
    pub const REPAIR_SELECTED_FAST: u8 = 7;
}

thread_local! {
    /// Per-class vertex buffers for the repair variants, reused across calls
    /// and resized on growth only.
    static REPAIR_CLASSES: RefCell<Vec<Vec<usize>>> = const { RefCell::new(Vec::new()) };
}

/// Fills `p_order`/`p_bounds` for the candidate set `p` and returns `|P|`.
///
/// `delta` is the class-count threshold consumed by the `RepairSelected*`
/// variants; the engine passes its current incumbent size. `INVERSE` grows
/// colour classes along neighbours instead of non-neighbours (so classes are
/// cliques rather than independent sets); only the `None` and `Defer1`
/// variants support it.
pub(crate) fn colour_class_order<const W: usize, const PERM: u8, const INVERSE: bool>(
    g: &BitGraph<W>,
    p: &FixedBitSet<W>,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
    delta: usize,
) -> usize {
    debug_assert!(!INVERSE || PERM == tags::NONE || PERM == tags::DEFER1);
    match PERM {
        tags::NONE => colour_greedy::<W, INVERSE, false>(g, p, p_order, p_bounds),
        tags::DEFER1 => colour_greedy::<W, INVERSE, true>(g, p, p_order, p_bounds),
        tags::REPAIR_ALL => colour_repair(g, p, p_order, p_bounds, 0, false, false),
        tags::REPAIR_ALL_DEFER1 => colour_repair(g, p, p_order, p_bounds, 0, false, true),
        tags::REPAIR_SELECTED => colour_repair(g, p, p_order, p_bounds, delta, true, false),
        tags::REPAIR_SELECTED_DEFER1 => colour_repair(g, p, p_order, p_bounds, delta, true, true),
        tags::REPAIR_ALL_FAST => colour_repair_fast(g, p, p_order, p_bounds, 0, false),
        tags::REPAIR_SELECTED_FAST => colour_repair_fast(g, p, p_order, p_bounds, delta, true),
        _ => unreachable!("unknown colour ordering tag"),
    }
}

/// Removes from `q` everything that may not share `v`'s colour class.
#[inline(always)]
fn restrict_class<const W: usize, const INVERSE: bool>(
    g: &BitGraph<W>,
    v: usize,
    q: &mut FixedBitSet<W>,
) {
    if INVERSE {
        g.intersect_with_row(v, q);
    } else {
        g.intersect_with_row_complement(v, q);
    }
}

fn colour_greedy<const W: usize, const INVERSE: bool, const DEFER1: bool>(
    g: &BitGraph<W>,
    p: &FixedBitSet<W>,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
) -> usize {
    let mut p_left = *p; // not coloured yet
    let mut colour = 0usize;
    let mut i = 0usize;
    let mut defer: Vec<usize> = Vec::new();

    while !p_left.empty() {
        colour += 1;
        // everything that can still be given this colour
        let mut q = p_left;
        let mut with_this_colour = 0usize;

        while let Some(v) = q.first_set_bit() {
            p_left.unset(v);
            q.unset(v);
            restrict_class::<W, INVERSE>(g, v, &mut q);
            p_bounds[i] = colour;
            p_order[i] = v;
            i += 1;
            with_this_colour += 1;
        }

        if DEFER1 && with_this_colour == 1 {
            i -= 1;
            colour -= 1;
            defer.push(p_order[i]);
        }
    }

    if DEFER1 {
        for &v in &defer {
            colour += 1;
            p_order[i] = v;
            p_bounds[i] = colour;
            i += 1;
        }
    }

    i
}

/// Bucket-based repair colouring.
///
/// Vertices are first-fit into explicit colour class buffers. When a vertex
/// would open a new class, earlier classes are searched for one with exactly
/// one conflicting member that can itself move to a later class; if found,
/// the conflicting member is relocated and the vertex takes the vacated
/// class. Lowest-index vertices go first and the first feasible move is
/// accepted, so the result is deterministic.
fn colour_repair<const W: usize>(
    g: &BitGraph<W>,
    p: &FixedBitSet<W>,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
    delta: usize,
    selective: bool,
    defer: bool,
) -> usize {
    REPAIR_CLASSES.with(|scratch| {
        let classes = &mut *scratch.borrow_mut();
        let mut classes_end = 0usize;
        let mut p_left = *p;

        while let Some(v) = p_left.first_set_bit() {
            p_left.unset(v);

            let mut coloured = false;
            for cc in 0..classes_end {
                if !classes[cc].iter().any(|&w| g.adjacent(v, w)) {
                    classes[cc].push(v);
                    coloured = true;
                    break;
                }
            }

            if !coloured {
                let mut repaired = false;

                if !selective || classes_end >= delta {
                    'repair: for cc in 0..classes_end.saturating_sub(1) {
                        let mut n_conflicts = 0usize;
                        let mut move_pos = 0usize;
                        for (pos, &w) in classes[cc].iter().enumerate() {
                            if g.adjacent(v, w) {
                                move_pos = pos;
                                n_conflicts += 1;
                                if n_conflicts > 1 {
                                    break;
                                }
                            }
                        }

                        if n_conflicts == 1 {
                            let to_move = classes[cc][move_pos];
                            for nc in (cc + 1)..classes_end {
                                if !classes[nc].iter().any(|&w| g.adjacent(to_move, w)) {
                                    classes[nc].push(to_move);
                                    classes[cc].remove(move_pos);
                                    classes[cc].push(v);
                                    repaired = true;
                                    break 'repair;
                                }
                            }
                        }
                    }
                }

                if !repaired {
                    if classes.len() < classes_end + 1 {
                        classes.push(Vec::new());
                    }
                    classes[classes_end].clear();
                    classes[classes_end].push(v);
                    classes_end += 1;
                }
            }
        }

        let mut colour = 0usize;
        let mut i = 0usize;
        let mut deferred: Vec<usize> = Vec::new();
        for cc in 0..classes_end {
            if defer && classes[cc].len() == 1 {
                deferred.push(classes[cc][0]);
            } else {
                colour += 1;
                for &w in &classes[cc] {
                    p_bounds[i] = colour;
                    p_order[i] = w;
                    i += 1;
                }
            }
        }
        for &w in &deferred {
            colour += 1;
            p_order[i] = w;
            p_bounds[i] = colour;
            i += 1;
        }

        i
    })
}

/// In-place repair colouring operating directly on the output arrays.
///
/// Makes exactly the decisions of [`colour_repair`]: vertices first-fit
/// into the earliest compatible class, a vertex that would open a class
/// first tries to relocate the single conflicting member of an earlier
/// class, and the selective threshold counts built classes the same way.
/// The per-class buffers are replaced by splices into the filled prefix,
/// so the buffered and in-place variants produce identical orderings for
/// equal thresholds.
fn colour_repair_fast<const W: usize>(
    g: &BitGraph<W>,
    p: &FixedBitSet<W>,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
    delta: usize,
    selective: bool,
) -> usize {
    let mut p_left = *p;
    let mut colours = 0usize;
    let mut i = 0usize;

    while let Some(v) = p_left.first_set_bit() {
        p_left.unset(v);

        if try_direct_fit(g, v, p_order, p_bounds, &mut i) {
            continue;
        }
        if (!selective || colours >= delta) && try_repair(g, v, colours, p_order, p_bounds, &mut i)
        {
            continue;
        }

        colours += 1;
        p_order[i] = v;
        p_bounds[i] = colours;
        i += 1;
    }

    i
}

/// Inserts `v` with `colour` at `pos`, shifting the tail right.
fn insert_vertex(
    v: usize,
    colour: usize,
    pos: usize,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
    i: &mut usize,
) {
    for z in (pos..*i).rev() {
        p_order[z + 1] = p_order[z];
        p_bounds[z + 1] = p_bounds[z];
    }
    p_order[pos] = v;
    p_bounds[pos] = colour;
    *i += 1;
}

/// Splices `v` onto the end of the first class with no conflicting member.
fn try_direct_fit<const W: usize>(
    g: &BitGraph<W>,
    v: usize,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
    i: &mut usize,
) -> bool {
    let len = *i;
    let mut start = 0usize;
    while start < len {
        let colour = p_bounds[start];
        let mut end = start;
        let mut conflict = false;
        while end < len && p_bounds[end] == colour {
            if g.adjacent(v, p_order[end]) {
                conflict = true;
            }
            end += 1;
        }
        if !conflict {
            insert_vertex(v, colour, end, p_order, p_bounds, i);
            return true;
        }
        start = end;
    }
    false
}

/// Scans the classes before the last for one containing exactly one
/// neighbour of `v` that can itself move to any later class; relocates it
/// and splices `v` onto the end of the vacated class. The first feasible
/// move is accepted.
fn try_repair<const W: usize>(
    g: &BitGraph<W>,
    v: usize,
    colours: usize,
    p_order: &mut [usize],
    p_bounds: &mut [usize],
    i: &mut usize,
) -> bool {
    let len = *i;
    let mut start = 0usize;
    while start < len {
        let colour = p_bounds[start];
        if colour == colours {
            break; // the last class has no later class to move into
        }
        let mut end = start;
        let mut n_conflicts = 0usize;
        let mut move_pos = 0usize;
        while end < len && p_bounds[end] == colour {
            if g.adjacent(v, p_order[end]) {
                if n_conflicts == 0 {
                    move_pos = end;
                }
                n_conflicts += 1;
            }
            end += 1;
        }

        if n_conflicts == 1 {
            let to_move = p_order[move_pos];
            let mut t_start = end;
            while t_start < len {
                let t_colour = p_bounds[t_start];
                let mut t_end = t_start;
                let mut conflict = false;
                while t_end < len && p_bounds[t_end] == t_colour {
                    if g.adjacent(to_move, p_order[t_end]) {
                        conflict = true;
                    }
                    t_end += 1;
                }
                if !conflict {
                    // close the gap left by the moved vertex and append it
                    // to its new class
                    for z in move_pos..(t_end - 1) {
                        p_order[z] = p_order[z + 1];
                        p_bounds[z] = p_bounds[z + 1];
                    }
                    p_order[t_end - 1] = to_move;
                    p_bounds[t_end - 1] = t_colour;
                    // the donor class now ends one slot earlier; v goes there
                    insert_vertex(v, colour, end - 1, p_order, p_bounds, i);
                    return true;
                }
                t_start = t_end;
            }
        }

        start = end;
    }
    false
}

// ============================================================================
// Tests
// ============================================================================
