//! Adjacency bitmatrix over [`FixedBitSet`] rows.
//!
//! A `BitGraph<W>` stores one row per vertex; row `i` restricted to columns
//! `[0, n)` encodes the neighbourhood of `i`. The engines rebuild one of
//! these per solve, after choosing a vertex permutation, so that their inner
//! loops run on word-parallel row operations.

use crate::bitset::FixedBitSet;
use crate::graph::Graph;

/// A square adjacency bitmatrix on at most `W * 64` vertices.
///
/// Undirected edges are stored in both rows; loops are permitted at this
/// layer (the front-door [`Graph`] enforces the loop policy). A handful of
/// filter graphs built by the subgraph isomorphism engine are directed, in
/// which case only [`set_adjacent`](Self::set_adjacent) is used and row `i`
/// encodes the out-neighbourhood of `i`.
#[derive(Clone, Debug, Default)]
pub struct BitGraph<const W: usize> {
    size: usize,
    rows: Vec<FixedBitSet<W>>,
}

impl<const W: usize> BitGraph<W> {
    /// Creates an empty graph of order 0.
    pub fn new() -> Self {
        Self {
            size: 0,
            rows: Vec::new(),
        }
    }

    /// Resizes to `n` vertices with no edges.
    pub fn resize(&mut self, n: usize) {
        debug_assert!(n <= FixedBitSet::<W>::capacity());
        self.size = n;
        self.rows.clear();
        self.rows.resize(n, FixedBitSet::new());
    }

    /// Number of vertices.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Adds the undirected edge `(i, j)`, both directions.
    #[inline]
    pub fn add_edge(&mut self, i: usize, j: usize) {
        debug_assert!(i < self.size && j < self.size);
        self.rows[i].set(j);
        self.rows[j].set(i);
    }

    /// Sets the directed adjacency `i -> j` only.
    #[inline]
    pub fn set_adjacent(&mut self, i: usize, j: usize) {
        debug_assert!(i < self.size && j < self.size);
        self.rows[i].set(j);
    }

    /// Returns whether `j` is in row `i`.
    #[inline(always)]
    pub fn adjacent(&self, i: usize, j: usize) -> bool {
        debug_assert!(i < self.size && j < self.size);
        self.rows[i].test(j)
    }

    /// Number of set columns in row `i`.
    #[inline(always)]
    pub fn degree(&self, i: usize) -> usize {
        debug_assert!(i < self.size);
        self.rows[i].popcount()
    }

    /// Read access to row `i`.
    #[inline(always)]
    pub fn row(&self, i: usize) -> &FixedBitSet<W> {
        debug_assert!(i < self.size);
        &self.rows[i]
    }

    /// `q &= row(i)`.
    #[inline(always)]
    pub fn intersect_with_row(&self, i: usize, q: &mut FixedBitSet<W>) {
        debug_assert!(i < self.size);
        q.intersect_with(&self.rows[i]);
    }

    /// `q &= !row(i)`, over the columns `[0, n)`.
    ///
    /// Relies on `q` having no bits set at or beyond `n`, which every caller
    /// establishes with `set_up_to` and which intersections preserve.
    #[inline(always)]
    pub fn intersect_with_row_complement(&self, i: usize, q: &mut FixedBitSet<W>) {
        debug_assert!(i < self.size);
        q.intersect_with_complement(&self.rows[i]);
    }

    /// Builds the loop-free complement over the columns `[0, n)`.
    pub fn complement(&self) -> Self {
        let mut mask = FixedBitSet::<W>::new();
        mask.set_up_to(self.size);
        let mut out = Self::new();
        out.resize(self.size);
        for i in 0..self.size {
            let mut row = mask;
            row.intersect_with_complement(&self.rows[i]);
            row.unset(i);
            out.rows[i] = row;
        }
        out
    }

    /// Recodes `g` into a bit graph, relabelling vertex `order[i]` of `g` as
    /// vertex `i` here. Loops are carried over. `order` may be a strict
    /// subset of `g`'s vertices, in which case the result is the recoded
    /// subgraph induced on it.
    pub fn from_graph(g: &Graph, order: &[usize]) -> Self {
        let n = order.len();
        let mut out = Self::new();
        out.resize(n);
        for i in 0..n {
            for j in 0..n {
                if g.adjacent(order[i], order[j]) {
                    out.rows[i].set(j);
                }
            }
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
