//! # omega
//!
//! Exact, bit-parallel solvers for three NP-hard graph problems on
//! small-to-moderate dense graphs: maximum clique, subgraph isomorphism
//! (non-induced and induced), and maximum common subgraph (reduced to
//! maximum clique on a modular product).
//!
//! This crate provides:
//! - A fixed-width bitset ([`bitset::FixedBitSet`]) whose word count is a
//!   const generic, and an adjacency bitmatrix ([`bitgraph::BitGraph`])
//!   built on it, so every inner loop compiles against a known word count.
//! - A family of colour-class orderings ([`cco::CcoPermutations`]) used as
//!   cheap, tight clique bounds inside the branch-and-bound.
//! - A domain-propagation subgraph isomorphism engine with supplemental
//!   path filters, Hall-counting and Régin-style all-different propagation,
//!   and conflict-directed backjumping.
//!
//! ## Quick start
//!
//! ```
//! use omega::prelude::*;
//!
//! // a 4-cycle plus one chord has a triangle
//! let graph = Graph::from_edges(4, false, [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]).unwrap();
//! let result = max_clique(&graph, &MaxCliqueParams::default());
//! assert_eq!(result.size, 3);
//!
//! // and the triangle embeds into it
//! let triangle = Graph::from_edges(3, false, [(0, 1), (1, 2), (2, 0)]).unwrap();
//! let mapping = subgraph_isomorphism(&triangle, &graph, &SubgraphIsomorphismParams::default());
//! assert_eq!(mapping.isomorphism.len(), 3);
//! ```
//!
//! ## Sizes
//!
//! Kernels are instantiated for word counts 1, 2, 4, 8, 16, 32 and 64,
//! giving a maximum order of 4096 vertices (see [`dispatch`]); larger
//! inputs return well-formed "too large" results rather than failing.
//!
//! ## Concurrency
//!
//! Solves are single-threaded and deterministic by default. Setting
//! `n_threads > 1` on [`params::MaxCliqueParams`] distributes the root of
//! the clique search over a thread pool sharing one incumbent and one
//! atomic abort flag; the found size is unchanged but node counts and
//! tie-broken witnesses may vary between runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::inline_always)] // intentional for hot-path code
#![allow(clippy::many_single_char_names)] // mathematical variable names
#![allow(clippy::needless_range_loop)] // often clearer for matrix indexing

pub mod bitgraph;
pub mod bitset;
pub mod cco;
pub mod clique;
pub mod dispatch;
pub mod graph;
pub mod mcs;
pub mod order;
pub mod params;
pub mod product;
pub mod sgi;

mod alldiff;

/// Re-exports of the commonly used types and entry points.
pub mod prelude {
    pub use crate::cco::CcoPermutations;
    pub use crate::clique::max_clique;
    pub use crate::graph::{Graph, GraphError};
    pub use crate::mcs::max_common_subgraph;
    pub use crate::order::VertexOrder;
    pub use crate::params::{
        stdout_incumbent_sink, MaxCliqueParams, MaxCliqueResult, MaxCommonSubgraphParams,
        MaxCommonSubgraphResult, SubgraphIsomorphismParams, SubgraphIsomorphismResult,
        SupplementalFilters,
    };
    pub use crate::product::{modular_product, subgraph_modular_product, unproduct};
    pub use crate::sgi::subgraph_isomorphism;
}
