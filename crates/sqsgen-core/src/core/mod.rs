//! # Core Module
//!
//! Pure computational building blocks of the SQS search. Everything in this
//! module is a total function over valid inputs: no shared state, no I/O, no
//! locking. The [`engine`](crate::engine) layer composes these primitives
//! into the parallel search.
//!
//! - **Permutation Ranking** ([`rank`]) - Lexicographic bijection between
//!   multiset permutations and arbitrary-precision integers
//! - **Pair Kernel** ([`kernel`]) - Bond counting over a flattened neighbor
//!   list and the weighted absolute-deviation objective
//! - **Weight Reduction** ([`reduction`]) - Packing of the symmetric
//!   species-pair tensors into the upper-triangular flat layout the kernel
//!   consumes

pub mod kernel;
pub mod rank;
pub mod reduction;
