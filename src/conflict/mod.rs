//! Conflict graph builder.
//!
//! Derives, for every pair of modules, whether scheduling them in the same
//! slot is forbidden (shared students) or discouraged (same professor), and
//! the per-module degree and size the allocator orders by.

mod graph;

pub use graph::{ConflictEdge, ConflictGraph, ConflictKind};
