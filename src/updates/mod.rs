//! Unresolved-updates tree: builder, expansion state, and flattening.

pub mod expansion;
pub mod flatten;
pub mod tree;
