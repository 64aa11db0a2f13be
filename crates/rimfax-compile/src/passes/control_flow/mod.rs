//! Control-flow flattening passes.
//!
//! These passes rewrite compound control-flow nodes into plain graph
//! structure: [`UnrollLoops`] stamps out statically-bounded for-loops, and
//! [`ExpandControlFlow`] splices whatever remains into marker-delimited
//! regions.

pub mod expand;
pub mod unroll;

pub use expand::ExpandControlFlow;
pub use unroll::UnrollLoops;
