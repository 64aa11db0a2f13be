//! Built-in compilation passes.
//!
//! Passes are organized into two categories:
//! - [`control_flow`]: Structural passes that flatten compound loop/branch
//!   nodes into the plain DAG
//! - [`scheduling`]: Timing-aware passes that run on a scheduled, physical
//!   circuit

pub mod control_flow;
pub mod scheduling;

pub use control_flow::{ExpandControlFlow, UnrollLoops};
pub use scheduling::{CombineAdjacentDelays, DynamicalDecoupling, MIN_JOINABLE_DELAY_DURATION};
