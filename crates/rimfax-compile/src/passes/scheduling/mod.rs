//! Timing-aware scheduling passes.
//!
//! Both passes consume an externally produced schedule (per-node start times
//! and a total circuit duration) from the [`PropertySet`] and rebuild the
//! graph rather than mutating it in place.
//!
//! [`PropertySet`]: crate::property::PropertySet

pub mod combine_delays;
pub mod dynamical_decoupling;

pub use combine_delays::{CombineAdjacentDelays, MIN_JOINABLE_DELAY_DURATION};
pub use dynamical_decoupling::DynamicalDecoupling;
