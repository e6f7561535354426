//! creg-decision
//!
//! Decision policy and submission lifecycle.
//!
//! - [`decide`] / [`decide_report`]: signals in, [`Decision`] out.
//! - [`next_status`] / [`Lifecycle`]: legal status transitions; anything else
//!   is a [`TransitionError`].
//!
//! Deterministic, pure logic. No IO.

mod lifecycle;
mod policy;

pub use creg_schemas::Decision;
pub use lifecycle::{next_status, Lifecycle, StageEvent, TransitionError};
pub use policy::{decide, decide_report, HARD_CATEGORIES, SOFT_CATEGORIES};
