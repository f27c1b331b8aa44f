//! Sweep orchestration
//!
//! This module provides:
//! - **orchestrator**: full reconciliation passes over a sync scope, parents
//!   before children, with a reverse check for destination-only entities
//! - **guard**: the one-sweep-at-a-time guard and cooperative cancellation
//! - **report**: per-sweep tallies and failures

mod guard;
mod orchestrator;
mod report;

pub use guard::{CancellationFlag, SweepGuard};
pub use orchestrator::{
    DestinationEvent, EventDisposition, EventKind, SweepOptions, SweepOrchestrator, SweepSettings,
};
pub use report::{SweepFailure, SweepReport};
