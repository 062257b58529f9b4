//! Orchestration services.
//!
//! # Responsibility
//! - Expose the `Orchestrator` facade that owns a dataset's view state.
//! - Publish view change notifications to subscribers.

pub mod events;
pub mod orchestrator;
