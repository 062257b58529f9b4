//! Orchestration domain model.
//!
//! # Responsibility
//! - Define the `ViewState` aggregate shared by every projection.
//! - Define axis mappings, rows and on-screen geometry consumed by renderers.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId` across projections.
//! - Selection and filters are view-independent; per-view data lives in
//!   `ViewSpecificState`.

pub mod axis;
pub mod geometry;
pub mod row;
pub mod view_state;
