//! Projection switch sequencing.

pub mod coordinator;
