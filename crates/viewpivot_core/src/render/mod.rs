//! Renderer contract and the per-view renderer registry.

pub mod registry;
pub mod renderer;
