//! Core of the view-projection orchestrator.
//!
//! One dataset is shown through interchangeable projections (grid, list,
//! board). This crate keeps the canonical view state, caches query results
//! across projections, animates switches and persists per-view state.

pub mod animation;
pub mod cache;
pub mod db;
pub mod logging;
pub mod model;
pub mod projection;
pub mod render;
pub mod repo;
pub mod service;
pub mod transition;

pub use animation::animator::{Animator, FrameAnimator, InstantAnimator, NullSink, TransformSink};
pub use animation::easing::Easing;
pub use cache::data_cache::{CacheStats, QueryEngine, QueryError};
pub use cache::fingerprint::Fingerprint;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::axis::{AxisBinding, AxisMapping, Dimension, Plane};
pub use model::geometry::{Rect, ScrollPosition, Transform};
pub use model::row::{EntityId, Row};
pub use model::view_state::{
    FilterOperator, FilterSpec, OrchestratorConfig, SelectionState, ViewState, ViewTrigger,
    ViewType,
};
pub use projection::config_builder::{build_projection_config, ProjectionConfig};
pub use render::registry::RegisterOutcome;
pub use render::renderer::{PositionMap, RenderError, Renderer};
pub use repo::kv_repo::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StoreError};
pub use repo::view_state_repo::ViewStateStore;
pub use service::events::ViewChangeEvent;
pub use service::orchestrator::{Orchestrator, OrchestratorError, OrchestratorPorts};
pub use transition::coordinator::{SwitchOutcome, TransitionError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
