//! Renderer capability consumed by the orchestrator.
//!
//! Drawing technology is up to the implementor; the orchestrator only needs
//! to hand over rows + configuration and read back on-screen rectangles.

use crate::model::geometry::Rect;
use crate::model::row::{EntityId, Row};
use crate::model::view_state::Viewport;
use crate::projection::config_builder::ProjectionConfig;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Entity id → current on-screen rectangle.
pub type PositionMap = HashMap<EntityId, Rect>;

/// Failure raised by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub operation: &'static str,
    pub message: String,
}

impl RenderError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "renderer {} failed: {}", self.operation, self.message)
    }
}

impl Error for RenderError {}

/// Draws one projection type.
///
/// Methods take `&self`; implementations own their mutable drawing state.
pub trait Renderer {
    /// Draws `rows` according to `config`.
    fn render(&self, rows: &[Row], config: &ProjectionConfig) -> Result<(), RenderError>;

    /// Current rectangle of every drawn entity.
    fn get_positions(&self) -> Result<PositionMap, RenderError>;

    /// Brings `entity_id` into view.
    fn scroll_to(&self, entity_id: &str) -> Result<(), RenderError>;

    /// Re-applies persisted scroll, zoom and expansion.
    fn apply_viewport(&self, _viewport: &Viewport) -> Result<(), RenderError> {
        Ok(())
    }

    /// Releases drawing resources. Must be idempotent.
    fn destroy(&self);
}
