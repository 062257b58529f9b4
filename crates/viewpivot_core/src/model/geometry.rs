//! On-screen geometry reported by renderers and applied by animators.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle of one rendered entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Absolute placement of one entity: `translate(x, y) scale(scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Transform {
    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        Self { x, y, scale }
    }

    /// Resting transform of an entity laid out at `rect`.
    pub fn at(rect: &Rect) -> Self {
        Self::new(rect.x, rect.y, 1.0)
    }

    /// Linear blend toward `to`; `t` is clamped to `[0, 1]`.
    pub fn lerp(&self, to: &Transform, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            scale: self.scale + (to.scale - self.scale) * t,
        }
    }
}

/// Scroll offset of a projection viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}
