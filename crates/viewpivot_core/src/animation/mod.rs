//! FLIP planning and backend-agnostic playback.
//!
//! The transition coordinator turns two position maps into a declarative
//! `FlipPlan`; an injected `Animator` performs the actual interpolation.

pub mod animator;
pub mod easing;
pub mod flip;
