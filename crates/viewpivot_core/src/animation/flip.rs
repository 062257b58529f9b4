//! FLIP (First-Last-Invert-Play) planning.
//!
//! # Invariants
//! - Only entities present in both position maps get a track.
//! - `inverted` reproduces the source rectangle's origin and width ratio, so
//!   applying it right after the target render causes no visual jump.
//! - `target` is always `translate(to.x, to.y) scale(1)`.
//! - Tracks, entering and leaving ids are sorted by entity id.

use crate::animation::easing::Easing;
use crate::model::geometry::{Rect, Transform};
use crate::model::row::EntityId;
use crate::render::renderer::PositionMap;

/// Opacity flipped entities start from when fading is enabled.
pub const FADE_START_OPACITY: f64 = 0.8;

/// Playback parameters shared by every track of one transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationTiming {
    pub duration_ms: u64,
    pub easing: Easing,
    pub fade: bool,
}

impl AnimationTiming {
    pub fn start_opacity(&self) -> f64 {
        if self.fade {
            FADE_START_OPACITY
        } else {
            1.0
        }
    }

    /// Opacity at eased progress `t`.
    pub fn opacity_at(&self, t: f64) -> f64 {
        let start = self.start_opacity();
        start + (1.0 - start) * t.clamp(0.0, 1.0)
    }
}

/// Movement of one entity from its source to its target rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct FlipTrack {
    pub entity_id: EntityId,
    pub from: Rect,
    pub to: Rect,
    pub delay_ms: u64,
    pub inverted: Transform,
    pub target: Transform,
}

/// Declarative description of one animated pivot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlipPlan {
    pub tracks: Vec<FlipTrack>,
    /// Only in the target projection; placed at their target rectangle.
    pub entering: Vec<(EntityId, Rect)>,
    /// Only in the source projection; no longer drawn.
    pub leaving: Vec<EntityId>,
}

impl FlipPlan {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.entering.is_empty()
    }

    /// Stationary tracks that only fade entering entities in.
    pub fn fade_in_tracks(&self) -> Vec<FlipTrack> {
        self.entering
            .iter()
            .map(|(entity_id, rect)| FlipTrack {
                entity_id: entity_id.clone(),
                from: *rect,
                to: *rect,
                delay_ms: 0,
                inverted: Transform::at(rect),
                target: Transform::at(rect),
            })
            .collect()
    }
}

/// Transform that draws an entity laid out at `to` where it was at `from`.
pub fn inverted_transform(from: &Rect, to: &Rect) -> Transform {
    let delta_x = from.x - to.x;
    let delta_y = from.y - to.y;
    let delta_scale = if to.width == 0.0 {
        1.0
    } else {
        from.width / to.width
    };
    Transform::new(to.x + delta_x, to.y + delta_y, delta_scale)
}

/// Plans tracks for every entity present in both maps.
///
/// Track `i` (in entity id order) starts after `i * stagger_ms`.
pub fn plan_flip(source: &PositionMap, target: &PositionMap, stagger_ms: u64) -> FlipPlan {
    let mut shared: Vec<(&EntityId, &Rect, &Rect)> = target
        .iter()
        .filter_map(|(id, to)| source.get(id).map(|from| (id, from, to)))
        .collect();
    shared.sort_by(|a, b| a.0.cmp(b.0));

    let tracks = shared
        .into_iter()
        .enumerate()
        .map(|(index, (id, from, to))| FlipTrack {
            entity_id: id.clone(),
            from: *from,
            to: *to,
            delay_ms: stagger_ms.saturating_mul(index as u64),
            inverted: inverted_transform(from, to),
            target: Transform::at(to),
        })
        .collect();

    let mut entering: Vec<(EntityId, Rect)> = target
        .iter()
        .filter(|(id, _)| !source.contains_key(*id))
        .map(|(id, rect)| (id.clone(), *rect))
        .collect();
    entering.sort_by(|a, b| a.0.cmp(&b.0));

    let mut leaving: Vec<EntityId> = source
        .keys()
        .filter(|id| !target.contains_key(*id))
        .cloned()
        .collect();
    leaving.sort();

    FlipPlan {
        tracks,
        entering,
        leaving,
    }
}
