//! Animator port and the shipped frame-stepping implementation.
//!
//! # Invariants
//! - `play` applies `track.target` as its last write when it runs to the end.
//! - Dropping a `play` future stops stepping immediately; the last written
//!   transform stays in place.

use crate::animation::flip::{AnimationTiming, FlipTrack};
use crate::model::geometry::Transform;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

/// Roughly one frame at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Interpolation backend driven by the transition coordinator.
#[async_trait(?Send)]
pub trait Animator {
    /// Writes a transform immediately, without interpolation.
    fn apply(&self, entity_id: &str, transform: Transform, opacity: f64);

    /// Interpolates one track from `inverted` to `target`; resolves when the
    /// track's own interpolation ends.
    async fn play(&self, track: &FlipTrack, timing: &AnimationTiming);
}

/// Destination of transforms written by the shipped animators.
pub trait TransformSink {
    fn set_transform(&self, entity_id: &str, transform: Transform, opacity: f64);
}

/// Steps tracks on a tokio interval, writing each frame to a sink.
///
/// Needs a tokio runtime with the time driver enabled.
pub struct FrameAnimator<S: TransformSink> {
    sink: S,
    frame_interval: Duration,
}

impl<S: TransformSink> FrameAnimator<S> {
    pub fn new(sink: S) -> Self {
        Self::with_frame_interval(sink, DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_frame_interval(sink: S, frame_interval: Duration) -> Self {
        Self {
            sink,
            frame_interval: frame_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[async_trait(?Send)]
impl<S: TransformSink> Animator for FrameAnimator<S> {
    fn apply(&self, entity_id: &str, transform: Transform, opacity: f64) {
        self.sink.set_transform(entity_id, transform, opacity);
    }

    async fn play(&self, track: &FlipTrack, timing: &AnimationTiming) {
        if track.delay_ms > 0 {
            sleep(Duration::from_millis(track.delay_ms)).await;
        }

        let duration = Duration::from_millis(timing.duration_ms);
        if !duration.is_zero() {
            let started_at = Instant::now();
            let mut frames = interval(self.frame_interval);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                frames.tick().await;
                let linear = started_at.elapsed().as_secs_f64() / duration.as_secs_f64();
                if linear >= 1.0 {
                    break;
                }
                let eased = timing.easing.apply(linear);
                self.sink.set_transform(
                    &track.entity_id,
                    track.inverted.lerp(&track.target, eased),
                    timing.opacity_at(eased),
                );
            }
        }

        self.sink.set_transform(&track.entity_id, track.target, 1.0);
    }
}

/// Jumps every track straight to its target. For headless use.
pub struct InstantAnimator<S: TransformSink> {
    sink: S,
}

impl<S: TransformSink> InstantAnimator<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[async_trait(?Send)]
impl<S: TransformSink> Animator for InstantAnimator<S> {
    fn apply(&self, entity_id: &str, transform: Transform, opacity: f64) {
        self.sink.set_transform(entity_id, transform, opacity);
    }

    async fn play(&self, track: &FlipTrack, _timing: &AnimationTiming) {
        self.sink.set_transform(&track.entity_id, track.target, 1.0);
    }
}

/// Sink that discards every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TransformSink for NullSink {
    fn set_transform(&self, _entity_id: &str, _transform: Transform, _opacity: f64) {}
}
