//! Transition coordinator.
//!
//! # Responsibility
//! - Sequence projection switches, animated (FLIP) or direct.
//! - Cancel an in-flight switch when a newer one starts (last writer wins).
//! - Roll back the displayed projection when a renderer fails.
//!
//! # Invariants
//! - `ViewState::transition_state` is `Some` exactly while the phase is
//!   `Transitioning`.
//! - No `RefCell` borrow is held across an `.await`.
//! - Every switch returns to `Idle`, whether it completes, fails, is
//!   interrupted, or its future is dropped.
//! - A superseded switch never clears the state of the switch that
//!   superseded it (generation check).
//! - Once no switch is in flight, the registry's active renderer draws
//!   `current_view` (or nothing, when that view has no renderer).
//! - `TransitionState::progress` is the settled share of playback tracks.

use crate::animation::animator::Animator;
use crate::animation::flip::{plan_flip, AnimationTiming};
use crate::model::geometry::Transform;
use crate::model::row::Row;
use crate::model::view_state::{
    now_epoch_ms, TransitionState, ViewState, ViewTrigger, ViewType,
};
use crate::projection::config_builder::{build_projection_config, ProjectionConfig};
use crate::render::registry::ViewRegistry;
use crate::render::renderer::{PositionMap, RenderError, Renderer};
use crate::service::events::{PreservedState, ViewChangeEvent};
use futures::future::{join_all, AbortHandle, Abortable, FutureExt};
use log::{debug, error, info};
use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

/// Coordinator phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionPhase {
    #[default]
    Idle,
    Transitioning,
}

/// Switch failures surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// No renderer is registered for the target; nothing changed.
    RendererMissing(ViewType),
    /// A renderer failed mid-protocol; the source projection was restored.
    TransitionFailure {
        from: ViewType,
        to: ViewType,
        source: RenderError,
    },
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RendererMissing(view_type) => {
                write!(f, "no renderer registered for view `{view_type}`")
            }
            Self::TransitionFailure { from, to, source } => {
                write!(f, "transition {from} -> {to} failed: {source}")
            }
        }
    }
}

impl Error for TransitionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RendererMissing(_) => None,
            Self::TransitionFailure { source, .. } => Some(source),
        }
    }
}

/// One switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRequest {
    pub target: ViewType,
    pub trigger: ViewTrigger,
    pub animated: bool,
}

/// How a switch ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The target is now current.
    Switched(ViewChangeEvent),
    /// The target already was current; nothing happened.
    Unchanged,
    /// A newer switch (or teardown) cancelled this one.
    Interrupted,
}

/// Borrowed collaborators for one switch.
#[derive(Clone, Copy)]
pub struct TransitionContext<'a> {
    pub state: &'a RefCell<ViewState>,
    pub registry: &'a RefCell<ViewRegistry>,
    pub animator: &'a dyn Animator,
}

enum Playback {
    Settled,
    Interrupted,
}

/// Idle/Transitioning state machine.
#[derive(Default)]
pub struct TransitionCoordinator {
    phase: Cell<TransitionPhase>,
    generation: Cell<u64>,
    in_flight: RefCell<Option<AbortHandle>>,
}

impl TransitionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase.get()
    }

    pub fn is_transitioning(&self) -> bool {
        self.phase.get() == TransitionPhase::Transitioning
    }

    /// Cancels the in-flight switch, if any, leaving visuals where they are.
    ///
    /// Returns whether a switch was interrupted.
    pub fn interrupt(&self, state: &RefCell<ViewState>) -> bool {
        if !self.is_transitioning() {
            return false;
        }

        if let Some(handle) = self.in_flight.borrow_mut().take() {
            handle.abort();
        }
        self.generation.set(self.generation.get() + 1);
        self.phase.set(TransitionPhase::Idle);
        let interrupted = state.borrow_mut().transition_state.take();

        if let Some(transition) = interrupted {
            info!(
                "event=transition_interrupt module=transition status=ok from={} to={}",
                transition.from_view, transition.to_view
            );
        }
        true
    }

    /// Runs the switch protocol toward `request.target`.
    ///
    /// # Errors
    /// - `RendererMissing` when the target has no renderer.
    /// - `TransitionFailure` when a renderer fails; the source projection's
    ///   renderer is re-activated and `current_view` is unchanged.
    pub async fn switch_to_view(
        &self,
        ctx: TransitionContext<'_>,
        request: SwitchRequest,
    ) -> Result<SwitchOutcome, TransitionError> {
        let SwitchRequest {
            target,
            trigger,
            animated,
        } = request;

        let superseded = self.interrupt(ctx.state);

        let lookup = {
            let state = ctx.state.borrow();
            let registry = ctx.registry.borrow();
            let displayed = registry.active_view();
            if state.current_view == target && displayed.map_or(true, |view| view == target) {
                debug!("event=transition_switch module=transition status=unchanged view={target}");
                return Ok(SwitchOutcome::Unchanged);
            }
            registry.get(target).map(|target_renderer| {
                (state.current_view, registry.get_active(), target_renderer)
            })
        };
        let Some((source_view, source_renderer, target_renderer)) = lookup else {
            let current_view = ctx.state.borrow().current_view;
            if superseded {
                // The superseded switch may have left its target active.
                realign_active(ctx.state, ctx.registry);
            }
            error!(
                "event=transition_switch module=transition status=error from={current_view} to={target} error_code=renderer_missing"
            );
            return Err(TransitionError::RendererMissing(target));
        };

        let (animate, timing, stagger_ms, auto_focus) = {
            let state = ctx.state.borrow();
            let config = &state.config;
            (
                animated && config.enable_animations && source_renderer.is_some(),
                AnimationTiming {
                    duration_ms: config.animation_duration_ms,
                    easing: config.easing,
                    fade: config.fade_effects,
                },
                config.stagger_ms,
                config.auto_focus_on_switch,
            )
        };
        let fail = |source: RenderError| TransitionError::TransitionFailure {
            from: source_view,
            to: target,
            source,
        };

        let (target_config, rows) = {
            let mut state = ctx.state.borrow_mut();
            // Viewport fields are recorded as they change; only the stamp moves.
            state.view_state_mut(source_view).last_updated = now_epoch_ms();
            let config = build_projection_config(
                target,
                &state.axis_mapping(target),
                &state.selection,
                &state.active_filters,
            );
            (config, state.cached_rows().unwrap_or_default())
        };

        let transition_id = Uuid::new_v4();
        let _guard = self.begin(ctx.state, ctx.registry, source_view, target, animate);
        info!(
            "event=transition_start module=transition status=start transition_id={transition_id} from={source_view} to={target} animated={animate} trigger={}",
            trigger.as_str()
        );

        let source_positions = match &source_renderer {
            Some(renderer) if animate => renderer.get_positions().map_err(fail)?,
            _ => PositionMap::new(),
        };
        let playback = self
            .play(
                ctx,
                &target_renderer,
                target,
                &target_config,
                &rows,
                animate.then_some(&source_positions),
                timing,
                stagger_ms,
            )
            .await;

        let restore = match playback {
            Ok(Playback::Interrupted) => {
                info!(
                    "event=transition_finish module=transition status=interrupted transition_id={transition_id}"
                );
                return Ok(SwitchOutcome::Interrupted);
            }
            Ok(Playback::Settled) => self.restore_target(ctx, &target_renderer, target, auto_focus),
            Err(err) => Err(err),
        };

        if let Err(err) = restore {
            // Dropping the guard re-activates the source renderer.
            error!(
                "event=transition_finish module=transition status=error transition_id={transition_id} from={source_view} to={target} error={err}"
            );
            return Err(fail(err));
        }

        let event = {
            let mut state = ctx.state.borrow_mut();
            state.current_view = target;
            if let Some(transition) = state.transition_state.as_mut() {
                transition.progress = 1.0;
            }
            let timestamp = now_epoch_ms();
            state.last_modified = timestamp;
            ViewChangeEvent {
                from_view: source_view,
                to_view: target,
                timestamp,
                trigger,
                preserved_state: PreservedState {
                    selection_count: state.selection.len(),
                    focused_card_id: state
                        .view_state(target)
                        .and_then(|entry| entry.focused_card_id.clone()),
                    filter_count: state.active_filters.len(),
                },
            }
        };
        info!(
            "event=transition_finish module=transition status=ok transition_id={transition_id} from={source_view} to={target}"
        );
        Ok(SwitchOutcome::Switched(event))
    }

    fn begin<'a>(
        &'a self,
        state: &'a RefCell<ViewState>,
        registry: &'a RefCell<ViewRegistry>,
        from_view: ViewType,
        to_view: ViewType,
        is_animating: bool,
    ) -> TransitionGuard<'a> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.phase.set(TransitionPhase::Transitioning);
        state.borrow_mut().transition_state = Some(TransitionState {
            from_view,
            to_view,
            is_animating,
            progress: 0.0,
            start_time: now_epoch_ms(),
        });
        TransitionGuard {
            coordinator: self,
            state,
            registry,
            generation,
        }
    }

    fn finish(
        &self,
        state: &RefCell<ViewState>,
        registry: &RefCell<ViewRegistry>,
        generation: u64,
    ) {
        if self.generation.get() != generation {
            return;
        }
        self.in_flight.borrow_mut().take();
        self.phase.set(TransitionPhase::Idle);
        state.borrow_mut().transition_state = None;
        realign_active(state, registry);
    }

    #[allow(clippy::too_many_arguments)]
    async fn play(
        &self,
        ctx: TransitionContext<'_>,
        target_renderer: &Rc<dyn Renderer>,
        target: ViewType,
        target_config: &ProjectionConfig,
        rows: &[Row],
        source_positions: Option<&PositionMap>,
        timing: AnimationTiming,
        stagger_ms: u64,
    ) -> Result<Playback, RenderError> {
        ctx.registry
            .borrow_mut()
            .set_active(target)
            .map_err(|err| RenderError::new("activate", err.to_string()))?;
        target_renderer.render(rows, target_config)?;

        let Some(source_positions) = source_positions else {
            return Ok(Playback::Settled);
        };

        let target_positions = target_renderer.get_positions()?;
        let plan = plan_flip(source_positions, &target_positions, stagger_ms);
        let mut tracks = plan.tracks.clone();
        for track in &plan.tracks {
            ctx.animator
                .apply(&track.entity_id, track.inverted, timing.start_opacity());
        }
        for (entity_id, rect) in &plan.entering {
            ctx.animator
                .apply(entity_id, Transform::at(rect), timing.start_opacity());
        }
        if timing.fade {
            tracks.extend(plan.fade_in_tracks());
        }
        debug!(
            "event=transition_flip module=transition status=start tracks={} entering={} leaving={}",
            plan.tracks.len(),
            plan.entering.len(),
            plan.leaving.len()
        );

        let generation = self.generation.get();
        let settled = Cell::new(0usize);
        let total = tracks.len();
        let (handle, registration) = AbortHandle::new_pair();
        *self.in_flight.borrow_mut() = Some(handle);
        let playback = join_all(tracks.iter().map(|track| {
            ctx.animator.play(track, &timing).map(|()| {
                settled.set(settled.get() + 1);
                self.record_progress(ctx.state, generation, settled.get(), total);
            })
        }));
        match Abortable::new(playback, registration).await {
            Ok(_) => Ok(Playback::Settled),
            Err(_) => Ok(Playback::Interrupted),
        }
    }

    fn record_progress(
        &self,
        state: &RefCell<ViewState>,
        generation: u64,
        settled: usize,
        total: usize,
    ) {
        if self.generation.get() != generation || total == 0 {
            return;
        }
        if let Some(transition) = state.borrow_mut().transition_state.as_mut() {
            transition.progress = settled as f64 / total as f64;
        }
    }

    fn restore_target(
        &self,
        ctx: TransitionContext<'_>,
        target_renderer: &Rc<dyn Renderer>,
        target: ViewType,
        auto_focus: bool,
    ) -> Result<(), RenderError> {
        let (viewport, focused) = {
            let mut state = ctx.state.borrow_mut();
            let entry = state.view_state_mut(target);
            entry.last_updated = now_epoch_ms();
            (entry.viewport(), entry.focused_card_id.clone())
        };

        target_renderer.apply_viewport(&viewport)?;
        if auto_focus {
            if let Some(entity_id) = focused {
                target_renderer.scroll_to(&entity_id)?;
            }
        }
        Ok(())
    }
}

/// Points the registry back at the renderer of `current_view`.
fn realign_active(state: &RefCell<ViewState>, registry: &RefCell<ViewRegistry>) {
    let current_view = state.borrow().current_view;
    let mut registry = registry.borrow_mut();
    if registry.active_view() != Some(current_view) {
        debug!("event=renderer_realign module=transition status=ok view={current_view}");
        registry.restore_active(Some(current_view));
    }
}

/// Returns the coordinator to `Idle` when a switch ends for any reason.
struct TransitionGuard<'a> {
    coordinator: &'a TransitionCoordinator,
    state: &'a RefCell<ViewState>,
    registry: &'a RefCell<ViewRegistry>,
    generation: u64,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.coordinator
            .finish(self.state, self.registry, self.generation);
    }
}
