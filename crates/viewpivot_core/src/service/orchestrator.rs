//! View-projection orchestrator facade.
//!
//! # Responsibility
//! - Own the canonical `ViewState` of one dataset.
//! - Compose store, cache, registry and coordinator behind one API.
//! - Persist after every externally observable mutation and publish
//!   `viewchange` events.
//!
//! # Invariants
//! - `ViewState` is mutated only through this type.
//! - Selection and filters change only through the selection/filter APIs.
//! - Persistence failures never reach callers.
//! - The orchestrator is single-threaded (`!Send`); concurrent switches are
//!   interleaved futures on one executor.

use crate::animation::animator::Animator;
use crate::cache::data_cache::{CacheStats, DataCache, Projection, QueryEngine, QueryError};
use crate::model::axis::AxisMapping;
use crate::model::geometry::ScrollPosition;
use crate::model::row::{EntityId, Row};
use crate::model::view_state::{
    now_epoch_ms, FilterSpec, OrchestratorConfig, SelectionState, TransitionState,
    ViewSpecificState, ViewState, ViewTrigger, ViewType,
};
use crate::projection::config_builder::{build_projection_config, ProjectionConfig};
use crate::render::registry::{RegisterOutcome, ViewRegistry};
use crate::render::renderer::{RenderError, Renderer};
use crate::repo::kv_repo::KeyValueStore;
use crate::repo::view_state_repo::ViewStateStore;
use crate::service::events::{ViewChangeEvent, ViewEvents};
use crate::transition::coordinator::{
    SwitchOutcome, SwitchRequest, TransitionContext, TransitionCoordinator, TransitionError,
};
use log::{debug, info};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use tokio::sync::broadcast;

/// Constructor-injected collaborators.
#[derive(Clone)]
pub struct OrchestratorPorts {
    pub store: Rc<dyn KeyValueStore>,
    pub query_engine: Rc<dyn QueryEngine>,
    pub animator: Rc<dyn Animator>,
}

/// Errors of non-switch operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    Query(QueryError),
    Render(RenderError),
}

impl Display for OrchestratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            Self::Render(err) => Some(err),
        }
    }
}

impl From<QueryError> for OrchestratorError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<RenderError> for OrchestratorError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}

/// Facade over the projection orchestration components.
pub struct Orchestrator {
    state: RefCell<ViewState>,
    registry: RefCell<ViewRegistry>,
    coordinator: TransitionCoordinator,
    cache: DataCache,
    store: ViewStateStore,
    animator: Rc<dyn Animator>,
    events: ViewEvents,
}

impl Orchestrator {
    /// Creates an orchestrator with the persisted state of `dataset_id`
    /// (or defaults).
    pub fn new(dataset_id: &str, ports: OrchestratorPorts) -> Self {
        let store = ViewStateStore::new(ports.store);
        let state = store.load(dataset_id);
        info!(
            "event=orchestrator_init module=service status=ok dataset={dataset_id} current_view={}",
            state.current_view
        );

        Self {
            state: RefCell::new(state),
            registry: RefCell::new(ViewRegistry::new()),
            coordinator: TransitionCoordinator::new(),
            cache: DataCache::new(ports.query_engine),
            store,
            animator: ports.animator,
            events: ViewEvents::new(),
        }
    }

    /// Like `new`, with `config` replacing the persisted configuration.
    pub fn with_config(dataset_id: &str, ports: OrchestratorPorts, config: OrchestratorConfig) -> Self {
        let orchestrator = Self::new(dataset_id, ports);
        orchestrator.state.borrow_mut().config = config;
        orchestrator
    }

    pub fn dataset_id(&self) -> String {
        self.state.borrow().dataset_id.clone()
    }

    pub fn current_view(&self) -> ViewType {
        self.state.borrow().current_view
    }

    pub fn is_transitioning(&self) -> bool {
        self.coordinator.is_transitioning()
    }

    pub fn transition_state(&self) -> Option<TransitionState> {
        self.state.borrow().transition_state.clone()
    }

    /// Copy of the full current state.
    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn config(&self) -> OrchestratorConfig {
        self.state.borrow().config.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Subscribes to `viewchange` events.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewChangeEvent> {
        self.events.subscribe()
    }

    /// Switches the displayed projection to `target`.
    ///
    /// A call made while another switch is in flight cancels that switch.
    ///
    /// # Errors
    /// - `RendererMissing` when `target` has no renderer.
    /// - `TransitionFailure` when a renderer fails; state is rolled back.
    pub async fn switch_to_view(
        &self,
        target: ViewType,
        trigger: ViewTrigger,
        animated: bool,
    ) -> Result<SwitchOutcome, TransitionError> {
        let ctx = TransitionContext {
            state: &self.state,
            registry: &self.registry,
            animator: self.animator.as_ref(),
        };
        let request = SwitchRequest {
            target,
            trigger,
            animated,
        };

        let outcome = self.coordinator.switch_to_view(ctx, request).await?;
        if let SwitchOutcome::Switched(event) = &outcome {
            self.persist();
            self.events.publish(event.clone());
        }
        Ok(outcome)
    }

    /// Returns rows for `(descriptor, params)`, querying only on a cache
    /// miss, and redraws the active renderer.
    pub fn query_and_cache(
        &self,
        descriptor: &str,
        params: &[Value],
        filters: &[FilterSpec],
    ) -> Result<Rc<Vec<Row>>, OrchestratorError> {
        let rows = self.cache.query_and_cache(
            &mut self.state.borrow_mut(),
            descriptor,
            params,
            filters,
        )?;
        self.render_active()?;
        Ok(rows)
    }

    /// Re-projects cached rows of the current view onto `mapping` without
    /// querying or storing the mapping.
    ///
    /// Returns `None` when nothing is cached.
    pub fn reproject_cached_data(
        &self,
        mapping: &AxisMapping,
    ) -> Result<Option<ProjectionConfig>, OrchestratorError> {
        let projection = {
            let state = self.state.borrow();
            self.cache
                .reproject_cached_data(&state, state.current_view, mapping)
        };
        let Some(projection) = projection else {
            return Ok(None);
        };
        self.render_projection(&projection)?;
        Ok(Some(projection.config))
    }

    /// Stores `mapping` for the current view and redraws without animation.
    pub fn update_axis_mapping(
        &self,
        mapping: AxisMapping,
    ) -> Result<ProjectionConfig, OrchestratorError> {
        let (config, projection) = {
            let mut state = self.state.borrow_mut();
            let view_type = state.current_view;
            let entry = state.view_state_mut(view_type);
            entry.axis_mapping = mapping.clone();
            entry.last_updated = now_epoch_ms();
            state.touch();
            let config = build_projection_config(
                view_type,
                &mapping,
                &state.selection,
                &state.active_filters,
            );
            let projection = self
                .cache
                .reproject_cached_data(&state, view_type, &mapping);
            (config, projection)
        };
        self.persist();

        if let Some(projection) = projection {
            self.render_projection(&projection)?;
        }
        Ok(config)
    }

    /// Replaces the selection. `focused_id` becomes the last selected id and
    /// the current view's focused card.
    pub fn update_selection(
        &self,
        ids: impl IntoIterator<Item = EntityId>,
        focused_id: Option<EntityId>,
    ) {
        {
            let mut state = self.state.borrow_mut();
            let selected_ids: HashSet<EntityId> = ids.into_iter().collect();
            // The anchor survives while it stays selected.
            let anchor_id = state
                .selection
                .anchor_id
                .take()
                .filter(|anchor| selected_ids.contains(anchor))
                .or_else(|| focused_id.clone());
            state.selection = SelectionState {
                selected_ids,
                last_selected_id: focused_id.clone(),
                anchor_id,
            };
            if let Some(focused_id) = focused_id {
                let view_type = state.current_view;
                state.view_state_mut(view_type).focused_card_id = Some(focused_id);
            }
            state.touch();
            debug!(
                "event=selection_update module=service status=ok count={}",
                state.selection.len()
            );
        }
        self.persist();
    }

    pub fn get_selection(&self) -> SelectionState {
        self.state.borrow().selection.clone()
    }

    pub fn clear_selection(&self) {
        self.update_selection(std::iter::empty(), None);
    }

    /// Replaces the active filter list.
    pub fn update_filters(&self, filters: Vec<FilterSpec>) {
        {
            let mut state = self.state.borrow_mut();
            state.active_filters = filters;
            state.touch();
        }
        self.persist();
    }

    pub fn active_filters(&self) -> Vec<FilterSpec> {
        self.state.borrow().active_filters.clone()
    }

    /// Focuses `entity_id` in the current view and scrolls to it.
    pub fn focus_card(&self, entity_id: &str) -> Result<(), OrchestratorError> {
        {
            let mut state = self.state.borrow_mut();
            let view_type = state.current_view;
            let entry = state.view_state_mut(view_type);
            entry.focused_card_id = Some(entity_id.to_string());
            entry.last_updated = now_epoch_ms();
            state.touch();
        }
        self.persist();

        let active = self.registry.borrow().get_active();
        if let Some(renderer) = active {
            renderer.scroll_to(entity_id)?;
        }
        Ok(())
    }

    /// Records scroll and zoom of the current view and applies them.
    pub fn set_viewport(
        &self,
        scroll_position: ScrollPosition,
        zoom_level: f64,
    ) -> Result<(), OrchestratorError> {
        self.update_current_view(|entry| {
            entry.scroll_position = scroll_position;
            entry.zoom_level = zoom_level;
        })
    }

    /// Expands or collapses one group of the current view.
    pub fn set_group_expanded(
        &self,
        group_id: &str,
        expanded: bool,
    ) -> Result<(), OrchestratorError> {
        self.update_current_view(|entry| {
            if expanded {
                entry.expanded_groups.insert(group_id.to_string());
            } else {
                entry.expanded_groups.remove(group_id);
            }
        })
    }

    /// Replaces the behavior configuration.
    pub fn update_config(&self, config: OrchestratorConfig) {
        {
            let mut state = self.state.borrow_mut();
            state.config = config;
            state.touch();
        }
        self.persist();
    }

    /// Registers the renderer of `view_type`.
    ///
    /// When it becomes the active renderer of the current view, the view's
    /// persisted viewport and the cached rows are restored onto it.
    pub fn register_view_renderer(
        &self,
        view_type: ViewType,
        renderer: Rc<dyn Renderer>,
    ) -> Result<RegisterOutcome, OrchestratorError> {
        let current_view = self.current_view();
        let (outcome, restore) = {
            let mut registry = self.registry.borrow_mut();
            let outcome = registry.register(view_type, renderer, current_view);
            let restore = match outcome {
                RegisterOutcome::Activated => true,
                RegisterOutcome::Replaced => registry.active_view() == Some(view_type),
                RegisterOutcome::Registered => false,
            };
            (outcome, restore)
        };

        if restore {
            self.restore_active_view()?;
        }
        Ok(outcome)
    }

    /// Unregisters and destroys the renderer of `view_type`.
    pub fn unregister_view_renderer(&self, view_type: ViewType) -> bool {
        self.registry.borrow_mut().unregister(view_type)
    }

    pub fn has_renderer(&self, view_type: ViewType) -> bool {
        self.registry.borrow().has(view_type)
    }

    /// Resets state to defaults, dropping the cache.
    pub fn reset(&self) {
        self.coordinator.interrupt(&self.state);
        {
            let mut state = self.state.borrow_mut();
            self.cache.clear(&mut state);
            let dataset_id = state.dataset_id.clone();
            *state = ViewState::new(dataset_id);
            self.registry
                .borrow_mut()
                .restore_active(Some(state.current_view));
        }
        self.persist();
        info!(
            "event=orchestrator_reset module=service status=ok dataset={}",
            self.dataset_id()
        );
    }

    /// Tears down: interrupts any switch, destroys every renderer, persists
    /// the final state and drops the cache.
    pub fn destroy(&self) {
        self.coordinator.interrupt(&self.state);
        self.registry.borrow_mut().destroy_all();
        self.persist();
        self.cache.clear(&mut self.state.borrow_mut());
        info!(
            "event=orchestrator_destroy module=service status=ok dataset={}",
            self.dataset_id()
        );
    }

    fn update_current_view(
        &self,
        apply: impl FnOnce(&mut ViewSpecificState),
    ) -> Result<(), OrchestratorError> {
        let viewport = {
            let mut state = self.state.borrow_mut();
            let view_type = state.current_view;
            let entry = state.view_state_mut(view_type);
            apply(entry);
            entry.last_updated = now_epoch_ms();
            let viewport = entry.viewport();
            state.touch();
            viewport
        };
        self.persist();

        let active = self.registry.borrow().get_active();
        if let Some(renderer) = active {
            renderer.apply_viewport(&viewport)?;
        }
        Ok(())
    }

    fn restore_active_view(&self) -> Result<(), OrchestratorError> {
        let Some(renderer) = self.registry.borrow().get_active() else {
            return Ok(());
        };
        let (viewport, projection) = {
            let state = self.state.borrow();
            let view_type = state.current_view;
            let viewport = state
                .view_state(view_type)
                .map(|entry| entry.viewport());
            let projection = self.cache.reproject_cached_data(
                &state,
                view_type,
                &state.axis_mapping(view_type),
            );
            (viewport, projection)
        };

        if let Some(viewport) = viewport {
            renderer.apply_viewport(&viewport)?;
        }
        if let Some(projection) = projection {
            renderer.render(&projection.rows, &projection.config)?;
        }
        debug!("event=renderer_restore module=service status=ok");
        Ok(())
    }

    fn render_active(&self) -> Result<(), RenderError> {
        let Some(view_type) = self.registry.borrow().active_view() else {
            return Ok(());
        };
        let projection = {
            let state = self.state.borrow();
            self.cache
                .reproject_cached_data(&state, view_type, &state.axis_mapping(view_type))
        };
        match projection {
            Some(projection) => self.render_projection(&projection),
            None => Ok(()),
        }
    }

    fn render_projection(&self, projection: &Projection) -> Result<(), RenderError> {
        let Some(renderer) = self.registry.borrow().get_active() else {
            return Ok(());
        };
        renderer.render(&projection.rows, &projection.config)
    }

    fn persist(&self) -> bool {
        let state = self.state.borrow();
        if !state.config.persistence_enabled {
            return false;
        }
        self.store.save(&state)
    }
}
