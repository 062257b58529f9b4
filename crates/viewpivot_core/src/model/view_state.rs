//! ViewState aggregate.
//!
//! # Responsibility
//! - Hold the canonical orchestration state for one dataset.
//! - Provide defaults for every projection type.
//!
//! # Invariants
//! - `view_states` has exactly one entry per `ViewType::ALL` member.
//! - `transition_state` is `Some` only while a transition is in flight.
//! - `selection` and `active_filters` are never touched by a projection switch.

use crate::animation::easing::Easing;
use crate::cache::fingerprint::Fingerprint;
use crate::model::axis::{AxisBinding, AxisMapping, Dimension, Plane};
use crate::model::geometry::ScrollPosition;
use crate::model::row::{EntityId, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Persisted layout version of `ViewState`.
pub const VIEW_STATE_SCHEMA_VERSION: u32 = 1;

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Projection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    /// Two-axis grid.
    Grid,
    /// Hierarchical list.
    List,
    /// Column-grouped board.
    Board,
}

impl ViewType {
    pub const ALL: [ViewType; 3] = [ViewType::Grid, ViewType::List, ViewType::Board];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::List => "list",
            Self::Board => "board",
        }
    }

    /// Planes a projection of this type cannot be drawn without.
    pub fn required_planes(self) -> &'static [Plane] {
        match self {
            Self::Grid => &[Plane::X, Plane::Y],
            Self::List => &[Plane::Y],
            Self::Board => &[Plane::X],
        }
    }

    /// Axis mapping a fresh state starts with.
    pub fn default_axis_mapping(self) -> AxisMapping {
        match self {
            Self::Grid => AxisMapping::new()
                .with(Plane::X, AxisBinding::of(Dimension::Category, "folder"))
                .with(Plane::Y, AxisBinding::of(Dimension::Time, "modified_at")),
            Self::List => AxisMapping::new()
                .with(Plane::Y, AxisBinding::of(Dimension::Hierarchy, "parent_id")),
            Self::Board => AxisMapping::new()
                .with(Plane::X, AxisBinding::of(Dimension::Category, "status"))
                .with(Plane::Y, AxisBinding::of(Dimension::Time, "modified_at")),
        }
    }
}

impl Display for ViewType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What initiated a projection switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewTrigger {
    User,
    Programmatic,
    Keyboard,
}

impl ViewTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Programmatic => "programmatic",
            Self::Keyboard => "keyboard",
        }
    }
}

/// State remembered for one projection type.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpecificState {
    pub axis_mapping: AxisMapping,
    pub focused_card_id: Option<EntityId>,
    pub scroll_position: ScrollPosition,
    /// Zoom or density factor; `1.0` is the renderer's natural size.
    pub zoom_level: f64,
    pub expanded_groups: HashSet<String>,
    /// Epoch milliseconds.
    pub last_updated: i64,
}

impl ViewSpecificState {
    pub fn new(view_type: ViewType, now_ms: i64) -> Self {
        Self {
            axis_mapping: view_type.default_axis_mapping(),
            focused_card_id: None,
            scroll_position: ScrollPosition::default(),
            zoom_level: 1.0,
            expanded_groups: HashSet::new(),
            last_updated: now_ms,
        }
    }

    /// Viewport slice handed to renderers on restore.
    pub fn viewport(&self) -> Viewport {
        let mut expanded_groups: Vec<String> = self.expanded_groups.iter().cloned().collect();
        expanded_groups.sort();
        Viewport {
            scroll_position: self.scroll_position,
            zoom_level: self.zoom_level,
            expanded_groups,
        }
    }
}

/// Scroll, zoom and expansion state re-applied to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub scroll_position: ScrollPosition,
    pub zoom_level: f64,
    /// Sorted group ids.
    pub expanded_groups: Vec<String>,
}

/// View-independent selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub selected_ids: HashSet<EntityId>,
    pub last_selected_id: Option<EntityId>,
    pub anchor_id: Option<EntityId>,
}

impl SelectionState {
    pub fn len(&self) -> usize {
        self.selected_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selected_ids.contains(id)
    }
}

/// Comparison applied by one filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Between,
    In,
}

/// One active filter. Parsing and evaluation belong to the query engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub dimension: Dimension,
    pub facet: String,
    pub value: Value,
    pub operator: FilterOperator,
}

impl FilterSpec {
    pub fn new(
        dimension: Dimension,
        facet: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            dimension,
            facet: facet.into(),
            value: value.into(),
            operator,
        }
    }
}

/// Most recent query result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    pub descriptor: String,
    pub params: Vec<Value>,
    /// Filters the rows were fetched under.
    pub filters: Vec<FilterSpec>,
    pub results: Rc<Vec<Row>>,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub fingerprint: Fingerprint,
}

/// In-flight transition record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionState {
    pub from_view: ViewType,
    pub to_view: ViewType,
    pub is_animating: bool,
    /// `0.0` when started, `1.0` once every track settled.
    pub progress: f64,
    /// Epoch milliseconds.
    pub start_time: i64,
}

/// Orchestrator behavior switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub enable_animations: bool,
    pub animation_duration_ms: u64,
    pub persistence_enabled: bool,
    pub auto_focus_on_switch: bool,
    /// Per-entity start offset; `0` disables staggering.
    pub stagger_ms: u64,
    /// Fade flipped entities from 0.8 to 1 while they move.
    pub fade_effects: bool,
    pub easing: Easing,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_animations: true,
            animation_duration_ms: 300,
            persistence_enabled: true,
            auto_focus_on_switch: true,
            stagger_ms: 0,
            fade_effects: false,
            easing: Easing::default(),
        }
    }
}

/// Root orchestration aggregate for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub dataset_id: String,
    pub current_view: ViewType,
    pub view_states: BTreeMap<ViewType, ViewSpecificState>,
    pub selection: SelectionState,
    pub active_filters: Vec<FilterSpec>,
    pub cached_query: Option<CachedQuery>,
    pub transition_state: Option<TransitionState>,
    pub config: OrchestratorConfig,
    /// Epoch milliseconds.
    pub last_modified: i64,
    pub schema_version: u32,
}

impl ViewState {
    /// Creates a default state with one entry per projection type.
    pub fn new(dataset_id: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        let view_states = ViewType::ALL
            .iter()
            .map(|view_type| (*view_type, ViewSpecificState::new(*view_type, now)))
            .collect();

        Self {
            dataset_id: dataset_id.into(),
            current_view: ViewType::Grid,
            view_states,
            selection: SelectionState::default(),
            active_filters: Vec::new(),
            cached_query: None,
            transition_state: None,
            config: OrchestratorConfig::default(),
            last_modified: now,
            schema_version: VIEW_STATE_SCHEMA_VERSION,
        }
    }

    /// Returns the per-view entry, creating the default one if absent.
    pub fn view_state_mut(&mut self, view_type: ViewType) -> &mut ViewSpecificState {
        self.view_states
            .entry(view_type)
            .or_insert_with(|| ViewSpecificState::new(view_type, now_epoch_ms()))
    }

    /// Returns the per-view entry, or `None` when it was never created.
    pub fn view_state(&self, view_type: ViewType) -> Option<&ViewSpecificState> {
        self.view_states.get(&view_type)
    }

    /// Axis mapping for `view_type`, falling back to the type default.
    pub fn axis_mapping(&self, view_type: ViewType) -> AxisMapping {
        self.view_state(view_type)
            .map(|state| state.axis_mapping.clone())
            .unwrap_or_else(|| view_type.default_axis_mapping())
    }

    /// Rows of the cached query, if any.
    pub fn cached_rows(&self) -> Option<Rc<Vec<Row>>> {
        self.cached_query
            .as_ref()
            .map(|cached| Rc::clone(&cached.results))
    }

    /// Fills missing per-view entries with defaults.
    pub fn ensure_view_entries(&mut self) {
        for view_type in ViewType::ALL {
            self.view_state_mut(view_type);
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = now_epoch_ms();
    }
}
