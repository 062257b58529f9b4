//! ViewState persistence.
//!
//! # Responsibility
//! - Load, save and clear the `ViewState` of one dataset.
//! - Own the JSON wire shape, including set ↔ array conversion.
//!
//! # Invariants
//! - `load` never fails; unusable payloads fall back to defaults.
//! - `save` and `clear` never propagate storage errors.
//! - `cached_query` and `transition_state` are never persisted.
//! - Sets are written as sorted arrays so payloads are deterministic.

use crate::model::axis::AxisMapping;
use crate::model::geometry::ScrollPosition;
use crate::model::row::EntityId;
use crate::model::view_state::{
    FilterSpec, OrchestratorConfig, SelectionState, ViewSpecificState, ViewState, ViewType,
    VIEW_STATE_SCHEMA_VERSION,
};
use crate::repo::kv_repo::KeyValueStore;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

const KEY_PREFIX: &str = "viewstate-";

/// Storage key for one dataset.
pub fn view_state_key(dataset_id: &str) -> String {
    format!("{KEY_PREFIX}{dataset_id}")
}

/// Payload decode errors.
#[derive(Debug)]
pub enum ViewStateDecodeError {
    Json(serde_json::Error),
    SchemaMismatch { found: Option<u64>, expected: u32 },
}

impl Display for ViewStateDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "malformed view state payload: {err}"),
            Self::SchemaMismatch { found, expected } => match found {
                Some(found) => write!(
                    f,
                    "view state schema version {found} does not match expected {expected}"
                ),
                None => write!(
                    f,
                    "view state payload has no schema version; expected {expected}"
                ),
            },
        }
    }
}

impl Error for ViewStateDecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::SchemaMismatch { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ViewStateDecodeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSelection {
    selected_ids: Vec<EntityId>,
    last_selected_id: Option<EntityId>,
    anchor_id: Option<EntityId>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedViewSpecificState {
    axis_mapping: AxisMapping,
    focused_card_id: Option<EntityId>,
    scroll_position: ScrollPosition,
    zoom_level: f64,
    expanded_groups: Vec<String>,
    last_updated: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedViewState {
    schema_version: u32,
    dataset_id: String,
    current_view: ViewType,
    view_states: BTreeMap<ViewType, PersistedViewSpecificState>,
    selection: PersistedSelection,
    active_filters: Vec<FilterSpec>,
    config: OrchestratorConfig,
    last_modified: i64,
}

fn sorted<T: Ord + Clone>(set: &HashSet<T>) -> Vec<T> {
    let mut items: Vec<T> = set.iter().cloned().collect();
    items.sort();
    items
}

impl From<&ViewSpecificState> for PersistedViewSpecificState {
    fn from(value: &ViewSpecificState) -> Self {
        Self {
            axis_mapping: value.axis_mapping.clone(),
            focused_card_id: value.focused_card_id.clone(),
            scroll_position: value.scroll_position,
            zoom_level: value.zoom_level,
            expanded_groups: sorted(&value.expanded_groups),
            last_updated: value.last_updated,
        }
    }
}

impl From<PersistedViewSpecificState> for ViewSpecificState {
    fn from(value: PersistedViewSpecificState) -> Self {
        Self {
            axis_mapping: value.axis_mapping,
            focused_card_id: value.focused_card_id,
            scroll_position: value.scroll_position,
            zoom_level: value.zoom_level,
            expanded_groups: value.expanded_groups.into_iter().collect(),
            last_updated: value.last_updated,
        }
    }
}

impl From<&ViewState> for PersistedViewState {
    fn from(state: &ViewState) -> Self {
        Self {
            schema_version: VIEW_STATE_SCHEMA_VERSION,
            dataset_id: state.dataset_id.clone(),
            current_view: state.current_view,
            view_states: state
                .view_states
                .iter()
                .map(|(view_type, entry)| (*view_type, entry.into()))
                .collect(),
            selection: PersistedSelection {
                selected_ids: sorted(&state.selection.selected_ids),
                last_selected_id: state.selection.last_selected_id.clone(),
                anchor_id: state.selection.anchor_id.clone(),
            },
            active_filters: state.active_filters.clone(),
            config: state.config.clone(),
            last_modified: state.last_modified,
        }
    }
}

impl From<PersistedViewState> for ViewState {
    fn from(value: PersistedViewState) -> Self {
        let mut state = ViewState {
            dataset_id: value.dataset_id,
            current_view: value.current_view,
            view_states: value
                .view_states
                .into_iter()
                .map(|(view_type, entry)| (view_type, entry.into()))
                .collect(),
            selection: SelectionState {
                selected_ids: value.selection.selected_ids.into_iter().collect(),
                last_selected_id: value.selection.last_selected_id,
                anchor_id: value.selection.anchor_id,
            },
            active_filters: value.active_filters,
            cached_query: None,
            transition_state: None,
            config: value.config,
            last_modified: value.last_modified,
            schema_version: value.schema_version,
        };
        state.ensure_view_entries();
        state
    }
}

/// Encodes the persisted slice of `state` as JSON bytes.
pub fn serialize_view_state(state: &ViewState) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&PersistedViewState::from(state))
}

/// Decodes a payload written by `serialize_view_state`.
///
/// # Errors
/// - `SchemaMismatch` when `schema_version` is absent or differs from
///   `VIEW_STATE_SCHEMA_VERSION`.
/// - `Json` when the payload is not valid JSON of the expected shape.
pub fn deserialize_view_state(bytes: &[u8]) -> Result<ViewState, ViewStateDecodeError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    let found = raw.get("schema_version").and_then(Value::as_u64);
    if found != Some(u64::from(VIEW_STATE_SCHEMA_VERSION)) {
        return Err(ViewStateDecodeError::SchemaMismatch {
            found,
            expected: VIEW_STATE_SCHEMA_VERSION,
        });
    }
    let persisted: PersistedViewState = serde_json::from_value(raw)?;
    Ok(persisted.into())
}

/// Best-effort ViewState persistence over a `KeyValueStore`.
#[derive(Clone)]
pub struct ViewStateStore {
    backend: Rc<dyn KeyValueStore>,
}

impl ViewStateStore {
    pub fn new(backend: Rc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Loads the state of `dataset_id`, or defaults when nothing usable exists.
    pub fn load(&self, dataset_id: &str) -> ViewState {
        let key = view_state_key(dataset_id);
        let bytes = match self.backend.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("event=view_state_load module=repo status=miss dataset={dataset_id}");
                return ViewState::new(dataset_id);
            }
            Err(err) => {
                warn!(
                    "event=view_state_load module=repo status=error dataset={dataset_id} error_code=store_read_failed error={err}"
                );
                return ViewState::new(dataset_id);
            }
        };

        match deserialize_view_state(&bytes) {
            Ok(mut state) => {
                if state.dataset_id != dataset_id {
                    warn!(
                        "event=view_state_load module=repo status=ok dataset={dataset_id} note=dataset_id_rewritten stored={}",
                        state.dataset_id
                    );
                    state.dataset_id = dataset_id.to_string();
                }
                info!(
                    "event=view_state_load module=repo status=ok dataset={dataset_id} current_view={}",
                    state.current_view
                );
                state
            }
            Err(err) => {
                let code = match err {
                    ViewStateDecodeError::SchemaMismatch { .. } => "schema_mismatch",
                    ViewStateDecodeError::Json(_) => "corrupt_payload",
                };
                warn!(
                    "event=view_state_load module=repo status=fallback dataset={dataset_id} error_code={code} error={err}"
                );
                ViewState::new(dataset_id)
            }
        }
    }

    /// Writes `state`; returns whether the write landed.
    pub fn save(&self, state: &ViewState) -> bool {
        let payload = match serialize_view_state(state) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    "event=view_state_save module=repo status=error dataset={} error_code=encode_failed error={err}",
                    state.dataset_id
                );
                return false;
            }
        };

        match self.backend.set(&view_state_key(&state.dataset_id), &payload) {
            Ok(()) => {
                debug!(
                    "event=view_state_save module=repo status=ok dataset={} bytes={}",
                    state.dataset_id,
                    payload.len()
                );
                true
            }
            Err(err) => {
                warn!(
                    "event=view_state_save module=repo status=error dataset={} error_code=store_write_failed error={err}",
                    state.dataset_id
                );
                false
            }
        }
    }

    /// Removes persisted state of `dataset_id`; returns whether it succeeded.
    pub fn clear(&self, dataset_id: &str) -> bool {
        match self.backend.remove(&view_state_key(dataset_id)) {
            Ok(()) => {
                info!("event=view_state_clear module=repo status=ok dataset={dataset_id}");
                true
            }
            Err(err) => {
                warn!(
                    "event=view_state_clear module=repo status=error dataset={dataset_id} error={err}"
                );
                false
            }
        }
    }
}
