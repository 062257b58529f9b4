mod common;

use common::{harness, harness_with_store, RecordingRenderer};
use futures::executor::block_on;
use std::collections::HashSet;
use std::rc::Rc;
use viewpivot_core::model::geometry::ScrollPosition;
use viewpivot_core::repo::view_state_repo::{
    deserialize_view_state, serialize_view_state, view_state_key,
};
use viewpivot_core::{
    AxisBinding, AxisMapping, Dimension, FilterOperator, FilterSpec, KeyValueStore,
    MemoryKeyValueStore, OrchestratorConfig, Plane, SqliteKeyValueStore, ViewState, ViewStateStore,
    ViewTrigger, ViewType,
};

fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn selection_survives_switches() {
    let h = harness("records");
    h.orchestrator
        .register_view_renderer(ViewType::Grid, RecordingRenderer::grid())
        .expect("grid registers");
    h.orchestrator
        .register_view_renderer(ViewType::List, RecordingRenderer::list())
        .expect("list registers");
    h.orchestrator
        .register_view_renderer(ViewType::Board, RecordingRenderer::grid())
        .expect("board registers");

    h.orchestrator
        .update_selection(["b".to_string(), "c".to_string()], Some("c".to_string()));
    block_on(
        h.orchestrator
            .switch_to_view(ViewType::List, ViewTrigger::User, true),
    )
    .expect("switch to list");
    block_on(
        h.orchestrator
            .switch_to_view(ViewType::Board, ViewTrigger::User, true),
    )
    .expect("switch to board");

    let selection = h.orchestrator.get_selection();
    assert_eq!(selection.selected_ids, ids(&["b", "c"]));
    assert_eq!(selection.last_selected_id.as_deref(), Some("c"));
    assert_eq!(selection.anchor_id.as_deref(), Some("c"));
}

#[test]
fn anchor_is_kept_while_still_selected() {
    let h = harness("records");
    h.orchestrator
        .update_selection(["a".to_string()], Some("a".to_string()));
    h.orchestrator.update_selection(
        ["a".to_string(), "b".to_string()],
        Some("b".to_string()),
    );
    assert_eq!(h.orchestrator.get_selection().anchor_id.as_deref(), Some("a"));

    h.orchestrator.clear_selection();
    let selection = h.orchestrator.get_selection();
    assert!(selection.is_empty());
    assert!(selection.anchor_id.is_none());
}

#[test]
fn serialized_state_round_trips() {
    let mut state = ViewState::new("records");
    state.current_view = ViewType::Board;
    state.selection.selected_ids = ids(&["x", "y"]);
    state.selection.last_selected_id = Some("y".to_string());
    state.active_filters = vec![FilterSpec::new(
        Dimension::Time,
        "modified_at",
        FilterOperator::Between,
        serde_json::json!([10, 20]),
    )];
    let board = state.view_state_mut(ViewType::Board);
    board.expanded_groups = ids(&["todo", "done"]);
    board.zoom_level = 1.5;
    board.scroll_position = ScrollPosition { x: 4.0, y: 80.0 };
    board.axis_mapping = AxisMapping::new().with(Plane::X, AxisBinding::new("C", "priority"));
    state.config.stagger_ms = 30;

    let bytes = serialize_view_state(&state).expect("state should encode");
    let decoded = deserialize_view_state(&bytes).expect("state should decode");
    assert_eq!(decoded, state);

    let mut seed = 0x9e37_79b9_7f4a_7c15_u64;
    let mut next_float = move |scale: f64| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed >> 11) as f64 / (1u64 << 53) as f64 * scale
    };
    for _ in 0..2_000 {
        let board = state.view_state_mut(ViewType::Board);
        board.zoom_level = next_float(10.0);
        board.scroll_position = ScrollPosition {
            x: next_float(5_000.0),
            y: -next_float(5_000.0),
        };
        state.active_filters[0].value = serde_json::json!([next_float(1.0), next_float(1e9)]);

        let bytes = serialize_view_state(&state).expect("state should encode");
        let decoded = deserialize_view_state(&bytes).expect("state should decode");
        assert_eq!(decoded, state);
    }
}

#[test]
fn state_is_restored_by_a_new_orchestrator() {
    let store = Rc::new(MemoryKeyValueStore::new());
    {
        let h = harness_with_store("records", store.clone());
        h.orchestrator
            .register_view_renderer(ViewType::Grid, RecordingRenderer::grid())
            .expect("grid registers");
        h.orchestrator
            .register_view_renderer(ViewType::List, RecordingRenderer::list())
            .expect("list registers");
        h.orchestrator
            .update_selection(["a".to_string()], None);
        h.orchestrator.update_filters(vec![FilterSpec::new(
            Dimension::Category,
            "folder",
            FilterOperator::Equals,
            "work",
        )]);
        block_on(
            h.orchestrator
                .switch_to_view(ViewType::List, ViewTrigger::User, false),
        )
        .expect("switch to list");
        h.orchestrator
            .set_viewport(ScrollPosition { x: 0.0, y: 240.0 }, 0.75)
            .expect("viewport applies");
        h.orchestrator.destroy();
    }

    let restored = harness_with_store("records", store);
    let snapshot = restored.orchestrator.snapshot();
    assert_eq!(snapshot.current_view, ViewType::List);
    assert_eq!(snapshot.selection.selected_ids, ids(&["a"]));
    assert_eq!(snapshot.active_filters.len(), 1);
    let list = snapshot.view_state(ViewType::List).expect("list entry");
    assert_eq!(list.scroll_position.y, 240.0);
    assert_eq!(list.zoom_level, 0.75);
    assert!(snapshot.cached_query.is_none());
}

#[test]
fn storage_failures_never_reach_callers() {
    let store = Rc::new(MemoryKeyValueStore::new());
    let h = harness_with_store("records", store.clone());
    store.set_available(false);

    h.orchestrator
        .update_selection(["a".to_string()], None);
    assert_eq!(h.orchestrator.get_selection().selected_ids, ids(&["a"]));
    assert_eq!(store.write_count(), 0);

    store.set_available(true);
    store.set_quota(Some(8));
    h.orchestrator.update_filters(Vec::new());
    assert_eq!(store.write_count(), 0);

    store.set_quota(None);
    h.orchestrator.update_filters(Vec::new());
    assert_eq!(store.write_count(), 1);
    let persisted = ViewStateStore::new(store).load("records");
    assert_eq!(persisted.selection.selected_ids, ids(&["a"]));
}

#[test]
fn disabled_persistence_writes_nothing() {
    let store = Rc::new(MemoryKeyValueStore::new());
    let h = harness_with_store("records", store.clone());
    h.orchestrator.update_config(OrchestratorConfig {
        persistence_enabled: false,
        ..OrchestratorConfig::default()
    });

    h.orchestrator
        .update_selection(["a".to_string()], None);
    h.orchestrator.focus_card("a").expect("focus without renderer");

    assert_eq!(store.write_count(), 0);
}

#[test]
fn corrupt_or_foreign_payloads_fall_back_to_defaults() {
    let store = Rc::new(MemoryKeyValueStore::new());
    store
        .set(&view_state_key("broken"), b"{ not json")
        .expect("raw write");
    store
        .set(
            &view_state_key("future"),
            br#"{"schema_version":99,"dataset_id":"future"}"#,
        )
        .expect("raw write");

    let views = ViewStateStore::new(store.clone());
    assert_eq!(views.load("broken").current_view, ViewType::Grid);
    assert_eq!(views.load("future").selection.len(), 0);
    assert_eq!(views.load("missing").view_states.len(), ViewType::ALL.len());

    let h = harness_with_store("broken", store);
    assert_eq!(h.orchestrator.current_view(), ViewType::Grid);
}

#[test]
fn stored_dataset_id_follows_the_requested_key() {
    let store = Rc::new(MemoryKeyValueStore::new());
    let state = ViewState::new("old-name");
    store
        .set(
            &view_state_key("new-name"),
            &serialize_view_state(&state).expect("encode"),
        )
        .expect("raw write");

    let loaded = ViewStateStore::new(store).load("new-name");
    assert_eq!(loaded.dataset_id, "new-name");
}

#[test]
fn reset_restores_defaults_and_persists_them() {
    let h = harness("records");
    h.orchestrator
        .register_view_renderer(ViewType::Grid, RecordingRenderer::grid())
        .expect("grid registers");
    h.orchestrator
        .query_and_cache("SELECT * FROM records", &[], &[])
        .expect("query should succeed");
    h.orchestrator
        .update_selection(["a".to_string()], Some("a".to_string()));

    h.orchestrator.reset();

    let snapshot = h.orchestrator.snapshot();
    assert!(snapshot.selection.is_empty());
    assert!(snapshot.cached_query.is_none());
    assert_eq!(snapshot.current_view, ViewType::Grid);
    let persisted = ViewStateStore::new(h.store.clone()).load("records");
    assert!(persisted.selection.is_empty());
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("viewstate.db");

    {
        let store = SqliteKeyValueStore::open(&path).expect("store opens");
        let views = ViewStateStore::new(Rc::new(store));
        let mut state = ViewState::new("records");
        state.current_view = ViewType::Board;
        state.selection.selected_ids = ids(&["k"]);
        assert!(views.save(&state));
        state.selection.selected_ids = ids(&["k", "m"]);
        assert!(views.save(&state));
    }

    let store = SqliteKeyValueStore::open(&path).expect("store reopens");
    let views = ViewStateStore::new(Rc::new(store));
    let loaded = views.load("records");
    assert_eq!(loaded.current_view, ViewType::Board);
    assert_eq!(loaded.selection.selected_ids, ids(&["k", "m"]));

    assert!(views.clear("records"));
    assert_eq!(views.load("records").current_view, ViewType::Grid);
}
