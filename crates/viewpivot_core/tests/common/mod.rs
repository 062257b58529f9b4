#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use viewpivot_core::animation::flip::{AnimationTiming, FlipTrack};
use viewpivot_core::model::view_state::Viewport;
use viewpivot_core::{
    Animator, EntityId, MemoryKeyValueStore, Orchestrator, OrchestratorPorts, PositionMap,
    ProjectionConfig, QueryEngine, QueryError, Rect, RenderError, Renderer, Row, Transform,
    TransformSink,
};

pub fn sample_rows() -> Vec<Row> {
    vec![
        Row::new("a")
            .with_field("folder", "work")
            .with_field("modified_at", 30)
            .with_field("parent_id", Value::Null),
        Row::new("b")
            .with_field("folder", "home")
            .with_field("modified_at", 20)
            .with_field("parent_id", "a"),
        Row::new("c")
            .with_field("folder", "work")
            .with_field("modified_at", 10)
            .with_field("parent_id", "a"),
    ]
}

/// Lays rendered rows out along a fixed step and records every call.
pub struct RecordingRenderer {
    step: (f64, f64),
    positions: RefCell<PositionMap>,
    hidden: RefCell<Vec<EntityId>>,
    pub renders: RefCell<Vec<(Vec<EntityId>, ProjectionConfig)>>,
    pub scrolls: RefCell<Vec<EntityId>>,
    pub viewports: RefCell<Vec<Viewport>>,
    pub fail_render: Cell<bool>,
    pub destroyed: Cell<usize>,
}

impl RecordingRenderer {
    pub fn new(step_x: f64, step_y: f64) -> Rc<Self> {
        Rc::new(Self {
            step: (step_x, step_y),
            positions: RefCell::new(PositionMap::new()),
            hidden: RefCell::new(Vec::new()),
            renders: RefCell::new(Vec::new()),
            scrolls: RefCell::new(Vec::new()),
            viewports: RefCell::new(Vec::new()),
            fail_render: Cell::new(false),
            destroyed: Cell::new(0),
        })
    }

    pub fn grid() -> Rc<Self> {
        Self::new(120.0, 0.0)
    }

    pub fn list() -> Rc<Self> {
        Self::new(0.0, 40.0)
    }

    /// Leaves `entity_id` out of the layout from the next render on.
    pub fn hide(&self, entity_id: &str) {
        self.hidden.borrow_mut().push(entity_id.to_string());
    }

    pub fn render_count(&self) -> usize {
        self.renders.borrow().len()
    }

    pub fn last_config(&self) -> Option<ProjectionConfig> {
        self.renders.borrow().last().map(|(_, config)| config.clone())
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, rows: &[Row], config: &ProjectionConfig) -> Result<(), RenderError> {
        if self.fail_render.get() {
            return Err(RenderError::new("render", "renderer refused to draw"));
        }
        let hidden = self.hidden.borrow();
        let mut positions = self.positions.borrow_mut();
        positions.clear();
        for (index, row) in rows.iter().enumerate() {
            if hidden.contains(&row.id) {
                continue;
            }
            let offset = index as f64;
            positions.insert(
                row.id.clone(),
                Rect::new(offset * self.step.0, offset * self.step.1, 100.0, 30.0),
            );
        }
        self.renders.borrow_mut().push((
            rows.iter().map(|row| row.id.clone()).collect(),
            config.clone(),
        ));
        Ok(())
    }

    fn get_positions(&self) -> Result<PositionMap, RenderError> {
        Ok(self.positions.borrow().clone())
    }

    fn scroll_to(&self, entity_id: &str) -> Result<(), RenderError> {
        self.scrolls.borrow_mut().push(entity_id.to_string());
        Ok(())
    }

    fn apply_viewport(&self, viewport: &Viewport) -> Result<(), RenderError> {
        self.viewports.borrow_mut().push(viewport.clone());
        Ok(())
    }

    fn destroy(&self) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

/// Serves fixed rows and counts executions.
pub struct CountingEngine {
    rows: Vec<Row>,
    pub calls: Cell<usize>,
    pub fail: Cell<bool>,
}

impl CountingEngine {
    pub fn new(rows: Vec<Row>) -> Rc<Self> {
        Rc::new(Self {
            rows,
            calls: Cell::new(0),
            fail: Cell::new(false),
        })
    }
}

impl QueryEngine for CountingEngine {
    fn execute(&self, descriptor: &str, _params: &[Value]) -> Result<Vec<Row>, QueryError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail.get() {
            return Err(QueryError::new(descriptor, "engine offline"));
        }
        Ok(self.rows.clone())
    }
}

/// Records applied transforms; `play` lands on the target at once.
#[derive(Default)]
pub struct RecordingAnimator {
    pub applied: RefCell<Vec<(EntityId, Transform, f64)>>,
    pub played: RefCell<Vec<FlipTrack>>,
}

impl RecordingAnimator {
    pub fn writes_for(&self, entity_id: &str) -> Vec<(Transform, f64)> {
        self.applied
            .borrow()
            .iter()
            .filter(|(id, _, _)| id == entity_id)
            .map(|(_, transform, opacity)| (*transform, *opacity))
            .collect()
    }
}

#[async_trait(?Send)]
impl Animator for RecordingAnimator {
    fn apply(&self, entity_id: &str, transform: Transform, opacity: f64) {
        self.applied
            .borrow_mut()
            .push((entity_id.to_string(), transform, opacity));
    }

    async fn play(&self, track: &FlipTrack, _timing: &AnimationTiming) {
        self.played.borrow_mut().push(track.clone());
        self.apply(&track.entity_id, track.target, 1.0);
    }
}

/// Collects every transform a shipped animator writes.
#[derive(Default)]
pub struct RecordingSink {
    pub writes: RefCell<Vec<(EntityId, Transform, f64)>>,
}

impl TransformSink for RecordingSink {
    fn set_transform(&self, entity_id: &str, transform: Transform, opacity: f64) {
        self.writes
            .borrow_mut()
            .push((entity_id.to_string(), transform, opacity));
    }
}

/// Never finishes a track; used to hold a switch mid-animation.
#[derive(Default)]
pub struct PendingAnimator {
    pub started: Cell<usize>,
}

#[async_trait(?Send)]
impl Animator for PendingAnimator {
    fn apply(&self, _entity_id: &str, _transform: Transform, _opacity: f64) {}

    async fn play(&self, _track: &FlipTrack, _timing: &AnimationTiming) {
        self.started.set(self.started.get() + 1);
        futures::future::pending::<()>().await;
    }
}

/// Settles tracks of the listed entities at once; every other track pends.
pub struct PartialAnimator {
    settling: Vec<EntityId>,
}

impl PartialAnimator {
    pub fn settling(ids: &[&str]) -> Self {
        Self {
            settling: ids.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[async_trait(?Send)]
impl Animator for PartialAnimator {
    fn apply(&self, _entity_id: &str, _transform: Transform, _opacity: f64) {}

    async fn play(&self, track: &FlipTrack, _timing: &AnimationTiming) {
        if !self.settling.contains(&track.entity_id) {
            futures::future::pending::<()>().await;
        }
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Rc<MemoryKeyValueStore>,
    pub engine: Rc<CountingEngine>,
    pub animator: Rc<RecordingAnimator>,
}

pub fn harness(dataset_id: &str) -> Harness {
    harness_with_store(dataset_id, Rc::new(MemoryKeyValueStore::new()))
}

pub fn harness_with_store(dataset_id: &str, store: Rc<MemoryKeyValueStore>) -> Harness {
    let engine = CountingEngine::new(sample_rows());
    let animator = Rc::new(RecordingAnimator::default());
    let orchestrator = Orchestrator::new(
        dataset_id,
        OrchestratorPorts {
            store: store.clone(),
            query_engine: engine.clone(),
            animator: animator.clone(),
        },
    );
    Harness {
        orchestrator,
        store,
        engine,
        animator,
    }
}
