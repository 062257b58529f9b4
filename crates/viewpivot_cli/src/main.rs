//! Headless pivot demo.
//!
//! # Responsibility
//! - Drive one orchestrator through grid, list and board projections.
//! - Print each `viewchange` event as one JSON line.
//!
//! Usage: `viewpivot_cli [state.db]`. Without a path the state lives in
//! memory. Set `VIEWPIVOT_LOG_DIR` to an absolute directory to write logs.

use futures::executor::block_on;
use log::warn;
use serde_json::Value;
use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use viewpivot_core::model::view_state::Viewport;
use viewpivot_core::{
    core_version, default_log_level, init_logging, InstantAnimator, KeyValueStore,
    MemoryKeyValueStore, NullSink, Orchestrator, OrchestratorPorts, PositionMap, Plane,
    ProjectionConfig, QueryEngine, QueryError, Rect, RenderError, Renderer, Row,
    SqliteKeyValueStore, ViewTrigger, ViewType,
};

/// Prints what it would draw and lays rows out on a fixed stride.
struct TextRenderer {
    view_type: ViewType,
    positions: RefCell<PositionMap>,
}

impl TextRenderer {
    fn new(view_type: ViewType) -> Rc<Self> {
        Rc::new(Self {
            view_type,
            positions: RefCell::new(PositionMap::new()),
        })
    }

    fn rect_for(&self, index: usize, config: &ProjectionConfig) -> Rect {
        let style = &config.style;
        let slot = index as f64;
        match self.view_type {
            ViewType::Grid => Rect::new(
                (index % 4) as f64 * (style.card_width + style.gap),
                (index / 4) as f64 * (style.card_height + style.gap),
                style.card_width,
                style.card_height,
            ),
            ViewType::List => Rect::new(
                0.0,
                slot * (style.card_height + style.gap),
                style.card_width,
                style.card_height,
            ),
            ViewType::Board => Rect::new(
                slot * (style.card_width + style.gap),
                0.0,
                style.card_width,
                style.card_height,
            ),
        }
    }
}

impl Renderer for TextRenderer {
    fn render(&self, rows: &[Row], config: &ProjectionConfig) -> Result<(), RenderError> {
        let planes: Vec<String> = config
            .planes
            .iter()
            .map(|(plane, assignment)| {
                format!("{}={}:{}", plane.as_str(), assignment.dimension, assignment.facet)
            })
            .collect();
        println!(
            "render view={} rows={} planes=[{}] selected={}",
            self.view_type,
            rows.len(),
            planes.join(","),
            config.selected_ids.len()
        );

        let mut positions = self.positions.borrow_mut();
        positions.clear();
        for (index, row) in rows.iter().enumerate() {
            positions.insert(row.id.clone(), self.rect_for(index, config));
        }
        Ok(())
    }

    fn get_positions(&self) -> Result<PositionMap, RenderError> {
        Ok(self.positions.borrow().clone())
    }

    fn scroll_to(&self, entity_id: &str) -> Result<(), RenderError> {
        println!("scroll view={} entity={entity_id}", self.view_type);
        Ok(())
    }

    fn apply_viewport(&self, viewport: &Viewport) -> Result<(), RenderError> {
        println!(
            "viewport view={} zoom={} expanded={}",
            self.view_type,
            viewport.zoom_level,
            viewport.expanded_groups.len()
        );
        Ok(())
    }

    fn destroy(&self) {
        self.positions.borrow_mut().clear();
    }
}

/// Serves a fixed record set.
struct DemoEngine;

impl QueryEngine for DemoEngine {
    fn execute(&self, _descriptor: &str, _params: &[Value]) -> Result<Vec<Row>, QueryError> {
        let records = [
            ("r1", "inbox", "todo", 5),
            ("r2", "inbox", "done", 4),
            ("r3", "work", "todo", 3),
            ("r4", "work", "doing", 2),
            ("r5", "home", "todo", 1),
        ];
        Ok(records
            .iter()
            .map(|(id, folder, status, modified_at)| {
                Row::new(*id)
                    .with_field("folder", *folder)
                    .with_field("status", *status)
                    .with_field("modified_at", *modified_at)
                    .with_field("parent_id", Value::Null)
            })
            .collect())
    }
}

fn open_store(path: Option<&str>) -> Result<Rc<dyn KeyValueStore>, Box<dyn Error>> {
    match path {
        Some(path) => Ok(Rc::new(SqliteKeyValueStore::open(path)?)),
        None => Ok(Rc::new(MemoryKeyValueStore::new())),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("VIEWPIVOT_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }
    println!("viewpivot_core version={}", core_version());

    let db_path = std::env::args().nth(1);
    let orchestrator = Orchestrator::new(
        "demo",
        OrchestratorPorts {
            store: open_store(db_path.as_deref())?,
            query_engine: Rc::new(DemoEngine),
            animator: Rc::new(InstantAnimator::new(NullSink)),
        },
    );
    let mut events = orchestrator.subscribe();

    for view_type in ViewType::ALL {
        orchestrator.register_view_renderer(view_type, TextRenderer::new(view_type))?;
    }
    orchestrator.query_and_cache("SELECT * FROM records", &[], &[])?;
    orchestrator.update_selection(["r2".to_string(), "r4".to_string()], Some("r4".to_string()));

    let route = [
        (ViewType::List, ViewTrigger::User),
        (ViewType::Board, ViewTrigger::Keyboard),
        (ViewType::Grid, ViewTrigger::Programmatic),
    ];
    for (target, trigger) in route {
        block_on(orchestrator.switch_to_view(target, trigger, true))?;
        while let Ok(event) = events.try_recv() {
            println!("viewchange {}", serde_json::to_string(&event)?);
        }
    }

    let stats = orchestrator.cache_stats();
    println!(
        "cache hits={} misses={} x={:?}",
        stats.hits,
        stats.misses,
        orchestrator
            .snapshot()
            .axis_mapping(ViewType::Grid)
            .get(Plane::X)
            .map(|binding| binding.dimension.clone())
    );
    orchestrator.destroy();
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        warn!("event=cli_run module=cli status=error error={err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
