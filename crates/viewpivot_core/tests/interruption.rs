mod common;

use common::{sample_rows, CountingEngine, PartialAnimator, PendingAnimator, RecordingRenderer};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::broadcast::error::TryRecvError;
use viewpivot_core::{
    Animator, AxisBinding, AxisMapping, MemoryKeyValueStore, Orchestrator, OrchestratorPorts,
    Plane, SwitchOutcome, TransitionError, ViewTrigger, ViewType,
};

type SwitchResult = Rc<RefCell<Option<Result<SwitchOutcome, TransitionError>>>>;

struct Fixture {
    orchestrator: Rc<Orchestrator>,
    animator: Rc<PendingAnimator>,
    grid: Rc<RecordingRenderer>,
    list: Rc<RecordingRenderer>,
    board: Rc<RecordingRenderer>,
}

fn fixture() -> Fixture {
    let animator = Rc::new(PendingAnimator::default());
    let (orchestrator, grid, list, board) = orchestrator_with(animator.clone());
    Fixture {
        orchestrator,
        animator,
        grid,
        list,
        board,
    }
}

fn orchestrator_with(
    animator: Rc<dyn Animator>,
) -> (
    Rc<Orchestrator>,
    Rc<RecordingRenderer>,
    Rc<RecordingRenderer>,
    Rc<RecordingRenderer>,
) {
    let orchestrator = Rc::new(Orchestrator::new(
        "records",
        OrchestratorPorts {
            store: Rc::new(MemoryKeyValueStore::new()),
            query_engine: CountingEngine::new(sample_rows()),
            animator,
        },
    ));
    let grid = RecordingRenderer::grid();
    let list = RecordingRenderer::list();
    let board = RecordingRenderer::grid();
    orchestrator
        .register_view_renderer(ViewType::Grid, grid.clone())
        .expect("grid registers");
    orchestrator
        .register_view_renderer(ViewType::List, list.clone())
        .expect("list registers");
    orchestrator
        .register_view_renderer(ViewType::Board, board.clone())
        .expect("board registers");
    orchestrator
        .query_and_cache("SELECT * FROM records", &[], &[])
        .expect("query should succeed");

    (orchestrator, grid, list, board)
}

fn folder_on_x() -> AxisMapping {
    AxisMapping::new().with(Plane::X, AxisBinding::new("C", "folder"))
}

/// Starts an animated switch to `target` that parks inside playback.
fn start_stalled_switch(pool: &mut LocalPool, fixture: &Fixture, target: ViewType) -> SwitchResult {
    let result: SwitchResult = Rc::default();
    let orchestrator = fixture.orchestrator.clone();
    let slot = result.clone();
    pool.spawner()
        .spawn_local(async move {
            let outcome = orchestrator
                .switch_to_view(target, ViewTrigger::User, true)
                .await;
            *slot.borrow_mut() = Some(outcome);
        })
        .expect("switch task spawns");
    pool.run_until_stalled();
    result
}

#[test]
fn newer_switch_wins_over_inflight_switch() {
    let fixture = fixture();
    let mut events = fixture.orchestrator.subscribe();
    let mut pool = LocalPool::new();

    let first = start_stalled_switch(&mut pool, &fixture, ViewType::List);
    assert!(fixture.orchestrator.is_transitioning());
    assert!(fixture.animator.started.get() > 0);
    let transition = fixture
        .orchestrator
        .transition_state()
        .expect("transition is recorded");
    assert_eq!(transition.to_view, ViewType::List);
    assert!(transition.is_animating);
    assert!(first.borrow().is_none());

    let second = pool
        .run_until(
            fixture
                .orchestrator
                .switch_to_view(ViewType::Board, ViewTrigger::Keyboard, false),
        )
        .expect("second switch succeeds");
    pool.run_until_stalled();

    assert!(matches!(second, SwitchOutcome::Switched(_)));
    assert!(matches!(
        first.borrow().as_ref(),
        Some(Ok(SwitchOutcome::Interrupted))
    ));
    assert_eq!(fixture.orchestrator.current_view(), ViewType::Board);
    assert!(fixture.orchestrator.transition_state().is_none());
    assert!(!fixture.orchestrator.is_transitioning());
    assert!(fixture.board.render_count() > 0);

    let event = events.try_recv().expect("one event for the completed switch");
    assert_eq!(event.to_view, ViewType::Board);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn switching_back_to_source_mid_flight_redraws_source() {
    let fixture = fixture();
    let mut pool = LocalPool::new();
    let renders = fixture.grid.render_count();

    let first = start_stalled_switch(&mut pool, &fixture, ViewType::List);
    let outcome = pool
        .run_until(
            fixture
                .orchestrator
                .switch_to_view(ViewType::Grid, ViewTrigger::User, false),
        )
        .expect("switch back succeeds");
    pool.run_until_stalled();

    assert!(matches!(outcome, SwitchOutcome::Switched(_)));
    assert!(matches!(
        first.borrow().as_ref(),
        Some(Ok(SwitchOutcome::Interrupted))
    ));
    assert_eq!(fixture.orchestrator.current_view(), ViewType::Grid);
    assert_eq!(fixture.grid.render_count(), renders + 1);
    assert!(fixture.orchestrator.transition_state().is_none());
}

#[test]
fn dropping_a_switch_future_returns_to_idle() {
    let fixture = fixture();
    let mut switch = Box::pin(fixture.orchestrator.switch_to_view(
        ViewType::List,
        ViewTrigger::Programmatic,
        true,
    ));

    assert!((&mut switch).now_or_never().is_none());
    assert!(fixture.orchestrator.is_transitioning());

    drop(switch);
    assert!(!fixture.orchestrator.is_transitioning());
    assert!(fixture.orchestrator.transition_state().is_none());
    assert_eq!(fixture.orchestrator.current_view(), ViewType::Grid);

    let list_renders = fixture.list.render_count();
    fixture
        .orchestrator
        .update_axis_mapping(folder_on_x())
        .expect("mapping applies");
    assert_eq!(fixture.list.render_count(), list_renders);
    let redrawn = fixture.grid.last_config().expect("grid redrawn");
    assert_eq!(redrawn.view_type, ViewType::Grid);
}

#[test]
fn failed_switch_after_interrupt_reactivates_current_view() {
    let fixture = fixture();
    assert!(fixture.orchestrator.unregister_view_renderer(ViewType::Board));
    let mut pool = LocalPool::new();

    let first = start_stalled_switch(&mut pool, &fixture, ViewType::List);
    let failed = pool.run_until(fixture.orchestrator.switch_to_view(
        ViewType::Board,
        ViewTrigger::User,
        true,
    ));
    pool.run_until_stalled();

    assert_eq!(failed, Err(TransitionError::RendererMissing(ViewType::Board)));
    assert!(matches!(
        first.borrow().as_ref(),
        Some(Ok(SwitchOutcome::Interrupted))
    ));
    assert_eq!(fixture.orchestrator.current_view(), ViewType::Grid);

    let list_renders = fixture.list.render_count();
    let grid_renders = fixture.grid.render_count();
    fixture
        .orchestrator
        .update_axis_mapping(folder_on_x())
        .expect("mapping applies");
    fixture.orchestrator.focus_card("b").expect("focus applies");

    assert_eq!(fixture.list.render_count(), list_renders);
    assert!(fixture.list.scrolls.borrow().is_empty());
    assert_eq!(fixture.grid.render_count(), grid_renders + 1);
    let redrawn = fixture.grid.last_config().expect("grid redrawn");
    assert_eq!(redrawn.view_type, ViewType::Grid);
    assert_eq!(fixture.grid.scrolls.borrow().last().map(String::as_str), Some("b"));
}

#[test]
fn progress_follows_settled_tracks() {
    let (orchestrator, _grid, _list, _board) =
        orchestrator_with(Rc::new(PartialAnimator::settling(&["a"])));
    let mut pool = LocalPool::new();
    let result: SwitchResult = Rc::default();
    let slot = result.clone();
    let switching = orchestrator.clone();
    pool.spawner()
        .spawn_local(async move {
            let outcome = switching
                .switch_to_view(ViewType::List, ViewTrigger::User, true)
                .await;
            *slot.borrow_mut() = Some(outcome);
        })
        .expect("switch task spawns");
    pool.run_until_stalled();

    let transition = orchestrator
        .transition_state()
        .expect("switch is still in flight");
    assert!((transition.progress - 1.0 / 3.0).abs() < 1e-9);
    assert!(result.borrow().is_none());

    orchestrator.destroy();
    pool.run_until_stalled();
    assert!(matches!(
        result.borrow().as_ref(),
        Some(Ok(SwitchOutcome::Interrupted))
    ));
}

#[test]
fn destroy_interrupts_inflight_switch() {
    let fixture = fixture();
    let mut pool = LocalPool::new();

    let first = start_stalled_switch(&mut pool, &fixture, ViewType::List);
    fixture.orchestrator.destroy();
    pool.run_until_stalled();

    assert!(matches!(
        first.borrow().as_ref(),
        Some(Ok(SwitchOutcome::Interrupted))
    ));
    assert!(!fixture.orchestrator.is_transitioning());
    assert_eq!(fixture.orchestrator.current_view(), ViewType::Grid);
    assert_eq!(fixture.grid.destroyed.get(), 1);
}
