// crates/blockruntime/tests/executor_test.rs

use async_trait::async_trait;
use blockcore::{
    Block, BlockContext, BlockHandler, ExecutionEvent, ExecutionOutcome, FlowError, Schedule,
    StepResult, SystemBlock, SystemBlockCatalog, Workflow, WorkflowError,
};
use blockruntime::{FlowRuntime, HandlerRegistry, RuntimeConfig};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handler returning a fixed verdict for one block type
struct FixedHandler {
    block_type: &'static str,
    result: StepResult,
}

#[async_trait]
impl BlockHandler for FixedHandler {
    fn block_type(&self) -> &str {
        self.block_type
    }

    async fn execute(&self, _ctx: &mut BlockContext<'_>) -> StepResult {
        self.result.clone()
    }
}

/// Counts its visits in the loop counter map and in a variable
struct CountingHandler;

#[async_trait]
impl BlockHandler for CountingHandler {
    fn block_type(&self) -> &str {
        "Count"
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        let counter = ctx.loop_counters.entry(ctx.block.id).or_insert(0);
        *counter += 1;
        let visits = *counter;
        ctx.store.set("visits", visits.to_string());
        StepResult::success(format!("visit {}", visits))
    }
}

/// Waits until the run is cancelled
struct BlockingHandler;

#[async_trait]
impl BlockHandler for BlockingHandler {
    fn block_type(&self) -> &str {
        "Block"
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        ctx.cancellation.cancelled().await;
        StepResult::error("cancelled while blocking")
    }
}

/// Passthrough used as the registry fallback
struct Passthrough;

#[async_trait]
impl BlockHandler for Passthrough {
    fn block_type(&self) -> &str {
        "Default"
    }

    fn can_handle(&self, _system_block: &SystemBlock) -> bool {
        true
    }

    async fn execute(&self, ctx: &mut BlockContext<'_>) -> StepResult {
        StepResult::success(ctx.display_name().to_string())
    }
}

fn catalog() -> SystemBlockCatalog {
    SystemBlockCatalog::new(
        ["Start", "End", "Fail", "Count", "Block", "Mystery"]
            .into_iter()
            .map(|t| SystemBlock::new(t, format!("{} block", t))),
    )
}

fn registry(with_fallback: bool) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(FixedHandler {
        block_type: "Start",
        result: StepResult::success("Start"),
    }));
    registry.register(Arc::new(FixedHandler {
        block_type: "End",
        result: StepResult::success("End"),
    }));
    registry.register(Arc::new(FixedHandler {
        block_type: "Fail",
        result: StepResult::error("Fail"),
    }));
    registry.register(Arc::new(CountingHandler));
    registry.register(Arc::new(BlockingHandler));
    if with_fallback {
        registry.set_fallback(Arc::new(Passthrough));
    }
    registry
}

fn runtime_with(config: RuntimeConfig, catalog: SystemBlockCatalog, with_fallback: bool) -> FlowRuntime {
    FlowRuntime::with_registry(Arc::new(registry(with_fallback)), Arc::new(catalog), config)
}

fn runtime() -> FlowRuntime {
    runtime_with(RuntimeConfig::default(), catalog(), true)
}

fn block(runtime: &FlowRuntime, name: &str, block_type: &str) -> Block {
    Block::new(name, runtime.catalog().id_of(block_type).unwrap())
}

#[tokio::test]
async fn test_linear_workflow_completes() {
    let runtime = runtime();
    let mut workflow = Workflow::new("linear");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let count = workflow.add_block(block(&runtime, "Counter", "Count"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, count);
    workflow.connect(count, end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert_eq!(record.path, vec!["Start", "Counter", "End"]);
    assert_eq!(record.actions, vec!["Start", "visit 1", "End"]);
    assert_eq!(record.result_data["visits"], "1");
    assert!(!record.truncated);
}

#[tokio::test]
async fn test_error_verdict_follows_error_edge() {
    let runtime = runtime();
    let mut workflow = Workflow::new("error edge");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let fail = workflow.add_block(block(&runtime, "Check", "Fail"));
    let ok_end = workflow.add_block(block(&runtime, "Happy", "End"));
    let err_end = workflow.add_block(block(&runtime, "Sad", "End"));
    workflow.connect(start, fail);
    workflow.connect(fail, ok_end);
    workflow.connect_on_error(fail, err_end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert_eq!(record.path, vec!["Start", "Check", "Sad"]);
    assert_eq!(record.outcome, ExecutionOutcome::Completed);
}

#[tokio::test]
async fn test_missing_error_edge_is_a_dead_end() {
    let runtime = runtime();
    let mut workflow = Workflow::new("dead end");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let fail = workflow.add_block(block(&runtime, "Check", "Fail"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, fail);
    workflow.connect(fail, end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert_eq!(record.outcome, ExecutionOutcome::DeadEnd);
    assert_eq!(record.path, vec!["Start", "Check"]);
    assert_eq!(record.actions, vec!["Start", "Fail"]);
}

#[tokio::test]
async fn test_no_start_block_is_structural_failure() {
    let runtime = runtime();
    let mut workflow = Workflow::new("headless");
    workflow.add_block(block(&runtime, "End", "End"));

    let err = runtime.execute(&workflow, HashMap::new()).await.unwrap_err();
    assert!(matches!(err, FlowError::Workflow(WorkflowError::NoStartBlock)));
}

#[tokio::test]
async fn test_multiple_start_blocks_are_rejected() {
    let runtime = runtime();
    let mut workflow = Workflow::new("two heads");
    workflow.add_block(block(&runtime, "Start A", "Start"));
    workflow.add_block(block(&runtime, "Start B", "Start"));

    let err = runtime.execute(&workflow, HashMap::new()).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::MultipleStartBlocks { count: 2 })
    ));
}

#[tokio::test]
async fn test_unknown_system_block_is_rejected() {
    let runtime = runtime();
    let mut workflow = Workflow::new("orphan");
    workflow.add_block(block(&runtime, "Start", "Start"));
    workflow.add_block(Block::new("Ghost", uuid::Uuid::new_v4()));

    let err = runtime.execute(&workflow, HashMap::new()).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::UnknownSystemBlock { .. })
    ));
}

#[tokio::test]
async fn test_unhandled_type_without_fallback_is_rejected() {
    let runtime = runtime_with(RuntimeConfig::default(), catalog(), false);
    let mut workflow = Workflow::new("no fallback");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let mystery = workflow.add_block(block(&runtime, "Mystery", "Mystery"));
    workflow.connect(start, mystery);

    let err = runtime.execute(&workflow, HashMap::new()).await.unwrap_err();
    assert!(matches!(err, FlowError::Workflow(WorkflowError::NoHandler(t)) if t == "Mystery"));
}

#[tokio::test]
async fn test_fallback_handles_unknown_type() {
    let runtime = runtime();
    let mut workflow = Workflow::new("fallback");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let mystery = workflow.add_block(block(&runtime, "", "Mystery"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, mystery);
    workflow.connect(mystery, end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert_eq!(record.actions[1], "Mystery block");
    assert_eq!(record.outcome, ExecutionOutcome::Completed);
}

#[tokio::test]
async fn test_connection_to_unknown_block_is_rejected() {
    let runtime = runtime();
    let mut workflow = Workflow::new("dangling");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    workflow.connect(start, uuid::Uuid::new_v4());

    let err = runtime.execute(&workflow, HashMap::new()).await.unwrap_err();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::InvalidConnection(_))
    ));
}

#[tokio::test]
async fn test_cycle_is_truncated_at_step_limit() {
    let config = RuntimeConfig {
        max_steps: 10,
        ..RuntimeConfig::default()
    };
    let runtime = runtime_with(config, catalog(), true);
    let mut workflow = Workflow::new("spin");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let count = workflow.add_block(block(&runtime, "Counter", "Count"));
    workflow.connect(start, count);
    workflow.connect(count, count);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert!(record.truncated);
    assert_eq!(record.steps, 10);
    assert_eq!(record.result_data["visits"], "9");
    assert!(record.actions.last().unwrap().contains("step limit of 10"));
}

#[tokio::test]
async fn test_loop_counters_are_per_run() {
    let runtime = runtime();
    let mut workflow = Workflow::new("counter");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let count = workflow.add_block(block(&runtime, "Counter", "Count"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, count);
    workflow.connect(count, end);

    for _ in 0..2 {
        let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();
        assert_eq!(record.result_data["visits"], "1");
    }
}

#[tokio::test]
async fn test_cancelled_token_stops_before_first_step() {
    let runtime = runtime();
    let mut workflow = Workflow::new("cancelled");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, end);

    let token = CancellationToken::new();
    token.cancel();
    let record = runtime
        .execute_with_cancellation(&workflow, HashMap::new(), token)
        .await
        .unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::Cancelled);
    assert!(record.path.is_empty());
    assert_eq!(record.actions, vec!["Execution cancelled"]);
}

#[tokio::test]
async fn test_time_limit_cancels_a_stuck_block() {
    let config = RuntimeConfig {
        max_execution_time_ms: Some(50),
        ..RuntimeConfig::default()
    };
    let runtime = runtime_with(config, catalog(), true);
    let mut workflow = Workflow::new("stuck");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let stuck = workflow.add_block(block(&runtime, "Stuck", "Block"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, stuck);
    workflow.connect_on_error(stuck, end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert_eq!(record.outcome, ExecutionOutcome::Cancelled);
    assert_eq!(record.path, vec!["Start", "Stuck"]);
    assert_eq!(record.actions[1], "cancelled while blocking");
}

#[tokio::test]
async fn test_events_are_emitted_in_order() {
    let runtime = runtime();
    let mut events = runtime.subscribe_events();
    let mut workflow = Workflow::new("events");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, end);

    runtime.execute(&workflow, HashMap::new()).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            ExecutionEvent::WorkflowStarted { .. } => "workflow_started",
            ExecutionEvent::BlockStarted { .. } => "block_started",
            ExecutionEvent::BlockCompleted { .. } => "block_completed",
            ExecutionEvent::BlockEvent { .. } => "block_event",
            ExecutionEvent::WorkflowCompleted { .. } => "workflow_completed",
        });
    }
    assert_eq!(
        kinds,
        vec![
            "workflow_started",
            "block_started",
            "block_completed",
            "block_started",
            "block_completed",
            "workflow_completed",
        ]
    );
}

#[tokio::test]
async fn test_run_if_due_marks_the_schedule() {
    let runtime = runtime();
    let mut workflow = Workflow::new("scheduled");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, end);

    let start_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut schedule = Schedule::once(start_at);

    let early = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
    assert!(runtime.run_if_due(&workflow, &mut schedule, early).await.is_none());

    let due = Utc.with_ymd_and_hms(2024, 5, 1, 8, 1, 0).unwrap();
    let record = runtime
        .run_if_due(&workflow, &mut schedule, due)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert_eq!(schedule.last_run_at, Some(due));
    assert!(runtime.run_if_due(&workflow, &mut schedule, due).await.is_none());
}

#[tokio::test]
async fn test_validate_reports_unreachable_end() {
    let runtime = runtime();
    let mut workflow = Workflow::new("island");
    workflow.add_block(block(&runtime, "Start", "Start"));
    workflow.add_block(block(&runtime, "End", "End"));

    let report = runtime.validate(&workflow).unwrap();
    assert_eq!(report.blocks, 2);
    assert!(!report.end_reachable);
}

#[tokio::test]
async fn test_zero_event_buffer_still_runs() {
    let config = RuntimeConfig {
        event_buffer_size: 0,
        ..RuntimeConfig::default()
    };
    let runtime = runtime_with(config, catalog(), true);
    let mut events = runtime.subscribe_events();
    let mut workflow = Workflow::new("tiny buffer");
    let start = workflow.add_block(block(&runtime, "Start", "Start"));
    let end = workflow.add_block(block(&runtime, "End", "End"));
    workflow.connect(start, end);

    let record = runtime.execute(&workflow, HashMap::new()).await.unwrap();

    assert_eq!(record.outcome, ExecutionOutcome::Completed);
    assert_eq!(record.path, vec!["Start", "End"]);
    // A one-slot channel keeps only the latest event
    let mut last = None;
    loop {
        match events.try_recv() {
            Ok(event) => last = Some(event),
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert!(matches!(last, Some(ExecutionEvent::WorkflowCompleted { .. })));
}
