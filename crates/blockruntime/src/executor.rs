use crate::graph::{select_connection, GraphIndex};
use crate::recorder::ExecutionRecorder;
use crate::registry::HandlerRegistry;
use blockcore::{
    BlockContext, EventBus, ExecutionEvent, ExecutionOutcome, FlowError, SystemBlockCatalog,
    Workflow, WorkflowError, WorkflowExecution,
};
use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Walks a workflow graph one block at a time, from Start to a terminus
pub struct WorkflowExecutor {
    max_steps: usize,
}

impl WorkflowExecutor {
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Execute a workflow and return its record.
    ///
    /// Structural problems are returned as errors before anything runs. Once
    /// traversal starts the run always yields a record, whether it reaches an
    /// End block, dead-ends, hits the step limit or is cancelled.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        catalog: &SystemBlockCatalog,
        registry: &HandlerRegistry,
        event_bus: &EventBus,
        overrides: &HashMap<String, String>,
        cancellation: CancellationToken,
    ) -> Result<WorkflowExecution, FlowError> {
        let graph = GraphIndex::build(workflow, catalog, registry)?;
        let start_time = Instant::now();

        let mut recorder = ExecutionRecorder::begin(workflow, overrides);
        let execution_id = recorder.execution_id();

        event_bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_id: workflow.id,
            timestamp: Utc::now(),
        });

        tracing::info!("Starting workflow execution: {} ({})", workflow.name, execution_id);

        let mut loop_counters = HashMap::new();
        let mut current = graph.start();

        let outcome = loop {
            if cancellation.is_cancelled() {
                tracing::info!("Execution {} cancelled", execution_id);
                recorder.note("Execution cancelled");
                break ExecutionOutcome::Cancelled;
            }
            if recorder.steps() >= self.max_steps {
                tracing::warn!(
                    "Execution {} stopped at the step limit ({})",
                    execution_id,
                    self.max_steps
                );
                recorder.mark_truncated(self.max_steps);
                break ExecutionOutcome::Completed;
            }

            let resolved = graph
                .block(current)
                .ok_or_else(|| WorkflowError::BlockNotFound(current.to_string()))?;
            let block = resolved.block;

            event_bus.emit(ExecutionEvent::BlockStarted {
                execution_id,
                block_id: block.id,
                block_name: block.name.clone(),
                block_type: resolved.system_block.block_type.clone(),
                timestamp: Utc::now(),
            });

            let step_start = Instant::now();
            let result = {
                let mut ctx = BlockContext {
                    block,
                    system_block: resolved.system_block,
                    store: recorder.store_mut(),
                    loop_counters: &mut loop_counters,
                    outgoing: graph.outgoing(block.id),
                    events: event_bus.create_emitter(execution_id, block.id),
                    cancellation: cancellation.clone(),
                };
                resolved.handler.execute(&mut ctx).await
            };
            let duration_ms = step_start.elapsed().as_millis() as u64;

            tracing::debug!(
                "Block '{}' ({}) -> {} in {}ms: {}",
                block.name,
                resolved.system_block.block_type,
                result.desired_branch(),
                duration_ms,
                result.description
            );

            recorder.record_step(&block.name, &result.description);

            event_bus.emit(ExecutionEvent::BlockCompleted {
                execution_id,
                block_id: block.id,
                description: result.description.clone(),
                is_error: result.is_error,
                duration_ms,
                timestamp: Utc::now(),
            });

            if resolved.is_end() {
                break ExecutionOutcome::Completed;
            }

            match select_connection(graph.outgoing(block.id), result.desired_branch()) {
                Some(next) => current = next.target_block_id,
                None => {
                    tracing::info!(
                        "Execution {} reached a dead end at '{}' (no {} connection)",
                        execution_id,
                        block.name,
                        result.desired_branch()
                    );
                    break ExecutionOutcome::DeadEnd;
                }
            }
        };

        let record = recorder.finish(outcome);
        let duration_ms = start_time.elapsed().as_millis() as u64;

        event_bus.emit(ExecutionEvent::WorkflowCompleted {
            execution_id,
            outcome,
            steps: record.steps,
            duration_ms,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Workflow {} finished: {} after {} steps in {}ms",
            workflow.name,
            outcome,
            record.steps,
            duration_ms
        );

        Ok(record)
    }
}
