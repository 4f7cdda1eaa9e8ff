use crate::graph::GraphIndex;
use crate::{registry::HandlerRegistry, WorkflowExecutor};
use blockcore::{
    EventBus, FlowError, Schedule, SystemBlockCatalog, Workflow, WorkflowExecution,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Main runtime for executing workflows
pub struct FlowRuntime {
    registry: Arc<HandlerRegistry>,
    catalog: Arc<SystemBlockCatalog>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl FlowRuntime {
    /// Create a new runtime with a pre-configured registry and catalog
    pub fn with_registry(
        registry: Arc<HandlerRegistry>,
        catalog: Arc<SystemBlockCatalog>,
        config: RuntimeConfig,
    ) -> Self {
        let executor = Arc::new(WorkflowExecutor::new(config.max_steps));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size.max(1)));

        Self {
            registry,
            catalog,
            executor,
            event_bus,
            config,
        }
    }

    /// Get access to the handler registry
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<SystemBlockCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Execute a workflow with optional variable overrides
    pub async fn execute(
        &self,
        workflow: &Workflow,
        inputs: HashMap<String, String>,
    ) -> Result<WorkflowExecution, FlowError> {
        self.execute_with_cancellation(workflow, inputs, CancellationToken::new())
            .await
    }

    /// Execute a workflow that the caller can cancel.
    ///
    /// When `max_execution_time_ms` is configured, the run is also cancelled
    /// once that much time has passed.
    pub async fn execute_with_cancellation(
        &self,
        workflow: &Workflow,
        inputs: HashMap<String, String>,
        cancellation: CancellationToken,
    ) -> Result<WorkflowExecution, FlowError> {
        let token = cancellation.child_token();
        let deadline = self.config.max_execution_time_ms.map(|ms| {
            let token = token.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(ms)).await;
                tracing::warn!("Execution time limit of {}ms reached, cancelling", ms);
                token.cancel();
            })
        });

        let result = self
            .executor
            .execute(
                workflow,
                &self.catalog,
                &self.registry,
                &self.event_bus,
                &inputs,
                token,
            )
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        result
    }

    /// Run a scheduled workflow, with no overrides, if its schedule is due.
    ///
    /// Returns `None` when nothing was due. The schedule's last run time is
    /// updated whenever a run was attempted.
    pub async fn run_if_due(
        &self,
        workflow: &Workflow,
        schedule: &mut Schedule,
        now: DateTime<Utc>,
    ) -> Option<Result<WorkflowExecution, FlowError>> {
        if !schedule.is_due(now) {
            return None;
        }
        tracing::info!("Scheduled run of workflow {} is due", workflow.name);
        let result = self.execute(workflow, HashMap::new()).await;
        schedule.mark_run(now);
        Some(result)
    }

    /// Check a workflow's structure without running it
    pub fn validate(&self, workflow: &Workflow) -> Result<ValidationReport, FlowError> {
        let graph = GraphIndex::build(workflow, &self.catalog, &self.registry)?;
        Ok(ValidationReport {
            blocks: graph.block_count(),
            connections: workflow.connections.len(),
            end_reachable: graph.end_reachable(),
        })
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<blockcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Outcome of a structural check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub blocks: usize,
    pub connections: usize,
    pub end_reachable: bool,
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Blocks executed before a run is cut short
    pub max_steps: usize,
    pub event_buffer_size: usize,
    pub max_execution_time_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            event_buffer_size: 1000,
            max_execution_time_ms: None,
        }
    }
}
