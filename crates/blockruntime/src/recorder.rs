use blockcore::{
    ExecutionId, ExecutionOutcome, VariableStore, Workflow, WorkflowExecution, WorkflowId,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Accumulates the audit trail of one run and builds its record.
pub struct ExecutionRecorder {
    execution_id: ExecutionId,
    workflow_id: WorkflowId,
    executed_at: DateTime<Utc>,
    input_data: BTreeMap<String, String>,
    store: VariableStore,
    path: Vec<String>,
    actions: Vec<String>,
    truncated: bool,
}

impl ExecutionRecorder {
    /// Seed the store from variable defaults, then apply caller overrides.
    ///
    /// The merged values are captured as the record's input data right away,
    /// so later mutations by handlers do not leak into it.
    pub fn begin(workflow: &Workflow, overrides: &HashMap<String, String>) -> Self {
        let mut store = VariableStore::new();
        for variable in &workflow.variables {
            store.set(
                &variable.name,
                variable.default_value.clone().unwrap_or_default(),
            );
        }
        for (name, value) in overrides {
            store.set(name, value.clone());
        }

        Self {
            execution_id: Uuid::new_v4(),
            workflow_id: workflow.id,
            executed_at: Utc::now(),
            input_data: store.snapshot(),
            store,
            path: Vec::new(),
            actions: Vec::new(),
            truncated: false,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn store_mut(&mut self) -> &mut VariableStore {
        &mut self.store
    }

    pub fn record_step(&mut self, block_name: &str, description: &str) {
        self.path.push(block_name.to_string());
        self.actions.push(description.to_string());
    }

    /// Append an engine note to the action log without visiting a block
    pub fn note(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    pub fn mark_truncated(&mut self, max_steps: usize) {
        self.truncated = true;
        self.note(format!(
            "Execution truncated: step limit of {} reached",
            max_steps
        ));
    }

    pub fn steps(&self) -> usize {
        self.path.len()
    }

    pub fn finish(self, outcome: ExecutionOutcome) -> WorkflowExecution {
        WorkflowExecution {
            id: self.execution_id,
            workflow_id: self.workflow_id,
            executed_at: self.executed_at,
            input_data: self.input_data,
            result_data: self.store.snapshot(),
            steps: self.path.len(),
            path: self.path,
            actions: self.actions,
            outcome,
            truncated: self.truncated,
        }
    }
}
