use crate::WorkflowId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// Reached an End block, or stopped at the step limit
    Completed,
    /// No outgoing connection matched the desired branch
    DeadEnd,
    /// The caller's cancellation token fired
    Cancelled,
}

impl std::fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionOutcome::Completed => "Completed",
            ExecutionOutcome::DeadEnd => "DeadEnd",
            ExecutionOutcome::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// Immutable record of one workflow run, handed to the caller for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub executed_at: DateTime<Utc>,
    /// Variable defaults merged with caller overrides, before traversal
    pub input_data: BTreeMap<String, String>,
    /// Variable store at the end of the run
    pub result_data: BTreeMap<String, String>,
    /// Names of visited blocks, in order
    pub path: Vec<String>,
    /// Handler descriptions, in order
    pub actions: Vec<String>,
    pub outcome: ExecutionOutcome,
    /// Set when the run hit the step limit
    pub truncated: bool,
    pub steps: usize,
}
