use crate::{BlockId, ExecutionId, ExecutionOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    WorkflowStarted {
        execution_id: ExecutionId,
        workflow_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        execution_id: ExecutionId,
        outcome: ExecutionOutcome,
        steps: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    BlockStarted {
        execution_id: ExecutionId,
        block_id: BlockId,
        block_name: String,
        block_type: String,
        timestamp: DateTime<Utc>,
    },
    BlockCompleted {
        execution_id: ExecutionId,
        block_id: BlockId,
        description: String,
        is_error: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    BlockEvent {
        execution_id: ExecutionId,
        block_id: BlockId,
        event: BlockEvent,
        timestamp: DateTime<Utc>,
    },
}

/// Events specific to block execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum BlockEvent {
    Info { message: String },
    Warning { message: String },
}

/// Event emitter for handlers to send real-time updates
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    block_id: BlockId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(
        execution_id: ExecutionId,
        block_id: BlockId,
        sender: broadcast::Sender<ExecutionEvent>,
    ) -> Self {
        Self {
            execution_id,
            block_id,
            sender,
        }
    }

    /// Emit a block-specific event
    pub fn emit(&self, event: BlockEvent) {
        let _ = self.sender.send(ExecutionEvent::BlockEvent {
            execution_id: self.execution_id,
            block_id: self.block_id,
            event,
            timestamp: Utc::now(),
        });
    }

    /// Emit info message
    pub fn info(&self, message: impl Into<String>) {
        self.emit(BlockEvent::Info {
            message: message.into(),
        });
    }

    /// Emit warning message, also logged
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(block_id = %self.block_id, "{}", message);
        self.emit(BlockEvent::Warning { message });
    }
}

/// Global event bus
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, execution_id: ExecutionId, block_id: BlockId) -> EventEmitter {
        EventEmitter::new(execution_id, block_id, self.sender.clone())
    }
}
