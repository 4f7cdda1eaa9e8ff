use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type BlockId = Uuid;
pub type SystemBlockId = Uuid;
pub type ConnectionId = Uuid;

/// Type names of the built-in system blocks.
pub mod block_types {
    pub const START: &str = "Start";
    pub const END: &str = "End";
    pub const CALCULATION: &str = "Calculation";
    pub const IF: &str = "If";
    pub const SWITCH: &str = "Switch";
    pub const LOOP: &str = "Loop";
    pub const WAIT: &str = "Wait";
    pub const TEXT_TRANSFORM: &str = "TextTransform";
    pub const TEXT_REPLACE: &str = "TextReplace";
    pub const PARSER: &str = "Parser";
    pub const HTTP_REQUEST: &str = "HttpRequest";

    pub const ALL: [&str; 11] = [
        START,
        END,
        CALCULATION,
        IF,
        SWITCH,
        LOOP,
        WAIT,
        TEXT_TRANSFORM,
        TEXT_REPLACE,
        PARSER,
        HTTP_REQUEST,
    ];
}

/// Complete workflow graph as supplied by the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub connections: Vec<BlockConnection>,
    #[serde(default)]
    pub variables: Vec<WorkflowVariable>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            blocks: Vec::new(),
            connections: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Add a block, claiming it for this workflow.
    pub fn add_block(&mut self, mut block: Block) -> BlockId {
        block.workflow_id = self.id;
        let id = block.id;
        self.blocks.push(block);
        id
    }

    /// Add an unlabeled `Success` connection.
    pub fn connect(&mut self, source: BlockId, target: BlockId) -> ConnectionId {
        self.add_connection(BlockConnection::new(source, target, ConnectionType::Success))
    }

    /// Add an unlabeled `Error` connection.
    pub fn connect_on_error(&mut self, source: BlockId, target: BlockId) -> ConnectionId {
        self.add_connection(BlockConnection::new(source, target, ConnectionType::Error))
    }

    /// Add a labeled `Success` connection (switch cases, loop branches).
    pub fn connect_labeled(
        &mut self,
        source: BlockId,
        target: BlockId,
        label: impl Into<String>,
    ) -> ConnectionId {
        self.add_connection(
            BlockConnection::new(source, target, ConnectionType::Success).with_label(label),
        )
    }

    pub fn add_connection(&mut self, connection: BlockConnection) -> ConnectionId {
        let id = connection.id;
        self.connections.push(connection);
        id
    }

    pub fn add_variable(&mut self, name: impl Into<String>, default_value: Option<&str>) {
        self.variables.push(WorkflowVariable {
            id: Uuid::new_v4(),
            name: name.into(),
            default_value: default_value.map(str::to_string),
            workflow_id: self.id,
        });
    }
}

/// A node instance in a workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    #[serde(default)]
    pub workflow_id: WorkflowId,
    pub system_block_id: SystemBlockId,
    #[serde(default)]
    pub json_config: Option<String>,
}

impl Block {
    pub fn new(name: impl Into<String>, system_block_id: SystemBlockId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            workflow_id: Uuid::nil(),
            system_block_id,
            json_config: None,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.json_config = Some(config.to_string());
        self
    }

    pub fn with_raw_config(mut self, config: impl Into<String>) -> Self {
        self.json_config = Some(config.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    Success,
    Error,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Success => "Success",
            ConnectionType::Error => "Error",
        }
    }
}

/// Directed edge between two blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConnection {
    pub id: ConnectionId,
    pub source_block_id: BlockId,
    pub target_block_id: BlockId,
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub label: Option<String>,
}

impl BlockConnection {
    pub fn new(source: BlockId, target: BlockId, connection_type: ConnectionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_block_id: source,
            target_block_id: target,
            connection_type,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label with whitespace trimmed; blank labels count as no label.
    pub fn label(&self) -> Option<&str> {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Branch keys compare to labels trimmed and case-insensitively.
    pub fn matches_label(&self, key: &str) -> bool {
        self.label()
            .is_some_and(|label| label.eq_ignore_ascii_case(key.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVariable {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub workflow_id: WorkflowId,
}

/// Catalog entry defining a block type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemBlock {
    pub id: SystemBlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub description: String,
}

impl SystemBlock {
    pub fn new(block_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_type: block_type.into(),
            description: description.into(),
        }
    }

    pub fn is_type(&self, block_type: &str) -> bool {
        self.block_type.eq_ignore_ascii_case(block_type)
    }
}

/// Read-only lookup table of system blocks, handed to the engine at
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SystemBlockCatalog {
    blocks: HashMap<SystemBlockId, SystemBlock>,
}

impl SystemBlockCatalog {
    pub fn new(blocks: impl IntoIterator<Item = SystemBlock>) -> Self {
        Self {
            blocks: blocks.into_iter().map(|b| (b.id, b)).collect(),
        }
    }

    /// Catalog of the built-in block types with stable ids
    /// (`00000000-0000-0000-0000-00000000000N`, N starting at 1).
    pub fn standard() -> Self {
        Self::new(block_types::ALL.iter().enumerate().map(|(i, block_type)| SystemBlock {
            id: Uuid::from_u128(i as u128 + 1),
            block_type: block_type.to_string(),
            description: standard_description(block_type).to_string(),
        }))
    }

    pub fn get(&self, id: SystemBlockId) -> Option<&SystemBlock> {
        self.blocks.get(&id)
    }

    /// Find a catalog entry by type name (case-insensitive).
    pub fn by_type(&self, block_type: &str) -> Option<&SystemBlock> {
        self.blocks.values().find(|b| b.is_type(block_type))
    }

    /// Id of a catalog entry by type name.
    pub fn id_of(&self, block_type: &str) -> Option<SystemBlockId> {
        self.by_type(block_type).map(|b| b.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SystemBlock> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn standard_description(block_type: &str) -> &'static str {
    match block_type {
        block_types::START => "Workflow entry point",
        block_types::END => "Workflow terminus",
        block_types::CALCULATION => "Arithmetic or concatenation on two operands",
        block_types::IF => "Compare two values and branch",
        block_types::SWITCH => "Branch on the value of an expression",
        block_types::LOOP => "Repeat a branch a fixed number of times",
        block_types::WAIT => "Pause the run",
        block_types::TEXT_TRANSFORM => "Trim or change the case of text",
        block_types::TEXT_REPLACE => "Literal or regex replacements",
        block_types::PARSER => "Extract values from JSON or XML",
        block_types::HTTP_REQUEST => "Outbound HTTP call",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_ids_are_stable() {
        let catalog = SystemBlockCatalog::standard();
        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.id_of("start"), Some(Uuid::from_u128(1)));
        assert_eq!(catalog.id_of(block_types::HTTP_REQUEST), Some(Uuid::from_u128(11)));
    }

    #[test]
    fn test_label_matching_is_trimmed_and_case_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conn = BlockConnection::new(a, b, ConnectionType::Success).with_label("  Gold ");
        assert!(conn.matches_label("gold"));
        assert!(!conn.matches_label("silver"));

        let blank = BlockConnection::new(a, b, ConnectionType::Success).with_label("  ");
        assert_eq!(blank.label(), None);
    }
}
