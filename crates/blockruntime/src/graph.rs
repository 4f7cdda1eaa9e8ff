use crate::registry::HandlerRegistry;
use blockcore::{
    block_types, Block, BlockConnection, BlockHandler, BlockId, Branch, ConnectionType,
    SystemBlock, SystemBlockCatalog, Workflow, WorkflowError,
};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A block with its catalog entry and handler resolved
pub struct ResolvedBlock<'a> {
    pub block: &'a Block,
    pub system_block: &'a SystemBlock,
    pub handler: &'a Arc<dyn BlockHandler>,
}

impl ResolvedBlock<'_> {
    pub fn is_end(&self) -> bool {
        self.system_block.is_type(block_types::END)
    }
}

/// Validated, read-only index over a workflow graph.
///
/// Building the index performs every structural check, so traversal never
/// starts on a graph with a missing Start block or an unresolvable type.
pub struct GraphIndex<'a> {
    blocks: HashMap<BlockId, ResolvedBlock<'a>>,
    outgoing: HashMap<BlockId, Vec<&'a BlockConnection>>,
    start: BlockId,
    end_reachable: bool,
}

impl<'a> GraphIndex<'a> {
    pub fn build(
        workflow: &'a Workflow,
        catalog: &'a SystemBlockCatalog,
        registry: &'a HandlerRegistry,
    ) -> Result<Self, WorkflowError> {
        let mut blocks = HashMap::new();
        let mut starts = Vec::new();

        for block in &workflow.blocks {
            let system_block = catalog.get(block.system_block_id).ok_or_else(|| {
                WorkflowError::UnknownSystemBlock {
                    block: block.name.clone(),
                    system_block_id: block.system_block_id.to_string(),
                }
            })?;
            let handler = registry.resolve(system_block)?;

            if system_block.is_type(block_types::START) {
                starts.push(block.id);
            }
            blocks.insert(
                block.id,
                ResolvedBlock {
                    block,
                    system_block,
                    handler,
                },
            );
        }

        let start = match starts.as_slice() {
            [] => return Err(WorkflowError::NoStartBlock),
            [start] => *start,
            many => return Err(WorkflowError::MultipleStartBlocks { count: many.len() }),
        };

        let mut outgoing: HashMap<BlockId, Vec<&BlockConnection>> = HashMap::new();
        let mut seen = HashSet::new();
        for conn in &workflow.connections {
            for (end, id) in [("source", conn.source_block_id), ("target", conn.target_block_id)] {
                if !blocks.contains_key(&id) {
                    return Err(WorkflowError::InvalidConnection(format!(
                        "connection {} has unknown {} block {}",
                        conn.id, end, id
                    )));
                }
            }

            let key = (
                conn.source_block_id,
                conn.connection_type,
                conn.label().map(str::to_ascii_lowercase),
            );
            if !seen.insert(key) {
                tracing::warn!(
                    "Ambiguous branch: block {} has more than one {} connection labeled {:?}; first declared wins",
                    conn.source_block_id,
                    conn.connection_type.as_str(),
                    conn.label()
                );
            }

            outgoing.entry(conn.source_block_id).or_default().push(conn);
        }

        let end_reachable = Self::end_reachable_from(workflow, &blocks, start);
        if !end_reachable {
            tracing::warn!("Workflow {}: no End block is reachable from Start", workflow.id);
        }

        Ok(Self {
            blocks,
            outgoing,
            start,
            end_reachable,
        })
    }

    fn end_reachable_from(
        workflow: &Workflow,
        blocks: &HashMap<BlockId, ResolvedBlock<'_>>,
        start: BlockId,
    ) -> bool {
        let mut graph = DiGraph::<BlockId, ()>::new();
        let mut index: HashMap<BlockId, NodeIndex> = HashMap::new();
        for id in blocks.keys() {
            index.insert(*id, graph.add_node(*id));
        }
        for conn in &workflow.connections {
            graph.add_edge(index[&conn.source_block_id], index[&conn.target_block_id], ());
        }

        blocks
            .values()
            .filter(|b| b.is_end())
            .any(|end| has_path_connecting(&graph, index[&start], index[&end.block.id], None))
    }

    pub fn start(&self) -> BlockId {
        self.start
    }

    pub fn block(&self, id: BlockId) -> Option<&ResolvedBlock<'a>> {
        self.blocks.get(&id)
    }

    /// Outgoing connections of a block, in declaration order
    pub fn outgoing(&self, id: BlockId) -> &[&'a BlockConnection] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn end_reachable(&self) -> bool {
        self.end_reachable
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Pick the connection to follow for a branch.
///
/// A label branch matches labeled connections only, preferring `Success`
/// typed ones. A type branch takes connections of that type, unlabeled
/// before labeled. Ties go to declaration order.
pub fn select_connection<'c>(
    outgoing: &[&'c BlockConnection],
    branch: Branch<'_>,
) -> Option<&'c BlockConnection> {
    match branch {
        Branch::Label(key) => outgoing
            .iter()
            .filter(|c| c.matches_label(key))
            .min_by_key(|c| c.connection_type != ConnectionType::Success)
            .copied(),
        Branch::Type(connection_type) => outgoing
            .iter()
            .filter(|c| c.connection_type == connection_type)
            .min_by_key(|c| c.label().is_some())
            .copied(),
    }
}
