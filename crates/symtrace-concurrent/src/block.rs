//! The series-parallel block graph of one recorded thread.
//!
//! A block is a logical control-flow unit: it has a body of events, an
//! optional guard, ordered inner blocks, and an optional else block whose
//! guard is the negation of its own. The events in a body occur before those
//! of the inner blocks, and inner blocks occur in list order. The root block
//! anchors the graph: it is unconditional, its body stays empty, and it never
//! has an else block.
//!
//! The graph is backed by a `StableGraph` arena. [`BlockId`] bridges to
//! petgraph's `NodeIndex<u32>`; edges carry either an ordered inner-block
//! relation or the then/else link.

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};

use crate::event::EventRef;
use crate::instr::InstrRef;

/// Stable block identifier. Maps to a petgraph `NodeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl From<NodeIndex<u32>> for BlockId {
    fn from(idx: NodeIndex<u32>) -> Self {
        BlockId(idx.index() as u32)
    }
}

impl From<BlockId> for NodeIndex<u32> {
    fn from(id: BlockId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

/// One vertex of the series-parallel graph.
#[derive(Debug, Default)]
struct Block {
    guard: Option<InstrRef>,
    body: Vec<EventRef>,
}

/// Structural edges between blocks.
#[derive(Debug)]
enum BlockEdge {
    /// `source` contains `target` as its `order`-th inner block.
    Inner { order: u32 },
    /// `target` is the else block of the conditional `source`.
    Else,
}

/// Arena holding the block graph of one thread.
#[derive(Debug)]
pub struct BlockGraph {
    graph: StableGraph<Block, BlockEdge, Directed, u32>,
    root: BlockId,
}

impl BlockGraph {
    /// Creates a graph holding only the root block.
    pub fn new() -> Self {
        let mut graph = StableGraph::default();
        let root = BlockId::from(graph.add_node(Block::default()));
        BlockGraph { graph, root }
    }

    /// Root of the graph: unconditional, empty-bodied, no else block.
    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Appends a new block under `outer`, after all existing inner blocks.
    pub fn add_inner(&mut self, outer: BlockId, guard: Option<InstrRef>) -> BlockId {
        let order = self.inner_blocks(outer).len() as u32;
        let block = BlockId::from(self.graph.add_node(Block { guard, body: Vec::new() }));
        self.graph
            .add_edge(outer.into(), block.into(), BlockEdge::Inner { order });
        block
    }

    /// Creates the else block of the conditional `then_block`.
    pub fn add_else(&mut self, then_block: BlockId, guard: InstrRef) -> BlockId {
        assert!(
            self.guard(then_block).is_some(),
            "else block requires a conditional then block"
        );
        assert!(
            self.else_block(then_block).is_none(),
            "else block already present"
        );
        let block = BlockId::from(self.graph.add_node(Block {
            guard: Some(guard),
            body: Vec::new(),
        }));
        self.graph
            .add_edge(then_block.into(), block.into(), BlockEdge::Else);
        block
    }

    /// Removes the last inner block of `outer`. The removed block must be an
    /// empty unconditional leaf.
    pub fn pop_last_inner(&mut self, outer: BlockId) {
        let last = self
            .inner_blocks(outer)
            .last()
            .copied()
            .expect("no inner block to remove");
        assert!(self.guard(last).is_none() && self.body(last).is_empty());
        assert!(self.inner_blocks(last).is_empty());
        self.graph.remove_node(last.into());
    }

    /// Inner blocks of `block` in insertion order.
    pub fn inner_blocks(&self, block: BlockId) -> Vec<BlockId> {
        let mut inner: Vec<(u32, BlockId)> = self
            .graph
            .edges_directed(block.into(), Direction::Outgoing)
            .filter_map(|edge| match edge.weight() {
                BlockEdge::Inner { order } => Some((*order, BlockId::from(edge.target()))),
                BlockEdge::Else => None,
            })
            .collect();
        inner.sort_by_key(|(order, _)| *order);
        inner.into_iter().map(|(_, id)| id).collect()
    }

    /// Enclosing block; `None` for the root. An else block shares the outer
    /// block of its then block.
    pub fn outer(&self, block: BlockId) -> Option<BlockId> {
        let edge = self
            .graph
            .edges_directed(block.into(), Direction::Incoming)
            .next()?;
        match edge.weight() {
            BlockEdge::Inner { .. } => Some(BlockId::from(edge.source())),
            BlockEdge::Else => self.outer(BlockId::from(edge.source())),
        }
    }

    pub fn else_block(&self, block: BlockId) -> Option<BlockId> {
        self.graph
            .edges_directed(block.into(), Direction::Outgoing)
            .find_map(|edge| match edge.weight() {
                BlockEdge::Else => Some(BlockId::from(edge.target())),
                BlockEdge::Inner { .. } => None,
            })
    }

    pub fn guard(&self, block: BlockId) -> Option<InstrRef> {
        self.graph[NodeIndex::from(block)].guard.clone()
    }

    /// Turns an unconditional block into a conditional one. Used when a
    /// freshly opened empty block is reused as a then block.
    pub fn set_guard(&mut self, block: BlockId, guard: InstrRef) {
        let node = &mut self.graph[NodeIndex::from(block)];
        assert!(node.guard.is_none(), "block is already conditional");
        node.guard = Some(guard);
    }

    pub fn body(&self, block: BlockId) -> &[EventRef] {
        &self.graph[NodeIndex::from(block)].body
    }

    /// Appends an event to the block body. Insertion is idempotent: an event
    /// already present (by id) is not inserted again, so re-filtered
    /// condition instructions cannot duplicate body entries.
    pub fn push_event(&mut self, block: BlockId, event: EventRef) {
        let body = &mut self.graph[NodeIndex::from(block)].body;
        if !body.iter().any(|present| present.id() == event.id()) {
            body.push(event);
        }
    }

    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }
}

impl Default for BlockGraph {
    fn default() -> Self {
        BlockGraph::new()
    }
}
