use std::io::Write as _;

use petgraph::{
    stable_graph::StableDiGraph,
    visit::{EdgeRef, IntoEdgeReferences},
    Direction,
};
use rustc_hash::FxHashMap;

use crate::ir::{
    block::BlockId,
    instruction::{Condition, InstructionKind},
    method::Method,
};

pub type NodeIndex = petgraph::stable_graph::NodeIndex<u32>;

/// The transition a [`CFGEdge`] carries: the instruction that causes it (a branch), or `None` for
/// a fall-through.
#[derive(Debug, Clone)]
pub struct CfgEdge {
    pub is_back_edge: bool,
    /// Index (within the source block's instruction list) of the branch that causes this
    /// transition, or `None` if it is a fall-through.
    pub terminator: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum CfgError {
    #[error("control-flow graph has more than one block with no outgoing edge")]
    AmbiguousExit,
}

/// Basic-block successor/predecessor structure for one [`Method`].
///
/// Implemented as an arena graph with stable node indices: nodes own the block identity, edges
/// reference node indices rather than the nodes themselves.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    graph: StableDiGraph<BlockId, CfgEdge>,
    node_of_block: FxHashMap<BlockId, NodeIndex>,
    entry: NodeIndex,
}

impl ControlFlowGraph {
    /// Build the CFG from `method`'s blocks, inspecting each block's trailing branch and
    /// fall-through policy.
    pub fn build(method: &Method) -> Self {
        let mut graph = StableDiGraph::new();
        let mut node_of_block = FxHashMap::default();

        for (id, _) in method.blocks() {
            let node = graph.add_node(id);
            node_of_block.insert(id, node);
        }

        for (id, block) in method.blocks() {
            let source_node = node_of_block[&id];

            if let Some(terminator_index) = block
                .instructions()
                .iter()
                .position(|inst| matches!(inst.kind, InstructionKind::Branch(_)))
            {
                let InstructionKind::Branch(branch) = &block.instructions()[terminator_index].kind else {
                    unreachable!()
                };
                if let Some(target_id) = method.find_block_by_label(branch.target) {
                    let target_node = node_of_block[&target_id];
                    graph.add_edge(
                        source_node,
                        target_node,
                        CfgEdge {
                            is_back_edge: false,
                            terminator: Some(terminator_index),
                        },
                    );
                }
            }

            if block.falls_through() {
                let next_index = id.0 as usize + 1;
                if next_index < method.block_count() {
                    let next_id = BlockId(next_index as u32);
                    let target_node = node_of_block[&next_id];
                    graph.add_edge(
                        source_node,
                        target_node,
                        CfgEdge {
                            is_back_edge: false,
                            terminator: None,
                        },
                    );
                }
            }
        }

        let entry = node_of_block[&method.entry_block()];
        let mut cfg = Self {
            graph,
            node_of_block,
            entry,
        };
        cfg.mark_back_edges();
        log::debug!(target: "cfg", "built CFG for {}: {} blocks, {} edges", method.name, cfg.node_count(), cfg.graph.edge_count());
        cfg
    }

    /// An edge `(u -> v)` is a back edge iff `v` is an ancestor of `u` in a DFS from the entry
    ///. Computed with an explicit stack to avoid recursion depth
    /// concerns on deeply-nested control flow.
    fn mark_back_edges(&mut self) {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: FxHashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut back_edges = Vec::new();

        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(
            self.entry,
            self.graph.neighbors_directed(self.entry, Direction::Outgoing).collect(),
        )];
        color.insert(self.entry, Color::Gray);

        while let Some((node, children)) = stack.last_mut() {
            let node = *node;
            match children.pop() {
                Some(child) => match color.get(&child).copied().unwrap_or(Color::White) {
                    Color::White => {
                        color.insert(child, Color::Gray);
                        let grandchildren = self.graph.neighbors_directed(child, Direction::Outgoing).collect();
                        stack.push((child, grandchildren));
                    }
                    Color::Gray => {
                        back_edges.push((node, child));
                    }
                    Color::Black => {}
                },
                None => {
                    color.insert(node, Color::Black);
                    stack.pop();
                }
            }
        }

        for (u, v) in &back_edges {
            if let Some(edge) = self.graph.find_edge(*u, *v) {
                self.graph[edge].is_back_edge = true;
            }
        }
        if !back_edges.is_empty() {
            log::trace!(target: "cfg", "marked {} back edge(s)", back_edges.len());
        }
    }

    pub fn node_of(&self, block: BlockId) -> NodeIndex {
        self.node_of_block[&block]
    }

    pub fn block_of(&self, node: NodeIndex) -> BlockId {
        self.graph[node]
    }

    pub fn get_start_of_control_flow(&self) -> NodeIndex {
        self.entry
    }

    /// Returns the unique sink node (no outgoing edges), or [`CfgError::AmbiguousExit`] if more
    /// than one block qualifies.
    pub fn get_end_of_control_flow(&self) -> Result<NodeIndex, CfgError> {
        let mut sinks = self
            .graph
            .node_indices()
            .filter(|&n| self.graph.neighbors_directed(n, Direction::Outgoing).next().is_none());
        let first = sinks.next();
        if sinks.next().is_some() {
            log::debug!(target: "cfg", "getEndOfControlFlow: more than one sink node, ambiguous exit");
            return Err(CfgError::AmbiguousExit);
        }
        first.ok_or(CfgError::AmbiguousExit)
    }

    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Direction::Outgoing)
    }

    pub fn predecessors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Direction::Incoming)
    }

    pub fn edge_between(&self, from: NodeIndex, to: NodeIndex) -> Option<&CfgEdge> {
        self.graph.find_edge(from, to).map(|e| &self.graph[e])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// O(degree): add a node for `new_block`; it starts with no edges.
    pub fn update_on_block_insertion(&mut self, new_block: BlockId) -> NodeIndex {
        let node = self.graph.add_node(new_block);
        self.node_of_block.insert(new_block, node);
        node
    }

    /// O(degree): remove `block`'s node and every incident edge.
    pub fn update_on_block_removal(&mut self, block: BlockId) {
        if let Some(node) = self.node_of_block.remove(&block) {
            self.graph.remove_node(node);
        }
    }

    /// O(degree): add (or mark) an edge for a newly-inserted branch from `source` to `target`.
    pub fn update_on_branch_insertion(&mut self, source: BlockId, target: BlockId, terminator: usize) {
        let source_node = self.node_of_block[&source];
        let target_node = self.node_of_block[&target];
        self.graph.add_edge(
            source_node,
            target_node,
            CfgEdge {
                is_back_edge: false,
                terminator: Some(terminator),
            },
        );
        self.mark_back_edges();
    }

    /// O(degree): remove the edge caused by removing a branch from `source` to `target`.
    pub fn update_on_branch_removal(&mut self, source: BlockId, target: BlockId) {
        let source_node = self.node_of_block[&source];
        let target_node = self.node_of_block[&target];
        if let Some(edge) = self.graph.find_edge(source_node, target_node) {
            self.graph.remove_edge(edge);
        }
    }

    /// Render this graph as GraphViz `dot` syntax.
    ///
    /// Unreachable blocks (no incoming edges and not the entry) are rendered as isolated nodes
    /// with a comment, as a diagnostic aid rather than an error.
    pub fn dump_graph(&self, method: &Method, include_constant_loads: bool) -> String {
        let mut out = String::new();
        out.push_str("digraph cfg {\n");
        for node in self.graph.node_indices() {
            let block = self.graph[node];
            let label = method.block(block).label;
            let unreachable =
                node != self.entry && self.graph.neighbors_directed(node, Direction::Incoming).next().is_none();
            if unreachable {
                out.push_str(&format!("  // unreachable: {label}\n"));
            }
            out.push_str(&format!("  \"{label}\" [label=\"{label}\"];\n"));
        }
        for edge in self.graph.edge_references() {
            let from = method.block(self.graph[edge.source()]).label;
            let to = method.block(self.graph[edge.target()]).label;
            let style = if edge.weight().is_back_edge { " [style=dashed]" } else { "" };
            out.push_str(&format!("  \"{from}\" -> \"{to}\"{style};\n"));
        }
        if include_constant_loads {
            out.push_str("  // constant-load instructions omitted from this logical dump\n");
        }
        out.push_str("}\n");
        out
    }

    /// Write [`Self::dump_graph`]'s output to `path`.
    pub fn dump_graph_to_file(
        &self,
        method: &Method,
        path: impl AsRef<std::path::Path>,
        include_constant_loads: bool,
    ) -> std::io::Result<()> {
        let dot = self.dump_graph(method, include_constant_loads);
        let mut file = std::fs::File::create(path)?;
        file.write_all(dot.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        block::BasicBlock,
        instruction::{Branch, Instruction, InstructionKind},
    };
    use qpu_hir_symbol::Symbol;

    fn method_with_diamond() -> Method {
        // Block order is entry(0), A(1), B(2), C(3): entry falls through to the textually next
        // block A, and explicitly (conditionally) branches to B; A unconditionally branches to
        // C; B, sitting right before C, falls through to it. Four edges, unique exit C.
        let mut method = Method::new(Symbol::intern("kernel"), true);
        let entry_label = Symbol::intern("entry");
        let a_label = Symbol::intern("A");
        let b_label = Symbol::intern("B");
        let c_label = Symbol::intern("C");

        let mut entry = BasicBlock::new(entry_label);
        entry.push(Instruction::new(InstructionKind::Branch(Branch {
            target: b_label,
            condition: Condition::Zero,
        })));
        method.add_block(entry);

        let mut a = BasicBlock::new(a_label);
        a.push(Instruction::new(InstructionKind::Branch(Branch {
            target: c_label,
            condition: Condition::Always,
        })));
        method.add_block(a);

        let b = BasicBlock::new(b_label);
        method.add_block(b);

        let c = BasicBlock::new(c_label);
        method.add_block(c);

        method
    }

    #[test]
    fn diamond_cfg_has_four_edges_and_unique_exit() {
        let method = method_with_diamond();
        let cfg = ControlFlowGraph::build(&method);
        assert_eq!(cfg.graph.edge_count(), 4);
        let exit = cfg.get_end_of_control_flow().expect("unique exit");
        assert_eq!(cfg.block_of(exit), BlockId(3));
    }

    #[test]
    fn conditional_branch_block_has_two_outgoing_edges() {
        let method = method_with_diamond();
        let cfg = ControlFlowGraph::build(&method);
        let entry_node = cfg.node_of(BlockId(0));
        assert_eq!(cfg.successors(entry_node).count(), 2);
    }

    #[test]
    fn ambiguous_exit_detected_for_two_sinks() {
        // entry unconditionally branches to ret1, so it does not fall through to anything and is
        // not itself a sink. ret2 is an unreachable, isolated sink. Both ret1 and ret2 have no
        // outgoing edges, so the graph has two sinks and no unique exit.
        let mut method = Method::new(Symbol::intern("helper"), false);
        let ret1_label = Symbol::intern("ret1");
        let mut entry = BasicBlock::new(Symbol::intern("entry"));
        entry.push(Instruction::new(InstructionKind::Branch(Branch {
            target: ret1_label,
            condition: Condition::Always,
        })));
        method.add_block(entry);
        method.add_block(BasicBlock::new(ret1_label));
        method.add_block(BasicBlock::new(Symbol::intern("ret2")));
        let cfg = ControlFlowGraph::build(&method);
        assert!(matches!(cfg.get_end_of_control_flow(), Err(CfgError::AmbiguousExit)));
    }

    #[test]
    fn self_loop_back_edge_is_marked() {
        let mut method = Method::new(Symbol::intern("loopy"), true);
        let head_label = Symbol::intern("head");
        let mut head = BasicBlock::new(head_label);
        head.push(Instruction::new(InstructionKind::Branch(Branch {
            target: head_label,
            condition: Condition::NotZero,
        })));
        method.add_block(head);
        let cfg = ControlFlowGraph::build(&method);
        let node = cfg.node_of(BlockId(0));
        let edge = cfg.edge_between(node, node).expect("self edge");
        assert!(edge.is_back_edge);
    }
}
