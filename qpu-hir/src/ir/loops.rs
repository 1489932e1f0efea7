use std::collections::{HashMap, HashSet};

use crate::ir::cfg::{ControlFlowGraph, NodeIndex};

/// A strongly connected subgraph reachable from the method's entry, discovered by the
/// Tarjan-style pass below. `nodes` is ordered by discovery; the root of each SCC is its
/// earliest-discovered member, which is [`ControlFlowLoop::root`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowLoop {
    nodes: Vec<NodeIndex>,
}

impl ControlFlowLoop {
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.nodes.contains(&node)
    }

    /// The earliest-discovered member of this loop, i.e. the node the Tarjan walk was rooted at
    /// when this component closed.
    pub fn root(&self) -> NodeIndex {
        *self.nodes.last().expect("loop has at least one node")
    }
}

/// A non-recursive Tarjan strongly-connected-components walk, parameterized over an arbitrary
/// successor function so it can run over either the full CFG or an induced subgraph with one edge
/// removed (used by the recursive nested-loop search below).
///
/// Grounded on the discovery-time / lowest-reachable / node-stack / visit-stack shape of the
/// teacher's non-recursive SCC iterator, monomorphized directly over [`NodeIndex`] instead of a
/// generic graph trait (the teacher's trait abstraction relies on an unstable specialization
/// feature not available on stable Rust).
struct TarjanWalk<'a, F: Fn(NodeIndex) -> Vec<NodeIndex>> {
    successors: &'a F,
    next_visit_num: usize,
    visit_numbers: HashMap<NodeIndex, usize>,
    node_stack: Vec<NodeIndex>,
    visit_stack: Vec<StackFrame>,
}

struct StackFrame {
    node: NodeIndex,
    next_child: usize,
    children: Vec<NodeIndex>,
    min_visited: usize,
}

impl<'a, F: Fn(NodeIndex) -> Vec<NodeIndex>> TarjanWalk<'a, F> {
    fn new(successors: &'a F) -> Self {
        Self {
            successors,
            next_visit_num: 0,
            visit_numbers: HashMap::new(),
            node_stack: Vec::new(),
            visit_stack: Vec::new(),
        }
    }

    fn visit_one(&mut self, node: NodeIndex) {
        let visit_num = self.next_visit_num;
        self.next_visit_num += 1;
        self.visit_numbers.insert(node, visit_num);
        self.node_stack.push(node);
        let children = (self.successors)(node);
        self.visit_stack.push(StackFrame {
            node,
            next_child: 0,
            children,
            min_visited: visit_num,
        });
    }

    /// Runs the walk from `roots`, calling `on_scc` for each completed SCC in pop order (sinks in
    /// the DFS tree close first).
    fn run(mut self, roots: impl IntoIterator<Item = NodeIndex>, mut on_scc: impl FnMut(Vec<NodeIndex>)) {
        for root in roots {
            if self.visit_numbers.contains_key(&root) {
                continue;
            }
            self.visit_one(root);
            self.drain(&mut on_scc);
        }
    }

    fn drain(&mut self, on_scc: &mut impl FnMut(Vec<NodeIndex>)) {
        while !self.visit_stack.is_empty() {
            // Advance the DFS at the top of the stack until it has no unvisited children left.
            loop {
                let frame = self.visit_stack.last_mut().unwrap();
                let Some(&child) = frame.children.get(frame.next_child) else {
                    break;
                };
                frame.next_child += 1;
                match self.visit_numbers.get(&child).copied() {
                    None => {
                        self.visit_one(child);
                    }
                    Some(child_num) => {
                        let frame = self.visit_stack.last_mut().unwrap();
                        frame.min_visited = frame.min_visited.min(child_num);
                    }
                }
            }

            let finished = self.visit_stack.pop().unwrap();
            if let Some(parent) = self.visit_stack.last_mut() {
                parent.min_visited = parent.min_visited.min(finished.min_visited);
            }

            if finished.min_visited != self.visit_numbers[&finished.node] {
                continue;
            }

            let mut scc = Vec::new();
            loop {
                let node = self.node_stack.pop().unwrap();
                *self.visit_numbers.get_mut(&node).unwrap() = usize::MAX;
                let is_root = node == finished.node;
                scc.push(node);
                if is_root {
                    break;
                }
            }
            on_scc(scc);
        }
    }
}

fn has_self_edge(cfg: &ControlFlowGraph, node: NodeIndex) -> bool {
    cfg.successors(node).any(|s| s == node)
}

/// Enumerates natural loops in a [`ControlFlowGraph`].
pub struct LoopFinder;

impl LoopFinder {
    /// `recursively = true`: after identifying an outer SCC, recurse into the subgraph induced by
    /// removing its back edge into the root to surface nested loops, and include one-block
    /// self-loop SCCs. `recursively = false`: only multi-node SCCs are returned; one-block
    /// self-loops are skipped by default but the behavior is exposed via
    /// [`LoopFinder::find_loops_including_single_block`] as an explicit opt-in.
    pub fn find_loops(cfg: &ControlFlowGraph, recursively: bool) -> Vec<ControlFlowLoop> {
        Self::find_loops_with_options(cfg, recursively, false)
    }

    /// As [`Self::find_loops`] with `recursively = false`, but does not skip one-block
    /// self-loops.
    pub fn find_loops_including_single_block(cfg: &ControlFlowGraph) -> Vec<ControlFlowLoop> {
        Self::find_loops_with_options(cfg, false, true)
    }

    fn find_loops_with_options(
        cfg: &ControlFlowGraph,
        recursively: bool,
        include_single_block: bool,
    ) -> Vec<ControlFlowLoop> {
        let all_nodes: Vec<NodeIndex> = cfg.nodes().collect();
        let successors = |n: NodeIndex| cfg.successors(n).collect::<Vec<_>>();

        let mut loops = Vec::new();
        let walk = TarjanWalk::new(&successors);
        walk.run(core::iter::once(cfg.get_start_of_control_flow()).chain(all_nodes.clone()), |scc| {
            let is_cyclic = scc.len() > 1 || has_self_edge(cfg, scc[0]);
            if !is_cyclic {
                return;
            }
            if scc.len() == 1 && !recursively && !include_single_block {
                return;
            }
            let outer = ControlFlowLoop { nodes: scc.clone() };
            if recursively && scc.len() > 1 {
                loops.extend(Self::find_nested_loops(cfg, &outer));
            }
            loops.push(outer);
        });
        log::debug!(target: "loops", "found {} loop(s), recursively={recursively}", loops.len());
        loops
    }

    /// Recurse into the subgraph induced by `outer`'s node set with the back edge into its root
    /// removed, surfacing nested loops.
    fn find_nested_loops(cfg: &ControlFlowGraph, outer: &ControlFlowLoop) -> Vec<ControlFlowLoop> {
        let node_set: HashSet<NodeIndex> = outer.nodes().iter().copied().collect();
        let root = outer.root();
        let back_edge_source = outer
            .nodes()
            .iter()
            .copied()
            .find(|&n| n != root && cfg.successors(n).any(|s| s == root));

        let successors = |n: NodeIndex| {
            cfg.successors(n)
                .filter(|s| node_set.contains(s))
                .filter(|&s| !(Some(n) == back_edge_source && s == root))
                .collect::<Vec<_>>()
        };

        let mut nested = Vec::new();
        let walk = TarjanWalk::new(&successors);
        let roots: Vec<NodeIndex> = outer.nodes().to_vec();
        walk.run(roots, |scc| {
            let is_cyclic = scc.len() > 1 || has_self_edge(cfg, scc[0]);
            if !is_cyclic {
                return;
            }
            // The recursive finder includes one-block SCCs.
            let inner = ControlFlowLoop { nodes: scc.clone() };
            if scc.len() > 1 && scc.len() < outer.len() {
                nested.extend(Self::find_nested_loops(cfg, &inner));
            }
            if inner.len() < outer.len() {
                nested.push(inner);
            }
        });
        nested
    }
}
