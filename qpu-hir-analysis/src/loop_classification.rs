use qpu_hir::{ControlFlowGraph, ControlFlowLoop, NodeIndex};
use rustc_hash::FxHashMap;

/// A block's role within the loop it belongs to.
///
/// For nested loops a block only ever gets the role it plays in its *innermost* enclosing loop:
/// a block that is the latch of an inner loop but merely body of the outer one is reported as
/// [`LoopRole::Latch`], not [`LoopRole::Body`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopRole {
    /// The loop's root, i.e. its earliest-discovered member ([`ControlFlowLoop::root`]).
    Header,
    /// A node with an edge back to the loop's header.
    Latch,
    /// A node in the loop with at least one successor outside the loop's node set.
    Exit,
    /// Any other node belonging to the loop.
    Body,
}

/// Classifies every block that belongs to at least one loop in `loops` by the role it plays in
/// its innermost enclosing loop.
///
/// `loops` is expected in the order [`qpu_hir::LoopFinder::find_loops`] returns them (SCCs in pop
/// order, i.e. innermost loops first when `recursively` was set); classification is applied in
/// that order and never overwrites a block already classified by an earlier (hence more deeply
/// nested) loop.
pub fn classify_blocks(cfg: &ControlFlowGraph, loops: &[ControlFlowLoop]) -> FxHashMap<NodeIndex, LoopRole> {
    let mut roles = FxHashMap::default();

    for loop_ in loops {
        let header = loop_.root();
        let members: std::collections::HashSet<NodeIndex> = loop_.nodes().iter().copied().collect();

        for &node in loop_.nodes() {
            if roles.contains_key(&node) {
                continue;
            }

            let role = if node == header {
                LoopRole::Header
            } else if cfg.successors(node).any(|s| s == header) {
                LoopRole::Latch
            } else if cfg.successors(node).any(|s| !members.contains(&s)) {
                LoopRole::Exit
            } else {
                LoopRole::Body
            };
            roles.insert(node, role);
        }
    }

    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpu_hir::{BasicBlock, Branch, Condition, Instruction, InstructionKind, LoopFinder, Method};
    use qpu_hir_symbol::Symbol;

    fn branch(target: Symbol, condition: Condition) -> Instruction {
        Instruction::new(InstructionKind::Branch(Branch { target, condition }))
    }

    #[test]
    fn two_block_loop_classifies_header_and_latch() {
        let mut method = Method::new(Symbol::intern("k"), true);
        let head_label = Symbol::intern("head");
        let body_label = Symbol::intern("body");
        method.add_block(BasicBlock::new(head_label));
        let mut body = BasicBlock::new(body_label);
        body.push(branch(head_label, Condition::NotZero));
        method.add_block(body);
        let cfg = ControlFlowGraph::build(&method);

        let loops = LoopFinder::find_loops(&cfg, false);
        let roles = classify_blocks(&cfg, &loops);

        let head_node = cfg.node_of(method.find_block_by_label(head_label).unwrap());
        let body_node = cfg.node_of(method.find_block_by_label(body_label).unwrap());
        assert_eq!(roles[&head_node], LoopRole::Header);
        assert_eq!(roles[&body_node], LoopRole::Latch);
    }

    #[test]
    fn block_with_edge_leaving_loop_is_an_exit() {
        // head -> mid (fallthrough); mid -> after (conditional branch, leaves the loop) and
        // mid -> tail (fallthrough, stays in the loop); tail -> head (branch, latch).
        let mut method = Method::new(Symbol::intern("k"), true);
        let head_label = Symbol::intern("head");
        let mid_label = Symbol::intern("mid");
        let tail_label = Symbol::intern("tail");
        let after_label = Symbol::intern("after");

        method.add_block(BasicBlock::new(head_label));
        let mut mid = BasicBlock::new(mid_label);
        mid.push(branch(after_label, Condition::Zero));
        method.add_block(mid);
        let mut tail = BasicBlock::new(tail_label);
        tail.push(branch(head_label, Condition::Always));
        method.add_block(tail);
        method.add_block(BasicBlock::new(after_label));

        let cfg = ControlFlowGraph::build(&method);
        let loops = LoopFinder::find_loops(&cfg, false);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 3);
        let roles = classify_blocks(&cfg, &loops);

        let head_node = cfg.node_of(method.find_block_by_label(head_label).unwrap());
        let mid_node = cfg.node_of(method.find_block_by_label(mid_label).unwrap());
        let tail_node = cfg.node_of(method.find_block_by_label(tail_label).unwrap());
        assert_eq!(roles[&head_node], LoopRole::Header);
        assert_eq!(roles[&mid_node], LoopRole::Exit);
        assert_eq!(roles[&tail_node], LoopRole::Latch);
    }
}
