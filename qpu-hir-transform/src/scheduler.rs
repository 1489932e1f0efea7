//! The dual-issue instruction scheduler: builds a per-block dependency DAG and emits a linear
//! schedule that fuses independent ADD-ALU/MUL-ALU operations into [`CombinedOperation`] bundles.
//!
//! Grounded on `Scheduler.cpp`'s `InstructionDAG`/`getRoots`/`getPairCandiate`/`doScheduling`.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use qpu_hir::{AluDispatch, AluOperation, CombinedOperation, Instruction, InstructionKind, LocalId, RegisterPort, Value};

/// One node of the per-block dependency DAG: the instruction itself plus the (still-unscheduled)
/// nodes it depends on.
#[derive(Debug, Clone)]
struct DagNode {
    instruction: Instruction,
    /// Original program-order position, used to break emission ties.
    program_order: usize,
    /// Indices (into the DAG's node vec) of instructions this one reads the output of.
    depends_on: SmallVec<[usize; 2]>,
}

/// A per-block dependency DAG over non-Nop instructions. Constructed by reverse iteration: the
/// most-recently-seen definer of each [`LocalId`] becomes the dependency target for every later
/// reader encountered while walking backwards.
#[derive(Debug, Clone)]
pub struct InstructionDag {
    nodes: Vec<Option<DagNode>>,
}

impl InstructionDag {
    /// Builds the DAG for one block's instruction list: a single forward pass threading each
    /// input to the most recent definer of its local seen so far (valid under this IR's
    /// per-block SSA), which is exactly the def-use edge set reverse iteration with a `defs` map
    /// produces, just built in the direction that doesn't need a second pass. Scheduling fences
    /// (`Instruction::is_scheduling_fence`) are excluded: callers are expected to scope
    /// `instructions` to a single fence-free segment (see [`schedule_block`]).
    pub fn build(instructions: &[Instruction]) -> Self {
        let mut nodes: Vec<Option<DagNode>> = Vec::with_capacity(instructions.len());
        let mut most_recent_definer: FxHashMap<LocalId, usize> = FxHashMap::default();

        for (program_order, instruction) in instructions.iter().enumerate() {
            if instruction.is_nop() || instruction.is_label() {
                continue;
            }

            let node_index = nodes.len();
            let mut depends_on = SmallVec::new();
            for input in instruction.inputs() {
                if let Some(local) = input.as_local() {
                    if let Some(&definer) = most_recent_definer.get(&local) {
                        depends_on.push(definer);
                    }
                }
            }

            nodes.push(Some(DagNode {
                instruction: instruction.clone(),
                program_order,
                depends_on,
            }));

            if let Some(output) = instruction.output() {
                most_recent_definer.insert(output, node_index);
            }
        }

        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(Option::is_none)
    }

    /// Roots: nodes still present whose dependencies have all already been removed (emitted).
    fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| {
            let node = n.as_ref()?;
            node.depends_on.iter().all(|&d| self.nodes[d].is_none()).then_some(i)
        })
    }

    fn remove(&mut self, index: usize) -> Instruction {
        self.nodes[index].take().expect("removing an already-removed node").instruction
    }

    fn program_order(&self, index: usize) -> usize {
        self.nodes[index].as_ref().expect("node still present").program_order
    }
}

/// Tries to pair two root Operations per §4.5's pairing rule: opcodes individually dispatchable
/// one on each ALU, no shared register-file port conflict, no incompatible vector-rotation use.
fn try_combine(a: &AluOperation, b: &AluOperation) -> Option<CombinedOperation> {
    let (add_alu, mul_alu) = if dispatchable_as(a, Alu::Add) && dispatchable_as(b, Alu::Mul) {
        (a.clone(), b.clone())
    } else if dispatchable_as(b, Alu::Add) && dispatchable_as(a, Alu::Mul) {
        (b.clone(), a.clone())
    } else {
        return None;
    };

    if ports_conflict(&add_alu, &mul_alu) {
        return None;
    }
    if add_alu.opcode.uses_vector_rotation && mul_alu.opcode.uses_vector_rotation {
        return None;
    }

    Some(CombinedOperation { add_alu, mul_alu })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Alu {
    Add,
    Mul,
}

fn dispatchable_as(op: &AluOperation, alu: Alu) -> bool {
    match (op.opcode.dispatch, alu) {
        (AluDispatch::Either, _) => true,
        (AluDispatch::AddOnly, Alu::Add) => true,
        (AluDispatch::MulOnly, Alu::Mul) => true,
        _ => false,
    }
}

/// True iff both operations read the same register-file port (A or B) in a way that would
/// collide when issued in the same cycle: each ALU gets its own port per input, so a conflict
/// only arises if both require the *same* port for their respective A-operand in the same cycle
/// slot. Modeled conservatively: any shared `(port, input-index)` pairing where both operations'
/// corresponding operand reads from a different local is a conflict; identical reads of the same
/// local through the same port are not (the port simply broadcasts that value to both ALUs).
fn ports_conflict(add: &AluOperation, mul: &AluOperation) -> bool {
    port_conflict_single(add.operand_a_port, &add.operand_a, mul.operand_a_port, &mul.operand_a)
        || match (add.operand_b_port, &add.operand_b, mul.operand_b_port, &mul.operand_b) {
            (Some(ap), Some(av), Some(mp), Some(mv)) => port_conflict_single(ap, av, mp, mv),
            _ => false,
        }
}

fn port_conflict_single(a_port: RegisterPort, a_value: &Value, b_port: RegisterPort, b_value: &Value) -> bool {
    a_port == b_port && a_value != b_value
}

/// Drains `dag`, emitting `CombinedOperation`s for every compatible pair of roots found and
/// single instructions otherwise, until empty. Ties among single-root emissions are broken by
/// original program order. When `exhaustive` is set, every step keeps combining available pairs
/// instead of stopping after the first (Open Question (c)).
pub fn schedule(mut dag: InstructionDag, exhaustive: bool) -> Vec<Instruction> {
    log::trace!(target: "scheduler", "dag={dag:?}");
    let mut out = Vec::new();

    while !dag.is_empty() {
        let roots: Vec<usize> = dag.roots().collect();

        let mut paired_this_step = false;
        let mut consumed = vec![false; roots.len()];

        'pairing: for i in 0..roots.len() {
            if consumed[i] {
                continue;
            }
            let DagNode {
                instruction: Instruction { kind: InstructionKind::Alu(op_i), .. },
                ..
            } = dag.nodes[roots[i]].as_ref().unwrap()
            else {
                continue;
            };

            for j in (i + 1)..roots.len() {
                if consumed[j] {
                    continue;
                }
                let DagNode {
                    instruction: Instruction { kind: InstructionKind::Alu(op_j), .. },
                    ..
                } = dag.nodes[roots[j]].as_ref().unwrap()
                else {
                    continue;
                };

                if let Some(combined) = try_combine(op_i, op_j) {
                    consumed[i] = true;
                    consumed[j] = true;
                    dag.remove(roots[i]);
                    dag.remove(roots[j]);
                    log::debug!(target: "scheduler", "combined {} + {} into one dual-issue bundle", combined.add_alu.opcode.mnemonic, combined.mul_alu.opcode.mnemonic);
                    out.push(Instruction::new(InstructionKind::Combined(combined)));
                    paired_this_step = true;
                    if !exhaustive {
                        break 'pairing;
                    }
                    break;
                }
            }
        }

        if paired_this_step {
            continue;
        }

        // No pair available this step: emit the earliest-program-order remaining root.
        let next = roots
            .iter()
            .zip(consumed.iter())
            .filter(|&(_, &c)| !c)
            .map(|(&r, _)| r)
            .min_by_key(|&r| dag.program_order(r))
            .expect("non-empty DAG always has at least one root");
        out.push(dag.remove(next));
    }

    out
}

/// Splits a block's body into maximal runs of instructions with no scheduling fence in between;
/// each run is scheduled independently and fences are re-inserted between runs in their original
/// position, preserving relative fence ordering per §4.5's "never crosses... leaves ... ordering
/// untouched" rule.
pub fn schedule_block(instructions: &[Instruction], exhaustive: bool) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(instructions.len());
    let mut run_start = 0;

    for (i, inst) in instructions.iter().enumerate() {
        if inst.is_scheduling_fence() {
            out.extend(schedule(InstructionDag::build(&instructions[run_start..i]), exhaustive));
            out.push(inst.clone());
            run_start = i + 1;
        }
    }
    out.extend(schedule(InstructionDag::build(&instructions[run_start..]), exhaustive));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpu_hir::{AluOpcode, Value};
    use qpu_hir_symbol::Symbol;

    fn add_op(result: LocalId, a: Value, b: Value) -> Instruction {
        Instruction::new(InstructionKind::Alu(AluOperation {
            opcode: AluOpcode { mnemonic: Symbol::intern("add"), dispatch: AluDispatch::AddOnly, uses_vector_rotation: false },
            result,
            operand_a: a,
            operand_a_port: RegisterPort::A,
            operand_b: Some(b),
            operand_b_port: Some(RegisterPort::B),
        }))
    }

    fn mul_op(result: LocalId, a: Value, b: Value) -> Instruction {
        Instruction::new(InstructionKind::Alu(AluOperation {
            opcode: AluOpcode { mnemonic: Symbol::intern("mul"), dispatch: AluDispatch::MulOnly, uses_vector_rotation: false },
            result,
            operand_a: a,
            operand_a_port: RegisterPort::A,
            operand_b: Some(b),
            operand_b_port: Some(RegisterPort::B),
        }))
    }

    #[test]
    fn independent_add_and_mul_fuse_into_one_combined_op() {
        // Scenario 4: `add a,b,c` and `mul d,e,f`, independent.
        let a = LocalId(0);
        let d = LocalId(1);
        let instructions = vec![
            add_op(a, Value::Local(LocalId(10)), Value::Local(LocalId(11))),
            mul_op(d, Value::Local(LocalId(12)), Value::Local(LocalId(13))),
        ];
        let scheduled = schedule_block(&instructions, false);
        assert_eq!(scheduled.len(), 1);
        assert!(matches!(scheduled[0].kind, InstructionKind::Combined(_)));
    }

    #[test]
    fn dependent_ops_are_not_paired() {
        let a = LocalId(0);
        let instructions = vec![
            add_op(a, Value::Local(LocalId(10)), Value::Local(LocalId(11))),
            mul_op(LocalId(1), Value::Local(a), Value::Local(LocalId(13))),
        ];
        let scheduled = schedule_block(&instructions, false);
        assert_eq!(scheduled.len(), 2);
        assert!(scheduled.iter().all(|i| !matches!(i.kind, InstructionKind::Combined(_))));
    }

    #[test]
    fn fences_are_never_reordered_relative_to_each_other() {
        use qpu_hir::MemoryOp;

        let mem = |op| {
            Instruction::new(InstructionKind::Memory(qpu_hir::MemoryInstruction {
                op,
                source: Value::Local(LocalId(20)),
                destination: Value::Local(LocalId(21)),
                entry_count: 1,
                guarded_by_mutex: false,
            }))
        };
        let instructions = vec![mem(MemoryOp::Read), mem(MemoryOp::Write)];
        let scheduled = schedule_block(&instructions, false);
        assert_eq!(scheduled.len(), 2);
        assert!(matches!(
            &scheduled[0].kind,
            InstructionKind::Memory(m) if m.op == MemoryOp::Read
        ));
        assert!(matches!(
            &scheduled[1].kind,
            InstructionKind::Memory(m) if m.op == MemoryOp::Write
        ));
    }
}
