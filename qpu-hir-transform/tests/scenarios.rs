//! End-to-end coverage of the six concrete scenarios, run against a hand-built `Method` rather
//! than the scattered unit fixtures the individual passes carry, to catch anything that only
//! shows up once a whole block (or CFG) is threaded through.

use qpu_hir::{
    AluDispatch, AluOpcode, AluOperation, BasicBlock, Branch, Condition, ControlFlowGraph, Instruction,
    InstructionKind, Literal, LocalOrigin, LocalPool, MemoryInstruction, MemoryOp, Method, MoveOperation,
    RegisterPort, Value,
};
use qpu_hir_analysis::{AccessOperand, AccessRangeAnalyzer, IntegerRange};
use qpu_hir_symbol::Symbol;
use qpu_hir_type::{AddressSpace, ArrayType, DataType, I32, I64};
use qpu_hir_transform::{
    rewrite_read_then_write_to_copy, schedule_block, split_read_if_struct_aliased, MemoryClassifier, Realization,
    VpmManager,
};

/// Scenario 1: `r = read *p; q = r & 0xFFFFFFFF; write *out = q`, p struct-aliased to i64.
/// Splitting the read must leave the lower half readable through the original destination local
/// and rewrite the truncating mask into a plain move of it.
#[test]
fn scenario_1_struct_aliased_64_bit_read_splits_and_rewrites_its_mask_reader() {
    let mut method = Method::new(Symbol::intern("kernel"), true);
    let mut block = BasicBlock::new(Symbol::intern("entry"));

    let p = Value::Local(method.locals.add_new_local(
        DataType::Scalar(I64),
        "%p",
        LocalOrigin::Parameter { address_space: AddressSpace::Global },
    ));
    let r = method.locals.add_new_local(DataType::Scalar(I64), "%r", LocalOrigin::Transient);
    let q = method.locals.add_new_local(DataType::Scalar(I32), "%q", LocalOrigin::Transient);
    let out = Value::Local(method.locals.add_new_local(
        DataType::Scalar(I32),
        "%out",
        LocalOrigin::Parameter { address_space: AddressSpace::Global },
    ));

    block.push(Instruction::new(InstructionKind::Memory(MemoryInstruction {
        op: MemoryOp::Read,
        source: p,
        destination: Value::Local(r),
        entry_count: 1,
        guarded_by_mutex: false,
    })));
    block.push(Instruction::new(InstructionKind::Alu(AluOperation {
        opcode: AluOpcode { mnemonic: Symbol::intern("and"), dispatch: AluDispatch::Either, uses_vector_rotation: false },
        result: q,
        operand_a: Value::Local(r),
        operand_a_port: RegisterPort::A,
        operand_b: Some(Value::Literal(Literal::from_u32(0xFFFF_FFFF))),
        operand_b_port: Some(RegisterPort::B),
    })));
    block.push(Instruction::new(InstructionKind::Memory(MemoryInstruction {
        op: MemoryOp::Write,
        source: Value::Local(q),
        destination: out,
        entry_count: 1,
        guarded_by_mutex: false,
    })));
    method.add_block(block);

    // The read sits at index 1 within the block's raw instruction list (index 0 is the label).
    let mut instructions = method.block(method.entry_block()).instructions().to_vec();
    split_read_if_struct_aliased(&mut instructions, 1, &mut method.locals).expect("recognized reader pattern");

    // read_lo, read_hi, move(q <- r_lo), write — the label plus four body instructions.
    assert_eq!(instructions.len(), 5);
    let InstructionKind::Memory(lo) = &instructions[1].kind else { panic!("expected lo read") };
    assert_eq!(lo.op, MemoryOp::Read);
    assert_eq!(lo.destination, Value::Local(r));
    let InstructionKind::Memory(hi) = &instructions[2].kind else { panic!("expected hi read") };
    assert_eq!(hi.op, MemoryOp::Read);
    let InstructionKind::Move(mv) = &instructions[3].kind else { panic!("mask rewritten to a move") };
    assert_eq!(mv.source, Value::Local(r));
    assert_eq!(mv.result, q);
    let InstructionKind::Memory(write) = &instructions[4].kind else { panic!("expected the trailing write") };
    assert_eq!(write.op, MemoryOp::Write);
}

/// Scenario 2: `__constant int g[4] = {1,2,3,4}; x = g[2]`, `2` a literal index.
#[test]
fn scenario_2_constant_literal_index_lowers_to_register_readonly_with_precomputed_value() {
    let mut vpm = VpmManager::new(64);
    let mut classifier = MemoryClassifier::new(&mut vpm, 64);

    let mut locals = LocalPool::new();
    let initializer = qpu_hir::GlobalInitializer::Compound([1, 2, 3, 4].map(Literal::from_i64).to_vec());
    let g = qpu_hir::Local::new(
        Symbol::intern("g"),
        DataType::Array(ArrayType::new(DataType::Scalar(I32), 4)),
        LocalOrigin::Global { constant: true, initializer: Some(initializer.clone()) },
    );
    let owner = locals.add_new_local(
        DataType::Array(ArrayType::new(DataType::Scalar(I32), 4)),
        "g",
        LocalOrigin::Global { constant: true, initializer: Some(initializer) },
    );

    let range = AccessRangeAnalyzer::analyze(owner, &[AccessOperand::literal(Value::Literal(Literal::from_i64(2)))]);
    assert_eq!(range.offset_range, Some(IntegerRange::exact(2)));

    let info = classifier
        .classify(&g, owner, true, &[range])
        .expect("constant globals never fail to classify");

    assert_eq!(info.realization, Realization::QpuRegisterReadonly);
    assert_eq!(info.precomputed_value, Some(Value::Literal(Literal::from_i64(3))));
}

/// Scenario 3: `__local int buf[8]; buf[tid] = ...; use(buf[tid+1])`, tid uniform in [0,7].
#[test]
fn scenario_3_uniform_local_array_access_caches_into_vpm_with_nine_vector_range() {
    let mut vpm = VpmManager::new(64);
    let mut classifier = MemoryClassifier::new(&mut vpm, 64);

    let mut locals = LocalPool::new();
    let buf = qpu_hir::Local::new(
        Symbol::intern("buf"),
        DataType::pointer(AddressSpace::Local, DataType::Array(ArrayType::new(DataType::Scalar(I32), 8))),
        LocalOrigin::Parameter { address_space: AddressSpace::Local },
    );
    let owner = locals.add_new_local(buf.ty.clone(), "buf", LocalOrigin::Parameter { address_space: AddressSpace::Local });
    let tid = Value::Local(locals.add_new_local(DataType::Scalar(I32), "%tid", LocalOrigin::Transient));

    let write = AccessRangeAnalyzer::analyze(owner, &[AccessOperand::dynamic_with_range(tid.clone(), IntegerRange::new(0, 7))]);
    let read = AccessRangeAnalyzer::analyze(
        owner,
        &[
            AccessOperand::dynamic_with_range(tid, IntegerRange::new(0, 7)),
            AccessOperand::literal(Value::Literal(Literal::from_i64(1))),
        ],
    );

    let info = classifier.classify(&buf, owner, false, &[write, read]).expect("uniform range caches cleanly");
    assert_eq!(info.realization, Realization::VpmSharedAccess);
    assert_eq!(info.cached_ranges.len(), 1);
    assert_eq!(info.cached_ranges[0].offset, IntegerRange::new(0, 8));
    assert_eq!(info.cached_ranges[0].offset.len(), 9);
    assert_eq!(info.area.expect("reserved a VPM area").size_vectors, 9);
}

/// Scenario 4: a block with two independent ops `add a,b,c` and `mul d,e,f` fuses into a single
/// `CombinedOperation`, leaving nothing else to schedule.
#[test]
fn scenario_4_independent_add_and_mul_fuse_into_one_dual_issue_bundle() {
    use qpu_hir::LocalId;

    let a_result = LocalId(100);
    let d_result = LocalId(101);
    let instructions = vec![
        Instruction::new(InstructionKind::Alu(AluOperation {
            opcode: AluOpcode { mnemonic: Symbol::intern("add"), dispatch: AluDispatch::AddOnly, uses_vector_rotation: false },
            result: a_result,
            operand_a: Value::Local(LocalId(1)),
            operand_a_port: RegisterPort::A,
            operand_b: Some(Value::Local(LocalId(2))),
            operand_b_port: Some(RegisterPort::B),
        })),
        Instruction::new(InstructionKind::Alu(AluOperation {
            opcode: AluOpcode { mnemonic: Symbol::intern("mul"), dispatch: AluDispatch::MulOnly, uses_vector_rotation: false },
            result: d_result,
            operand_a: Value::Local(LocalId(3)),
            operand_a_port: RegisterPort::A,
            operand_b: Some(Value::Local(LocalId(4))),
            operand_b_port: Some(RegisterPort::B),
        })),
    ];

    let scheduled = schedule_block(&instructions, false);
    assert_eq!(scheduled.len(), 1);
    let InstructionKind::Combined(combined) = &scheduled[0].kind else { panic!("expected one combined bundle") };
    assert_eq!(combined.add_alu.result, a_result);
    assert_eq!(combined.mul_alu.result, d_result);
}

/// Scenario 5: entry->A, entry->B, A->C (conditional), B falls through to C. Four edges, unique
/// exit C, edge (entry->A) carries no terminator (fall-through), edge (entry->B) is the branch.
#[test]
fn scenario_5_diamond_cfg_has_four_edges_one_terminated_edge_and_a_unique_exit() {
    let mut method = Method::new(Symbol::intern("kernel"), true);
    let a_label = Symbol::intern("A");
    let b_label = Symbol::intern("B");
    let c_label = Symbol::intern("C");

    let mut entry = BasicBlock::new(Symbol::intern("entry"));
    entry.push(Instruction::new(InstructionKind::Branch(Branch { target: b_label, condition: Condition::Zero })));
    method.add_block(entry);

    let mut a = BasicBlock::new(a_label);
    a.push(Instruction::new(InstructionKind::Branch(Branch { target: c_label, condition: Condition::Always })));
    method.add_block(a);

    method.add_block(BasicBlock::new(b_label));
    method.add_block(BasicBlock::new(c_label));

    let cfg = ControlFlowGraph::build(&method);
    assert_eq!(cfg.node_count(), 4);

    let entry_node = cfg.node_of(method.entry_block());
    let a_node = cfg.node_of(method.find_block_by_label(a_label).unwrap());
    let b_node = cfg.node_of(method.find_block_by_label(b_label).unwrap());
    let c_node = cfg.node_of(method.find_block_by_label(c_label).unwrap());

    let mut edge_count = 0;
    for node in cfg.nodes() {
        edge_count += cfg.successors(node).count();
    }
    assert_eq!(edge_count, 4);

    assert!(cfg.edge_between(entry_node, a_node).expect("fall-through to A").terminator.is_none());
    assert!(cfg.edge_between(entry_node, b_node).expect("branch to B").terminator.is_some());
    assert!(cfg.edge_between(b_node, c_node).expect("fall-through to C").terminator.is_none());
    assert!(cfg.edge_between(a_node, c_node).expect("branch to C").terminator.is_some());

    let exit = cfg.get_end_of_control_flow().expect("unique exit");
    assert_eq!(cfg.block_of(exit), method.find_block_by_label(c_label).unwrap());
}

/// Scenario 6: a kernel with a GLOBAL non-readonly pointer parameter used only in a write stays
/// on the uncached DMA path both ways.
#[test]
fn scenario_6_global_writeonly_pointer_stays_on_ram_read_write_vpm_both_ways() {
    let mut vpm = VpmManager::new(64);
    let mut classifier = MemoryClassifier::new(&mut vpm, 64);

    let p = qpu_hir::Local::new(
        Symbol::intern("p"),
        DataType::pointer(AddressSpace::Global, DataType::Scalar(I32)),
        LocalOrigin::Parameter { address_space: AddressSpace::Global },
    );
    let owner = LocalPool::new().add_new_local(p.ty.clone(), "p", LocalOrigin::Parameter { address_space: AddressSpace::Global });

    let info = classifier.classify(&p, owner, false, &[]).expect("global params always classify");
    assert_eq!(info.realization, Realization::RamReadWriteVpm);
}

/// A read-then-write pair inside a realistic block (label + unrelated prior instruction) still
/// collapses into a COPY, matching §4.4's rewrite end to end rather than on a bare two-instruction
/// slice.
#[test]
fn read_then_write_collapses_into_copy_inside_a_full_block() {
    let mut method = Method::new(Symbol::intern("kernel"), true);
    let mut block = BasicBlock::new(Symbol::intern("entry"));

    let src = Value::Local(method.locals.add_new_local(
        DataType::Scalar(I32),
        "%src",
        LocalOrigin::Parameter { address_space: AddressSpace::Global },
    ));
    let tmp = method.locals.add_new_local(DataType::Scalar(I32), "%tmp", LocalOrigin::Transient);
    let out = Value::Local(method.locals.add_new_local(
        DataType::Scalar(I32),
        "%out",
        LocalOrigin::Parameter { address_space: AddressSpace::Global },
    ));
    let unrelated = method.locals.add_new_local(DataType::Scalar(I32), "%unrelated", LocalOrigin::Transient);

    block.push(Instruction::new(InstructionKind::Move(MoveOperation {
        result: unrelated,
        source: Value::Literal(Literal::from_i64(0)),
    })));
    block.push(Instruction::new(InstructionKind::Memory(MemoryInstruction {
        op: MemoryOp::Read,
        source: src.clone(),
        destination: Value::Local(tmp),
        entry_count: 1,
        guarded_by_mutex: false,
    })));
    block.push(Instruction::new(InstructionKind::Memory(MemoryInstruction {
        op: MemoryOp::Write,
        source: Value::Local(tmp),
        destination: out.clone(),
        entry_count: 1,
        guarded_by_mutex: false,
    })));
    method.add_block(block);

    let mut instructions = method.block(method.entry_block()).instructions().to_vec();
    // Read sits at index 2 (label, unrelated move, read).
    assert!(rewrite_read_then_write_to_copy(&mut instructions, 2));
    assert_eq!(instructions.len(), 3);
    let InstructionKind::Memory(copy) = &instructions[2].kind else { panic!("expected a COPY") };
    assert_eq!(copy.op, MemoryOp::Copy);
    assert_eq!(copy.source, src);
    assert_eq!(copy.destination, out);
}
