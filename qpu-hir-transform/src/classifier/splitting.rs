use qpu_hir::{
    AluDispatch, AluOpcode, AluOperation, Condition, Decorations, Instruction, InstructionKind, Literal, LocalId,
    LocalOrigin, LocalPool, MemoryInstruction, MemoryOp, MoveOperation, RegisterPort, Value,
};
use qpu_hir_symbol::Symbol;
use qpu_hir_type::{DataType, I32};

/// How far the read-then-write-to-copy rewrite (§4.4) looks ahead for a matching writer before
/// giving up.
pub const COPY_REWRITE_LOOKAHEAD: usize = 16;

/// Splits a 64-bit write whose source's upper word is provably zero into two consecutive 32-bit
/// writes at offsets 0 and 4 from the destination address, sharing the original's mutex guard,
/// condition and decorations.
///
/// `is_upper_word_zero` is the caller-supplied proof: either the source is a literal with
/// [`Literal::upper_word_is_zero`], or it is known (by whatever dataflow fact the caller already
/// holds) to be a zero-extension of a 32-bit value. Returns the replacement pair, or `None` if
/// `instruction` isn't a splittable 64-bit write.
pub fn split_write_if_upper_word_zero(
    instruction: &Instruction,
    locals: &mut LocalPool,
    is_upper_word_zero: impl FnOnce(&Value) -> bool,
) -> Option<[Instruction; 2]> {
    let InstructionKind::Memory(mem) = &instruction.kind else {
        return None;
    };
    if mem.op != MemoryOp::Write || mem.entry_count != 1 {
        return None;
    }
    if !is_upper_word_zero(&mem.source) {
        return None;
    }

    let hi_address = offset_address(&mem.destination, locals, 4);

    let low = Instruction {
        kind: InstructionKind::Memory(MemoryInstruction {
            op: MemoryOp::Write,
            source: mem.source.clone(),
            destination: mem.destination.clone(),
            entry_count: 1,
            guarded_by_mutex: mem.guarded_by_mutex,
        }),
        ..instruction.clone()
    };
    let high = Instruction {
        kind: InstructionKind::Memory(MemoryInstruction {
            op: MemoryOp::Write,
            source: Value::Literal(Literal::from_u32(0)),
            destination: hi_address,
            entry_count: 1,
            guarded_by_mutex: mem.guarded_by_mutex,
        }),
        ..instruction.clone()
    };
    Some([low, high])
}

/// Who reads a split 64-bit value's destination, and how.
enum ReaderRole {
    /// A 32-bit truncating read of the lower half: a plain move, or an AND with `0xFFFF_FFFF`.
    LowerHalf { instruction_index: usize },
    /// A right-shift-by-32 reading the upper half.
    UpperHalf { instruction_index: usize },
    /// A write of the full 64-bit value back to memory.
    Writer { instruction_index: usize },
}

/// Splits a 64-bit read whose source aliases a struct pointer, iff every reader of its
/// destination is a recognized pattern (truncating move/mask, shift-by-32, or a write-through).
/// Mutates `instructions` in place on success. Returns `Ok(())` on success (possibly a no-op if
/// `read_index` isn't a splittable read), `Err(())` (`SplitAborted`, §7) if a reader isn't
/// recognized — in which case nothing is mutated.
pub fn split_read_if_struct_aliased(
    instructions: &mut Vec<Instruction>,
    read_index: usize,
    locals: &mut LocalPool,
) -> Result<(), ()> {
    let Some(dst) = read_destination_local(&instructions[read_index]) else {
        return Ok(());
    };
    if !is_sixty_four_bit(dst, locals) {
        return Ok(());
    }

    let mut roles = Vec::new();
    for (i, inst) in instructions.iter().enumerate().skip(read_index + 1) {
        if !reads_local(inst, dst) {
            continue;
        }
        match classify_reader(inst, dst) {
            Some(role) => roles.push(match role {
                Reader::Lower => ReaderRole::LowerHalf { instruction_index: i },
                Reader::Upper => ReaderRole::UpperHalf { instruction_index: i },
                Reader::Writer => ReaderRole::Writer { instruction_index: i },
            }),
            None => {
                log::debug!(target: "memory_classifier", "SplitAborted: unrecognized reader of {dst:?} at instruction {i}");
                return Err(());
            }
        }
    }

    let read_inst = instructions[read_index].clone();
    let InstructionKind::Memory(mem) = &read_inst.kind else {
        return Ok(());
    };

    let lo_local = dst;
    let hi_local = locals.add_new_local(DataType::Scalar(I32), "%split_hi", LocalOrigin::Transient);
    let hi_address = offset_address(&mem.source, locals, 4);

    let lo_read = Instruction {
        kind: InstructionKind::Memory(MemoryInstruction {
            op: MemoryOp::Read,
            source: mem.source.clone(),
            destination: Value::Local(lo_local),
            entry_count: 1,
            guarded_by_mutex: mem.guarded_by_mutex,
        }),
        ..read_inst.clone()
    };
    let hi_read = Instruction {
        kind: InstructionKind::Memory(MemoryInstruction {
            op: MemoryOp::Read,
            source: hi_address,
            destination: Value::Local(hi_local),
            entry_count: 1,
            guarded_by_mutex: mem.guarded_by_mutex,
        }),
        ..read_inst.clone()
    };

    // Process from the highest instruction index down: the `Writer` arm below inserts a second
    // instruction, which would shift every index recorded after it in program order otherwise.
    for role in roles.iter().rev() {
        match *role {
            ReaderRole::LowerHalf { instruction_index } => {
                instructions[instruction_index] = Instruction::new(InstructionKind::Move(MoveOperation {
                    result: output_of(&instructions[instruction_index]).expect("lower-half reader defines a value"),
                    source: Value::Local(lo_local),
                }));
            }
            ReaderRole::UpperHalf { instruction_index } => {
                instructions[instruction_index] = Instruction::new(InstructionKind::Move(MoveOperation {
                    result: output_of(&instructions[instruction_index]).expect("upper-half reader defines a value"),
                    source: Value::Local(hi_local),
                }));
            }
            ReaderRole::Writer { instruction_index } => {
                // Already decomposed into `lo_local`/`hi_local` by the read split above: the
                // write-through becomes two 32-bit writes of those halves, not a fresh
                // zero-upper-word proof.
                let original = instructions[instruction_index].clone();
                let InstructionKind::Memory(writer_mem) = &original.kind else {
                    continue;
                };
                let writer_hi_address = offset_address(&writer_mem.destination, locals, 4);
                instructions[instruction_index] = Instruction {
                    kind: InstructionKind::Memory(MemoryInstruction {
                        op: MemoryOp::Write,
                        source: Value::Local(lo_local),
                        destination: writer_mem.destination.clone(),
                        entry_count: 1,
                        guarded_by_mutex: writer_mem.guarded_by_mutex,
                    }),
                    ..original.clone()
                };
                instructions.insert(
                    instruction_index + 1,
                    Instruction {
                        kind: InstructionKind::Memory(MemoryInstruction {
                            op: MemoryOp::Write,
                            source: Value::Local(hi_local),
                            destination: writer_hi_address,
                            entry_count: 1,
                            guarded_by_mutex: writer_mem.guarded_by_mutex,
                        }),
                        ..original.clone()
                    },
                );
            }
        }
    }

    instructions[read_index] = lo_read;
    instructions.insert(read_index + 1, hi_read);
    Ok(())
}

enum Reader {
    Lower,
    Upper,
    Writer,
}

fn classify_reader(inst: &Instruction, local: LocalId) -> Option<Reader> {
    match &inst.kind {
        InstructionKind::Move(mv) if mv.source == Value::Local(local) => Some(Reader::Lower),
        InstructionKind::Alu(op) if op.operand_a == Value::Local(local) => {
            if is_mask_low_word(op) {
                Some(Reader::Lower)
            } else if is_shift_by_32(op) {
                Some(Reader::Upper)
            } else {
                None
            }
        }
        InstructionKind::Memory(mem) if mem.op == MemoryOp::Write && mem.source == Value::Local(local) => {
            Some(Reader::Writer)
        }
        _ => None,
    }
}

fn is_mask_low_word(op: &AluOperation) -> bool {
    op.opcode.mnemonic.as_str() == "and"
        && matches!(op.operand_b.as_ref().and_then(Value::as_literal), Some(l) if l.bits == 0xFFFF_FFFF)
}

fn is_shift_by_32(op: &AluOperation) -> bool {
    op.opcode.mnemonic.as_str() == "shr"
        && matches!(op.operand_b.as_ref().and_then(Value::as_literal), Some(l) if l.as_i64() == 32)
}

fn reads_local(inst: &Instruction, local: LocalId) -> bool {
    inst.inputs().iter().any(|v| *v == Value::Local(local))
}

/// True branches/mutex/semaphore/barrier instructions: §4.4's rewrite has to respect these
/// regardless of address, since they're ordering points rather than memory-aliasing hazards.
/// Deliberately narrower than [`Instruction::is_scheduling_fence`], which also fences on every
/// `Memory` op for the scheduler's purposes — the COPY rewrite only cares about a `Memory` op if
/// it actually writes the read's source (see [`writes_source_area`]).
fn is_unconditional_fence(inst: &Instruction) -> bool {
    matches!(
        inst.kind,
        InstructionKind::Branch(_)
            | InstructionKind::MutexLock
            | InstructionKind::MutexRelease
            | InstructionKind::SemaphoreAdjustment { .. }
            | InstructionKind::MemoryBarrier
    )
}

/// True iff `inst` is a `Memory` write/copy/fill whose destination is the read's source address —
/// an "other writer of the read's source area" per §4.4, the only `Memory` shape that can
/// invalidate the read's value before it's copied onward. An unrelated read, or a write to a
/// different address, doesn't block the rewrite.
fn writes_source_area(inst: &Instruction, read_source: &Value) -> bool {
    matches!(
        &inst.kind,
        InstructionKind::Memory(mem) if mem.op != MemoryOp::Read && mem.destination == *read_source
    )
}

fn output_of(inst: &Instruction) -> Option<LocalId> {
    inst.output()
}

fn read_destination_local(inst: &Instruction) -> Option<LocalId> {
    match &inst.kind {
        InstructionKind::Memory(mem) if mem.op == MemoryOp::Read => mem.destination.as_local(),
        _ => None,
    }
}

fn is_sixty_four_bit(id: LocalId, locals: &LocalPool) -> bool {
    matches!(locals.get(id).ty.scalar_bit_count(), Some(64))
}

/// A fresh `Local` standing for `base + offset`, for any `base` that isn't itself a literal
/// (folded directly). The add that materializes it is the encoder's concern, not the planner's:
/// per §6 the core only names the logical fields a downstream lowering pass consumes.
fn offset_address(base: &Value, locals: &mut LocalPool, offset: i64) -> Value {
    match base {
        Value::Literal(lit) => Value::Literal(Literal::from_i64(lit.as_i64() + offset)),
        _ => Value::Local(locals.add_new_local(DataType::Scalar(I32), "%split_addr", LocalOrigin::Transient)),
    }
}

/// §4.4 "Read-then-write → copy rewrite". If the read at `read_index` has exactly one reader and
/// that reader is an unconditional write with a matching element count, within
/// [`COPY_REWRITE_LOOKAHEAD`] instructions and no intervening fence or other writer of the read's
/// source, the two are collapsed into a single `COPY`. Returns `true` if a rewrite happened.
pub fn rewrite_read_then_write_to_copy(instructions: &mut Vec<Instruction>, read_index: usize) -> bool {
    let Some(dst) = read_destination_local(&instructions[read_index]) else {
        return false;
    };
    let read_source = match &instructions[read_index].kind {
        InstructionKind::Memory(mem) => mem.source.clone(),
        _ => return false,
    };
    let read_entry_count = match &instructions[read_index].kind {
        InstructionKind::Memory(mem) => mem.entry_count,
        _ => return false,
    };

    let window_end = (read_index + 1 + COPY_REWRITE_LOOKAHEAD).min(instructions.len());
    let mut writer_index = None;

    for (i, inst) in instructions.iter().enumerate().take(window_end).skip(read_index + 1) {
        let is_matching_writer = matches!(
            &inst.kind,
            InstructionKind::Memory(mem) if mem.op == MemoryOp::Write && mem.source == Value::Local(dst)
        );

        if is_matching_writer {
            if inst.condition != Condition::Always || writer_index.is_some() {
                return false;
            }
            let InstructionKind::Memory(mem) = &inst.kind else { unreachable!() };
            if mem.entry_count != read_entry_count {
                return false;
            }
            writer_index = Some(i);
            continue;
        }

        if is_unconditional_fence(inst) || writes_source_area(inst, &read_source) {
            return false;
        }

        if reads_local(inst, dst) {
            // A second reader of the read's destination disqualifies the "exactly one reader"
            // precondition.
            return false;
        }
    }

    let Some(writer_index) = writer_index else {
        return false;
    };

    let InstructionKind::Memory(writer_mem) = instructions[writer_index].clone().kind else {
        unreachable!("writer_index only ever points at a Memory write");
    };

    let copy = Instruction {
        kind: InstructionKind::Memory(MemoryInstruction {
            op: MemoryOp::Copy,
            source: read_source,
            destination: writer_mem.destination,
            entry_count: read_entry_count,
            guarded_by_mutex: writer_mem.guarded_by_mutex,
        }),
        ..instructions[read_index].clone()
    };

    instructions.remove(writer_index);
    instructions[read_index] = copy;
    true
}
