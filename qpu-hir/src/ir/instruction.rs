use smallvec::SmallVec;

use qpu_hir_symbol::Symbol;

use crate::ir::{local::LocalId, value::Value};

bitflags::bitflags! {
    /// Per-instruction decoration bits, stored once in the common header.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Decorations: u16 {
        const WORK_GROUP_UNIFORM = 1 << 0;
        const READ_ONLY          = 1 << 1;
        const ALL_SAME_ELEMENTS  = 1 << 2;
    }
}

/// Condition under which an instruction executes; `Always` is the common case.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Condition {
    #[default]
    Always,
    Zero,
    NotZero,
    Negative,
    NonNegative,
    CarrySet,
    CarryClear,
}

/// Which ALU an [`AluOperation`]'s opcode can be dispatched on. Mirrors the ADD-ALU/MUL-ALU
/// split the scheduler's pairing rule must respect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AluDispatch {
    AddOnly,
    MulOnly,
    Either,
}

/// The register-file read port an ALU input occupies. Two operations can be paired only if they
/// don't both require the same port in the same cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegisterPort {
    A,
    B,
}

/// An arithmetic/logic opcode, with enough metadata attached for the scheduler's pairing rule and
/// the §4.6 encoder to consult without a separate opcode table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AluOpcode {
    pub mnemonic: Symbol,
    pub dispatch: AluDispatch,
    /// `true` if this opcode's inputs include a vector-rotation signal that is incompatible with
    /// being paired with another rotation-using opcode in the same bundle.
    pub uses_vector_rotation: bool,
}

/// One ALU operation: an opcode plus up to two operand [`Value`]s and a single result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AluOperation {
    pub opcode: AluOpcode,
    pub result: LocalId,
    pub operand_a: Value,
    pub operand_a_port: RegisterPort,
    pub operand_b: Option<Value>,
    pub operand_b_port: Option<RegisterPort>,
}

impl AluOperation {
    pub fn inputs(&self) -> impl Iterator<Item = &Value> {
        self.operand_a_iter().chain(self.operand_b.iter())
    }

    fn operand_a_iter(&self) -> impl Iterator<Item = &Value> {
        core::iter::once(&self.operand_a)
    }
}

/// A plain register-to-register or immediate-to-register move.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MoveOperation {
    pub result: LocalId,
    pub source: Value,
}

/// The memory operation kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    Read,
    Write,
    Copy,
    Fill,
}

/// A memory access: read, write, copy between two locations, or fill.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryInstruction {
    pub op: MemoryOp,
    pub source: Value,
    pub destination: Value,
    pub entry_count: u32,
    pub guarded_by_mutex: bool,
}

/// An unconditional or conditional transfer of control to another block's label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Branch {
    pub target: Symbol,
    pub condition: Condition,
}

/// A combined ADD-ALU/MUL-ALU dual-issue bundle produced by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinedOperation {
    pub add_alu: AluOperation,
    pub mul_alu: AluOperation,
}

/// The payload width/signedness of a load-immediate instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LoadImmediateKind {
    FullWidth32,
    SignedShortPair,
    UnsignedShortPair,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadImmediate {
    pub result: LocalId,
    pub kind: LoadImmediateKind,
    pub payload: u32,
}

/// The closed algebraic variant of an instruction's subkind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Label(Symbol),
    Alu(AluOperation),
    Move(MoveOperation),
    Memory(MemoryInstruction),
    Branch(Branch),
    MutexLock,
    MutexRelease,
    SemaphoreAdjustment { semaphore: u8, increment: i8 },
    MemoryBarrier,
    LoadImmediate(LoadImmediate),
    Combined(CombinedOperation),
    Nop,
}

/// A single IR instruction: a discriminated subkind plus the shared header fields every subkind
/// carries (decorations, conditional, packing) stored once in a common header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub condition: Condition,
    pub set_flags: bool,
    pub decorations: Decorations,
}

impl Instruction {
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            condition: Condition::Always,
            set_flags: false,
            decorations: Decorations::empty(),
        }
    }

    pub fn is_nop(&self) -> bool {
        matches!(self.kind, InstructionKind::Nop)
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, InstructionKind::Label(_))
    }

    /// Is this instruction a scheduling fence? Memory operations, branches, mutex and semaphore
    /// instructions never get reordered relative to each other.
    pub fn is_scheduling_fence(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Memory(_)
                | InstructionKind::Branch(_)
                | InstructionKind::MutexLock
                | InstructionKind::MutexRelease
                | InstructionKind::SemaphoreAdjustment { .. }
                | InstructionKind::MemoryBarrier
        )
    }

    /// The [`Value`]s read by this instruction.
    pub fn inputs(&self) -> SmallVec<[Value; 2]> {
        match &self.kind {
            InstructionKind::Alu(op) => op.inputs().cloned().collect(),
            InstructionKind::Move(mv) => SmallVec::from_elem(mv.source.clone(), 1),
            InstructionKind::Memory(mem) => SmallVec::from_iter([mem.source.clone(), mem.destination.clone()]),
            InstructionKind::Combined(c) => c.add_alu.inputs().chain(c.mul_alu.inputs()).cloned().collect(),
            _ => SmallVec::new(),
        }
    }

    /// The [`LocalId`] this instruction defines, if any.
    pub fn output(&self) -> Option<LocalId> {
        match &self.kind {
            InstructionKind::Alu(op) => Some(op.result),
            InstructionKind::Move(mv) => Some(mv.result),
            InstructionKind::LoadImmediate(li) => Some(li.result),
            _ => None,
        }
    }
}
