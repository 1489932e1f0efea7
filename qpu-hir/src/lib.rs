//! The IR model, control-flow graph, and loop analysis that the memory classifier and
//! instruction scheduler build on.

pub mod ir;

pub use ir::{
    AluDispatch, AluOpcode, AluOperation, BasicBlock, BlockId, Branch, CfgEdge, CfgError,
    CombinedOperation, Condition, ControlFlowGraph, ControlFlowLoop, Decorations, GlobalInitializer,
    HardwareRegister, Instruction, InstructionKind, Lane, Literal, Local, LocalId, LocalOrigin,
    LocalPool, LocalReference, LoadImmediate, LoadImmediateKind, LoopFinder, MemoryInstruction,
    MemoryOp, Method, MoveOperation, NodeIndex, RegisterFile, RegisterPort, SIMDVector,
    SmallImmediate, Value, SIMD_WIDTH,
};
