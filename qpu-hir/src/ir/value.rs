use smallvec::SmallVec;

use crate::ir::local::LocalId;

/// A single immediate constant, either integer or floating-point bits.
///
/// Stored as raw bits rather than as a Rust `i64`/`f64` union so that a [`Literal`] compares and
/// hashes structurally regardless of its intended signedness.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub bits: u64,
}

impl Literal {
    pub fn from_i64(value: i64) -> Self {
        Self { bits: value as u64 }
    }

    pub fn from_u32(value: u32) -> Self {
        Self { bits: value as u64 }
    }

    pub fn as_i64(&self) -> i64 {
        self.bits as i64
    }

    /// True iff the upper 32 bits of this literal, interpreted as a 64-bit quantity, are zero.
    /// Used by the write-splitting rule to prove a 64-bit write's upper word is
    /// zero without further analysis.
    pub fn upper_word_is_zero(&self) -> bool {
        (self.bits >> 32) == 0
    }
}

/// One lane of a [`SIMDVector`]: either a concrete literal or explicitly undefined.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Lane {
    Literal(Literal),
    Undefined,
}

/// The width of a QPU SIMD vector register, re-exported here so callers don't need to depend on
/// `qpu-hir-type` just to build a vector [`Value`].
pub const SIMD_WIDTH: usize = qpu_hir_type::NATIVE_VECTOR_SIZE as usize;

/// A full 16-lane SIMD vector of literal or undefined lanes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SIMDVector {
    pub lanes: SmallVec<[Lane; SIMD_WIDTH]>,
}

impl SIMDVector {
    pub fn splat(literal: Literal) -> Self {
        Self {
            lanes: SmallVec::from_elem(Lane::Literal(literal), SIMD_WIDTH),
        }
    }

    pub fn from_lanes(lanes: impl IntoIterator<Item = Lane>) -> Self {
        Self {
            lanes: lanes.into_iter().collect(),
        }
    }

    /// True iff every lane carries the same literal; the value this vector represents is then
    /// equivalent to that scalar broadcast across all lanes.
    pub fn is_uniform(&self) -> Option<Literal> {
        let mut iter = self.lanes.iter();
        let first = match iter.next()? {
            Lane::Literal(l) => *l,
            Lane::Undefined => return None,
        };
        for lane in iter {
            match lane {
                Lane::Literal(l) if *l == first => {}
                _ => return None,
            }
        }
        Some(first)
    }
}

/// A 6-bit small-immediate encoding: a restricted set of integer/float constants directly
/// representable in the instruction word without a register-file slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SmallImmediate(pub u8);

/// A physical QPU register referenced directly (as opposed to a not-yet-allocated [`LocalId`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HardwareRegister {
    pub file: RegisterFile,
    pub address: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegisterFile {
    PhysicalA,
    PhysicalB,
}

/// A movable, structurally-comparable operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Literal(Literal),
    Vector(SIMDVector),
    Local(LocalId),
    SmallImmediate(SmallImmediate),
    Register(HardwareRegister),
}

impl Value {
    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Self::Local(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Self::Literal(l) => Some(*l),
            Self::Vector(v) => v.is_uniform(),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_)) || matches!(self, Self::Vector(v) if v.is_uniform().is_some())
    }
}
