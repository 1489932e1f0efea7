use qpu_hir::{Decorations, LocalId, Value};
use smallvec::SmallVec;

/// A closed signed-integer interval `[min, max]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IntegerRange {
    pub min: i64,
    pub max: i64,
}

impl IntegerRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub const fn exact(value: i64) -> Self {
        Self::new(value, value)
    }

    pub fn widen(self, other: IntegerRange) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn translate(self, offset: i64) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    pub fn len(&self) -> i64 {
        self.max - self.min + 1
    }
}

/// One term contributing to an address expression `base + ∑ uniform_i + ∑ dynamic_j + const_k`
///.
///
/// `known_range` is the statically-known value range of a dynamic term (e.g.
/// `get_local_id(0) ∈ [0, local_size-1]`); `None` means the analyzer has no static bound for it.
#[derive(Debug, Clone)]
pub struct AccessOperand {
    pub value: Value,
    pub decorations: Decorations,
    pub known_range: Option<IntegerRange>,
}

impl AccessOperand {
    pub fn literal(value: Value) -> Self {
        Self {
            value,
            decorations: Decorations::empty(),
            known_range: None,
        }
    }

    pub fn uniform(value: Value) -> Self {
        Self {
            value,
            decorations: Decorations::WORK_GROUP_UNIFORM,
            known_range: None,
        }
    }

    pub fn dynamic_with_range(value: Value, range: IntegerRange) -> Self {
        Self {
            value,
            decorations: Decorations::empty(),
            known_range: Some(range),
        }
    }

    /// An operand is work-group uniform iff it's a pure literal, or the analyzer's upstream SSA
    /// decoration marks it as such; syntactic markers are
    /// believed, otherwise conservatively dynamic.
    fn is_uniform(&self) -> bool {
        self.value.is_literal() || self.decorations.contains(Decorations::WORK_GROUP_UNIFORM)
    }
}

/// The decomposition of one memory access's address expression.
#[derive(Debug, Clone)]
pub struct MemoryAccessRange {
    pub base: LocalId,
    pub group_uniform_parts: SmallVec<[Value; 4]>,
    pub dynamic_parts: SmallVec<[Value; 4]>,
    /// `None` when at least one dynamic part has no statically-known range, meaning the overall
    /// offset can't be bounded (downstream callers treat this the same as an overflowing range).
    pub offset_range: Option<IntegerRange>,
}

/// Decomposes address expressions into work-group-uniform and dynamic parts, and computes each
/// access's closed offset range.
pub struct AccessRangeAnalyzer;

impl AccessRangeAnalyzer {
    /// Decompose one access's address expression. `operands` are the address's constituent terms
    /// in the order the expression was built; each literal operand contributes to the constant
    /// offset, and each uniform/dynamic operand is bucketed by [`AccessOperand::is_uniform`].
    pub fn analyze(base: LocalId, operands: &[AccessOperand]) -> MemoryAccessRange {
        let mut group_uniform_parts = SmallVec::new();
        let mut dynamic_parts = SmallVec::new();
        let mut offset_range = Some(IntegerRange::exact(0));

        for operand in operands {
            if let Some(literal) = operand.value.as_literal() {
                let literal_range = IntegerRange::exact(literal.as_i64());
                offset_range = offset_range.map(|r| {
                    IntegerRange::new(r.min + literal_range.min, r.max + literal_range.max)
                });
                continue;
            }

            if operand.is_uniform() {
                group_uniform_parts.push(operand.value.clone());
                continue;
            }

            dynamic_parts.push(operand.value.clone());
            offset_range = match (offset_range, operand.known_range) {
                (Some(r), Some(dyn_range)) => Some(IntegerRange::new(r.min + dyn_range.min, r.max + dyn_range.max)),
                _ => None,
            };
        }

        log::trace!(
            target: "range",
            "base={base:?}: {} uniform part(s), {} dynamic part(s), offset_range={offset_range:?}",
            group_uniform_parts.len(),
            dynamic_parts.len(),
        );

        MemoryAccessRange {
            base,
            group_uniform_parts,
            dynamic_parts,
            offset_range,
        }
    }
}
