use core::fmt;

use qpu_hir_symbol::Symbol;
use qpu_hir_type::DataType;

use crate::ir::value::Literal;

/// How a [`Local`] came to exist, used by the memory classifier to pick which per-kind rule
/// applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOrigin {
    /// A kernel parameter, in the given address space.
    Parameter { address_space: qpu_hir_type::AddressSpace },
    /// A `__constant` or `__global` variable declared at module scope, not a parameter. `constant`
    /// globals carry their declared initializer, when known, so the memory classifier can fold a
    /// scalar/known-index/all-same access into a register value (§4.4 "Global (non-parameter)").
    Global { constant: bool, initializer: Option<GlobalInitializer> },
    /// A stack-allocated local (`alloca`-equivalent).
    StackAllocation,
    /// A transient SSA value with no memory-location semantics of its own.
    Transient,
}

/// The initializer a `__constant` global was declared with, to the extent the front end recorded
/// it. Grounded on `getConstantValue` (`MemoryMapChecks.cpp`), which inspects the global's
/// `initialValue` in this same order: scalar literal, then all-entries-the-same, then a fixed
/// index into a compound whose elements are individually known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalInitializer {
    /// `__constant int x = 3;` — the whole global is one literal.
    Scalar(Literal),
    /// Every element of a compound initializer is the same literal, e.g. a zero-initializer or
    /// `__constant int g[4] = {7,7,7,7};`.
    AllSame(Literal),
    /// A compound initializer with distinct, individually-known literal elements, e.g.
    /// `__constant int g[4] = {1,2,3,4};`. Folds only when a particular access's index is
    /// statically known (see `constant_value_for_global` in the memory classifier).
    Compound(Vec<Literal>),
}

/// A reference from one [`Local`] to another, used to model `local[index]`-style element
/// access without duplicating the base's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReference {
    pub base: LocalId,
    pub element_index: u32,
}

/// Opaque, stable identity for a [`Local`] within a [`crate::Method`]'s local pool.
///
/// Locals are never removed from the pool during a method's lifetime,
/// so a `LocalId` remains valid for as long as the owning `Method` does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

/// A named, typed storage location or SSA definition.
///
/// Locals have immutable identity: once minted, a `Local`'s name, type and origin never change.
/// Two `Local`s are the same entity iff they share a [`LocalId`], not iff their fields compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: Symbol,
    pub ty: DataType,
    pub origin: LocalOrigin,
    pub reference: Option<LocalReference>,
}

impl Local {
    pub fn new(name: Symbol, ty: DataType, origin: LocalOrigin) -> Self {
        Self {
            name,
            ty,
            origin,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: LocalReference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn is_memory_base(&self) -> bool {
        matches!(
            self.origin,
            LocalOrigin::Parameter { .. } | LocalOrigin::Global { .. } | LocalOrigin::StackAllocation
        )
    }
}

impl fmt::Display for Local {
    /// The "offending Local's description" diagnostics carry per §6: name and type, which is
    /// all a compile error needs to point a user at the right declaration.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

/// Per-method arena of [`Local`]s: `add_new_local` mints a fresh local whose identity remains
/// valid for the method's lifetime.
#[derive(Debug, Clone, Default)]
pub struct LocalPool {
    locals: Vec<Local>,
}

impl LocalPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh local. `name_hint` is interned via [`qpu_hir_symbol::fresh`] so repeated
    /// hints (e.g. `"%lowered_stack"` from the small-array lowering rule) stay unique.
    pub fn add_new_local(&mut self, ty: DataType, name_hint: &str, origin: LocalOrigin) -> LocalId {
        let name = qpu_hir_symbol::fresh(name_hint);
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(Local::new(name, ty, origin));
        id
    }

    pub fn insert(&mut self, local: Local) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(local);
        id
    }

    pub fn get(&self, id: LocalId) -> &Local {
        &self.locals[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: LocalId) -> &mut Local {
        &mut self.locals[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalId, &Local)> {
        self.locals.iter().enumerate().map(|(i, l)| (LocalId(i as u32), l))
    }
}
