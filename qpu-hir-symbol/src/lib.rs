//! Global string interning used for `Local`, `BasicBlock`, and `Method` names.
//!
//! Every identifier handed out by [`Symbol::intern`] is a cheap `Copy` handle into a process-wide
//! table, so names can be compared by equality of the handle rather than by string comparison.

use std::{
    cell::RefCell,
    fmt,
    sync::{Mutex, OnceLock},
};

use rustc_hash::FxHashMap;

/// An interned string.
///
/// Two `Symbol`s are equal iff the strings they were interned from are equal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct Interner {
    strings: Vec<&'static str>,
    lookup: FxHashMap<&'static str, u32>,
}

impl Interner {
    fn new() -> Self {
        Self {
            strings: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }

    fn intern(&mut self, s: &str) -> Symbol {
        if let Some(id) = self.lookup.get(s) {
            return Symbol(*id);
        }
        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        let id = self.strings.len() as u32;
        self.strings.push(leaked);
        self.lookup.insert(leaked, id);
        Symbol(id)
    }

    fn resolve(&self, sym: Symbol) -> &'static str {
        self.strings[sym.0 as usize]
    }
}

fn interner() -> &'static Mutex<Interner> {
    static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();
    INTERNER.get_or_init(|| Mutex::new(Interner::new()))
}

impl Symbol {
    /// Intern `s`, returning a handle that compares equal to every other intern of the same text.
    pub fn intern(s: impl AsRef<str>) -> Self {
        interner().lock().unwrap().intern(s.as_ref())
    }

    /// Resolve this symbol back to its original string.
    pub fn as_str(&self) -> &'static str {
        interner().lock().unwrap().resolve(*self)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::intern(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::intern(s)
    }
}

thread_local! {
    /// Per-thread counter used to mint unique name hints (e.g. `%lowered_stack.3`) without
    /// touching the global interner lock on every allocation.
    static NAME_HINT_COUNTER: RefCell<u32> = const { RefCell::new(0) };
}

/// Mint a fresh, unique symbol from a human-readable hint, e.g. `fresh("lowered_stack")` may
/// produce `%lowered_stack.0`, `%lowered_stack.1`, ... A leading `%` already present on `hint`
/// is not duplicated.
pub fn fresh(hint: &str) -> Symbol {
    let n = NAME_HINT_COUNTER.with(|c| {
        let mut c = c.borrow_mut();
        let n = *c;
        *c += 1;
        n
    });
    let hint = hint.strip_prefix('%').unwrap_or(hint);
    Symbol::intern(format!("%{hint}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedupes() {
        let a = Symbol::intern("foo");
        let b = Symbol::intern("foo");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "foo");
    }

    #[test]
    fn distinct_strings_are_distinct_symbols() {
        let a = Symbol::intern("foo");
        let b = Symbol::intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_names_are_unique() {
        let a = fresh("stack");
        let b = fresh("stack");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("%stack."));
    }
}
