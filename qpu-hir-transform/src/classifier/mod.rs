//! The memory-access classifier: assigns every base [`Local`] one of the six realizations named
//! in §4.4, grounded on `MemoryMapChecks.cpp`'s `CHECKS` dispatch table (`checkMemoryMapping`).

mod access;
mod splitting;

pub use access::{CachedRange, MemoryAccess, MemoryClassifier, MemoryInfo, Realization};
pub use splitting::{
    rewrite_read_then_write_to_copy, split_read_if_struct_aliased, split_write_if_upper_word_zero,
    COPY_REWRITE_LOOKAHEAD,
};

use std::cell::Cell;

thread_local! {
    /// Alternates every TMU classification between TMU0 (`false`) and TMU1 (`true`).
    ///
    /// Intentionally non-deterministic across threads/runs per §5 "Shared resources" — this is a
    /// scheduling heuristic, not a correctness guard, so tests must not depend on its exact
    /// starting value.
    static TMU_FLAG: Cell<bool> = const { Cell::new(false) };
}

/// Flip and return the next TMU index to assign (`false` = TMU0, `true` = TMU1).
fn next_tmu_index() -> bool {
    TMU_FLAG.with(|flag| {
        let next = !flag.get();
        flag.set(next);
        next
    })
}
