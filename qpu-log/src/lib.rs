//! Structured logging init for the memory-access planner and instruction scheduler.
//!
//! Every subsystem (`ControlFlowGraph`, `LoopFinder`, `AccessRangeAnalyzer`, `MemoryClassifier`,
//! `InstructionScheduler`) logs at `debug`/`trace` under a target named after itself — e.g.
//! `log::debug!(target: "scheduler", ...)` — the same `target: "..."` convention the teacher's
//! passes use (`hir-transform/src/scheduling.rs`'s `target: "scheduler"`).
//!
//! Filtering is configured from the `QPUC_LOG` environment variable: a comma-separated list of
//! `component[:topic]=level` directives, or a bare level applying to every target. This is a
//! deliberately smaller grammar than `midenc-log`'s (no regex, no `kv-filter`, no negated
//! directives) since this backend has five named subsystems, not midenc's whole dialect/pass
//! pipeline.

mod filter;

pub use filter::Directive;

use std::sync::OnceLock;

use log::{LevelFilter, Log, Metadata, Record};

struct Logger {
    directives: Vec<Directive>,
    default: LevelFilter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        filter::is_enabled(&self.directives, metadata.target(), metadata.level(), self.default)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("[{} {}] {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Initialize the global `log` facade from `QPUC_LOG`, defaulting to `error`-level-only output
/// when the variable is unset. Safe to call more than once; only the first call takes effect.
pub fn init() {
    let spec = std::env::var("QPUC_LOG").unwrap_or_default();
    init_from_spec(&spec);
}

/// As [`init`], but reads the filter spec from `spec` directly instead of the environment —
/// useful for tests and for embedding this backend in a driver with its own configuration layer.
pub fn init_from_spec(spec: &str) {
    let directives = filter::parse(spec);
    let max_level = directives.iter().map(|d| d.level).max().unwrap_or(LevelFilter::Error);
    let logger = LOGGER.get_or_init(|| Logger {
        directives,
        default: LevelFilter::Error,
    });
    // `set_logger` fails if a logger is already installed (e.g. by a second `init()` call, or by
    // the hosting application); either way there is nothing more to do.
    let _ = log::set_logger(logger);
    log::set_max_level(max_level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_defaults_to_error_only() {
        let directives = filter::parse("");
        assert!(filter::is_enabled(&directives, "scheduler", log::Level::Error, LevelFilter::Error));
        assert!(!filter::is_enabled(&directives, "scheduler", log::Level::Debug, LevelFilter::Error));
    }
}
