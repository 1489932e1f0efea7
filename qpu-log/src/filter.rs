use log::LevelFilter;

/// One parsed directive out of `QPUC_LOG`, e.g. `scheduler=trace` or `memory_classifier:vpm=debug`
/// or a bare level that applies to every target.
///
/// Trimmed down from the teacher's `midenc-log` directive grammar: no regex matching, no
/// kv-filter, no negated directives — this backend's logging surface is five named subsystems
/// (`cfg`, `loops`, `range`, `memory_classifier`, `scheduler`), not midenc's whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// `None` means "applies to every target that no more specific directive matches".
    pub target: Option<String>,
    pub level: LevelFilter,
}

impl Directive {
    /// How many `component:topic` segments this directive's target has; used to prefer the most
    /// specific matching directive when several match the same log record.
    fn specificity(&self) -> usize {
        self.target.as_deref().map_or(0, |t| t.split(':').count())
    }
}

/// Parse a `QPUC_LOG`-style filter string: a comma-separated list of `target=level` or bare
/// `level` entries.
///
/// Unrecognized entries are skipped rather than causing a startup failure, since a malformed
/// logging directive should never prevent the compiler from running.
pub fn parse(spec: &str) -> Vec<Directive> {
    spec.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once('=') {
                Some((target, level)) => Some(Directive {
                    target: Some(target.trim().to_string()),
                    level: parse_level(level.trim())?,
                }),
                None => {
                    // A bare entry with no `=` is a level applying to every target, unless it
                    // fails to parse as a level, in which case it's a target with an implied
                    // "enable everything" level.
                    match parse_level(entry) {
                        Some(level) => Some(Directive { target: None, level }),
                        None => Some(Directive {
                            target: Some(entry.to_string()),
                            level: LevelFilter::Trace,
                        }),
                    }
                }
            }
        })
        .collect()
}

fn parse_level(s: &str) -> Option<LevelFilter> {
    match s.to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Decide whether `target` at `level` is enabled under `directives`, picking the most specific
/// matching directive (most `:`-separated segments in its target), falling back to the global
/// (target-less) directive, and finally to `default`.
pub fn is_enabled(directives: &[Directive], target: &str, level: log::Level, default: LevelFilter) -> bool {
    let best = directives
        .iter()
        .filter(|d| match &d.target {
            Some(t) => target == t.as_str() || target.starts_with(&format!("{t}:")),
            None => true,
        })
        .max_by_key(|d| d.specificity());

    let effective = best.map(|d| d.level).unwrap_or(default);
    level <= effective
}
