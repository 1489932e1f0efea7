use core::fmt;

/// The compilation stage a [`CompileError`] was raised from. The core only ever raises errors
/// from the memory-access planner, which the original compiler this was distilled from tags
/// `NORMALIZER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalizer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalizer => f.write_str("NORMALIZER"),
        }
    }
}

/// A fatal compilation error: stage tag, message, and the offending local's description, exactly
/// as §6 "Diagnostics" specifies. These abort the current method cleanly; they are never
/// constructed for the §7 "recovered" outcomes (`RangeTooWide`, `UniformMismatch`,
/// `SplitAborted`), which the classifier handles internally by falling back instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("[{stage}] Invalid address space for pointer parameter ({local})")]
    InvalidAddressSpace { stage: Stage, local: String },
    #[error("[{stage}] control-flow graph has more than one block with no outgoing edge")]
    AmbiguousExit { stage: Stage },
    #[error("[{stage}] Accessing memory through a phi-node is not implemented yet ({local})")]
    UnmappablePhi { stage: Stage, local: String },
}

impl CompileError {
    pub fn invalid_address_space(local: impl Into<String>) -> Self {
        Self::InvalidAddressSpace {
            stage: Stage::Normalizer,
            local: local.into(),
        }
    }

    pub fn ambiguous_exit() -> Self {
        Self::AmbiguousExit { stage: Stage::Normalizer }
    }

    pub fn unmappable_phi(local: impl Into<String>) -> Self {
        Self::UnmappablePhi {
            stage: Stage::Normalizer,
            local: local.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidAddressSpace { stage, .. }
            | Self::AmbiguousExit { stage }
            | Self::UnmappablePhi { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_stage_and_local_description() {
        let err = CompileError::invalid_address_space("%p: private int*");
        assert_eq!(
            err.to_string(),
            "[NORMALIZER] Invalid address space for pointer parameter (%p: private int*)"
        );
        assert_eq!(err.stage(), Stage::Normalizer);
    }
}
