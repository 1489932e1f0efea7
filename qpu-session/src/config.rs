/// The few knobs the spec surfaces as tunable, consulted by the memory classifier and the
/// scheduler via `&CompilerConfig` the way the teacher's passes consult `&Session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Total VPM capacity, in `vec<i32>`-sized rows, available for the DMA cache-in-VPM upgrade
    /// (§4.4 "Cache-in-VPM check"). A cached range of `n` vectors is rejected once it would not
    /// fit under this ceiling.
    pub vpm_capacity_vectors: u32,
    /// Open Question (b): the non-recursive `LoopFinder` skips one-block self-loops by default;
    /// setting this surfaces them instead, equivalent to calling
    /// [`qpu_hir::LoopFinder::find_loops_including_single_block`] rather than
    /// `find_loops(false)`.
    pub include_single_block_loops: bool,
    /// Open Question (c): the scheduler's default cadence combines at most one ADD/MUL pair per
    /// step before falling back to single-root emission. Setting this opts into a more
    /// exhaustive search that keeps combining pairs for as long as any are available in a single
    /// step.
    pub exhaustive_scheduler_pairing: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            vpm_capacity_vectors: 64,
            include_single_block_loops: false,
            exhaustive_scheduler_pairing: false,
        }
    }
}
