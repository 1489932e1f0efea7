use qpu_hir::{GlobalInitializer, Local, LocalId, LocalOrigin, Value};
use qpu_hir_analysis::{IntegerRange, MemoryAccessRange};
use qpu_hir_type::{AddressSpace, DataType as Ty, NATIVE_VECTOR_SIZE};
use qpu_session::CompileError;

use crate::classifier::next_tmu_index;
use crate::vpm::{VpmArea, VpmManager};

/// The realization a base [`Local`] is assigned, ordered the way §4.4's preference lattice
/// moves: register-lower, then VPM-lower, then VPM-cache, then DMA/TMU.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Realization {
    QpuRegisterReadonly,
    QpuRegisterReadwrite,
    VpmPerQpu,
    VpmSharedAccess,
    RamLoadTmu,
    RamReadWriteVpm,
}

/// A cached DMA range upgraded into VPM, as recorded by the cache-in-VPM check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedRange {
    pub offset: IntegerRange,
    pub area: VpmArea,
}

/// The preferred and fallback realization computed for one base `Local`, before any VPM
/// reservation is attempted. Mirrors the `MemoryAccess` entity of §3's data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub preferred: Realization,
    pub fallback: Realization,
}

/// The product of classifying one base `Local`: what it realized to, plus whatever payload the
/// downstream lowering passes need. Mirrors the `MemoryInfo` entity of §3's data model.
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    pub realization: Realization,
    pub area: Option<VpmArea>,
    /// Precomputed constant for register-lowered globals (§4.4 "Global (non-parameter)").
    pub precomputed_value: Option<Value>,
    /// The register-sized type a small array was lowered to, if applicable.
    pub lowered_type: Option<Ty>,
    pub cached_ranges: Vec<CachedRange>,
    /// `false` = TMU0, `true` = TMU1; only meaningful when `realization` is `RamLoadTmu`.
    pub tmu_index: bool,
}

impl MemoryInfo {
    fn new(realization: Realization) -> Self {
        Self {
            realization,
            area: None,
            precomputed_value: None,
            lowered_type: None,
            cached_ranges: Vec::new(),
            tmu_index: false,
        }
    }
}

/// Per-kernel classifier. Grounded on `MemoryMapChecks::determineMemoryAccess` and its six
/// `canLowerTo*`/`canMapTo*` checks; `vpm` is the method's single `VpmManager`, consulted
/// serially the way §5 "Shared resources" requires.
pub struct MemoryClassifier<'a> {
    vpm: &'a mut VpmManager,
    max_cache_vectors: u32,
}

impl<'a> MemoryClassifier<'a> {
    pub fn new(vpm: &'a mut VpmManager, max_cache_vectors: u32) -> Self {
        Self { vpm, max_cache_vectors }
    }

    /// Classify one base `Local`.
    ///
    /// `is_read_only` stands in for "marked `READ_ONLY` or proven no writes"; `ranges` are every
    /// access-range the access-range analyzer computed for this base. For a `Global{constant:
    /// true}` base, the declared initializer (scalar, all-same, or compound with a statically
    /// known index recovered from `ranges`) is folded internally into a precomputed register
    /// value, per §4.4 "Global (non-parameter)".
    ///
    /// `is_read_only` deliberately does not itself scan for transitive writers (Open Question
    /// (a)): callers are expected to have already run that (conservative) check.
    pub fn classify(
        &mut self,
        local: &Local,
        owner: LocalId,
        is_read_only: bool,
        ranges: &[MemoryAccessRange],
    ) -> Result<MemoryInfo, CompileError> {
        let constant_folded_value = constant_value_for_local(local, ranges);
        let access = self.memory_access_for(local, is_read_only, constant_folded_value)?;
        let info = self.finalize(local, owner, access, ranges, constant_folded_value);
        log::debug!(target: "memory_classifier", "{local}: preferred={:?} -> realized={:?}", access.preferred, info.realization);
        Ok(info)
    }

    /// §4.4 "Other locals": a phi-joined memory base is only mappable if every source base was
    /// already classified to the *same* realization; the original compiler's unification branch
    /// is never actually reachable (its `phiSources` lattice always ends in the unconditional
    /// `UnmappablePhi` throw), so this mirrors that exactly: agreement or disagreement among the
    /// sources, a phi-join is always fatal.
    pub fn classify_phi(&self, local: &Local, _sources: &[Realization]) -> Result<MemoryInfo, CompileError> {
        log::debug!(target: "memory_classifier", "{local}: phi-joined memory base is unmappable");
        Err(CompileError::unmappable_phi(local.to_string()))
    }

    /// The preferred/fallback pair, before any VPM reservation is attempted.
    fn memory_access_for(
        &self,
        local: &Local,
        is_read_only: bool,
        constant_folded_value: Option<Value>,
    ) -> Result<MemoryAccess, CompileError> {
        match &local.origin {
            LocalOrigin::Parameter { address_space } => match address_space {
                AddressSpace::Constant => Ok(MemoryAccess {
                    preferred: Realization::RamLoadTmu,
                    fallback: Realization::RamReadWriteVpm,
                }),
                AddressSpace::Global if is_read_only => Ok(MemoryAccess {
                    preferred: Realization::RamLoadTmu,
                    fallback: Realization::RamReadWriteVpm,
                }),
                AddressSpace::Global => Ok(MemoryAccess {
                    preferred: Realization::RamReadWriteVpm,
                    fallback: Realization::RamReadWriteVpm,
                }),
                AddressSpace::Local => Ok(MemoryAccess {
                    preferred: Realization::RamReadWriteVpm,
                    fallback: Realization::RamReadWriteVpm,
                }),
                AddressSpace::Private => Err(CompileError::invalid_address_space(local.to_string())),
            },
            LocalOrigin::StackAllocation => {
                if matches!(&local.ty, Ty::Struct(_)) {
                    Ok(MemoryAccess {
                        preferred: Realization::RamReadWriteVpm,
                        fallback: Realization::RamReadWriteVpm,
                    })
                } else if local.ty.is_simple_type() {
                    Ok(MemoryAccess {
                        preferred: Realization::QpuRegisterReadwrite,
                        fallback: Realization::VpmPerQpu,
                    })
                } else if local.ty.convert_small_array_to_register().is_some() {
                    Ok(MemoryAccess {
                        preferred: Realization::QpuRegisterReadwrite,
                        fallback: Realization::RamReadWriteVpm,
                    })
                } else {
                    Ok(MemoryAccess {
                        preferred: Realization::VpmPerQpu,
                        fallback: Realization::RamReadWriteVpm,
                    })
                }
            }
            LocalOrigin::Global { constant: true, .. } => {
                if constant_folded_value.is_some() || local.ty.convert_small_array_to_register().is_some() {
                    Ok(MemoryAccess {
                        preferred: Realization::QpuRegisterReadonly,
                        fallback: Realization::QpuRegisterReadonly,
                    })
                } else {
                    Ok(MemoryAccess {
                        preferred: Realization::RamLoadTmu,
                        fallback: Realization::RamReadWriteVpm,
                    })
                }
            }
            LocalOrigin::Global { constant: false, .. } => {
                if matches!(&local.ty, Ty::Struct(_)) {
                    Ok(MemoryAccess {
                        preferred: Realization::RamReadWriteVpm,
                        fallback: Realization::RamReadWriteVpm,
                    })
                } else {
                    Ok(MemoryAccess {
                        preferred: Realization::VpmSharedAccess,
                        fallback: Realization::RamReadWriteVpm,
                    })
                }
            }
            LocalOrigin::Transient => Err(CompileError::unmappable_phi(local.to_string())),
        }
    }

    /// Turns a preferred/fallback pair into the actual `MemoryInfo`, attempting whatever VPM
    /// reservation the preferred realization requires and falling back if it doesn't fit.
    fn finalize(
        &mut self,
        local: &Local,
        owner: LocalId,
        access: MemoryAccess,
        ranges: &[MemoryAccessRange],
        constant_folded_value: Option<Value>,
    ) -> MemoryInfo {
        match access.preferred {
            Realization::QpuRegisterReadonly => {
                let mut info = MemoryInfo::new(Realization::QpuRegisterReadonly);
                info.precomputed_value = constant_folded_value;
                info.lowered_type = local.ty.convert_small_array_to_register();
                info
            }
            Realization::QpuRegisterReadwrite => {
                let mut info = MemoryInfo::new(Realization::QpuRegisterReadwrite);
                info.lowered_type = local.ty.convert_small_array_to_register();
                info
            }
            Realization::RamLoadTmu => {
                let mut info = MemoryInfo::new(Realization::RamLoadTmu);
                info.tmu_index = next_tmu_index();
                info
            }
            Realization::VpmPerQpu => match self.vpm.add_area(owner, type_footprint_vectors(&local.ty), false, None) {
                Some(area) => {
                    let mut info = MemoryInfo::new(Realization::VpmPerQpu);
                    info.area = Some(area);
                    info
                }
                None => MemoryInfo::new(access.fallback),
            },
            Realization::VpmSharedAccess => match self.vpm.add_area(owner, type_footprint_vectors(&local.ty), true, None) {
                Some(area) => {
                    let mut info = MemoryInfo::new(Realization::VpmSharedAccess);
                    info.area = Some(area);
                    info
                }
                None => MemoryInfo::new(access.fallback),
            },
            Realization::RamReadWriteVpm => {
                let mut info = MemoryInfo::new(Realization::RamReadWriteVpm);
                if self.is_local_address_space(local) {
                    self.try_cache_in_vpm(&mut info, owner, ranges);
                }
                info
            }
        }
    }

    fn is_local_address_space(&self, local: &Local) -> bool {
        matches!(&local.origin, LocalOrigin::Parameter { address_space: AddressSpace::Local })
    }

    /// §4.4 "Cache-in-VPM check". Upgrades `info` to `VpmSharedAccess` in place iff every step
    /// succeeds; leaves it untouched (still `RamReadWriteVpm`) on any of the three named
    /// recoverable failures (`UniformMismatch`, range overflow, `RangeTooWide`).
    fn try_cache_in_vpm(&mut self, info: &mut MemoryInfo, owner: LocalId, ranges: &[MemoryAccessRange]) {
        if ranges.is_empty() {
            return;
        }

        let Some(offset) = combine_uniform_checked(ranges) else {
            log::debug!(target: "memory_classifier", "owner={owner:?}: UniformMismatch, falling back to uncached DMA");
            return;
        };
        let Some(offset) = offset else {
            return; // no bounded offset at all.
        };
        if offset.max < offset.min {
            return;
        }
        let Ok(width) = u32::try_from(offset.len()) else {
            log::debug!(target: "memory_classifier", "owner={owner:?}: offset range overflow, falling back to uncached DMA");
            return;
        };
        if width == 0 || width >= self.max_cache_vectors {
            log::debug!(target: "memory_classifier", "owner={owner:?}: RangeTooWide ({width} >= {}), falling back to uncached DMA", self.max_cache_vectors);
            return;
        }

        let Some(area) = self.vpm.add_area(owner, width, true, None) else {
            log::debug!(target: "memory_classifier", "owner={owner:?}: VPM full, falling back to uncached DMA");
            return;
        };

        info.realization = Realization::VpmSharedAccess;
        info.area = Some(area);
        info.cached_ranges.push(CachedRange { offset, area });
    }
}

/// §4.4 step 1: every access's uniform-part set must be identical. If not, and every difference
/// is a literal, the literal differences are folded in (the combined offset range already
/// accounts for them since literals contribute to `offset_range`, not `group_uniform_parts`) and
/// the check passes on retry. Returns `None` on an unrecoverable mismatch, `Some(range)`
/// (possibly `None` inside) otherwise.
fn combine_uniform_checked(ranges: &[MemoryAccessRange]) -> Option<Option<IntegerRange>> {
    let reference = &ranges.first()?.group_uniform_parts;

    let all_match = ranges.iter().all(|r| &r.group_uniform_parts == reference);
    if !all_match {
        let all_recoverable = ranges.iter().all(|r| {
            r.group_uniform_parts.len() == reference.len()
                && r.group_uniform_parts
                    .iter()
                    .zip(reference.iter())
                    .all(|(a, b)| a == b || (a.is_literal() && b.is_literal()))
        });
        if !all_recoverable {
            return None;
        }
    }

    let mut combined: Option<IntegerRange> = None;
    for r in ranges {
        combined = match (combined, r.offset_range) {
            (None, Some(x)) => Some(x),
            (Some(acc), Some(x)) => Some(acc.widen(x)),
            (acc, None) => acc,
        };
    }
    Some(combined)
}

/// §4.4 "Global (non-parameter)" constant folding: derives a precomputed register value for a
/// `Global{constant: true}` base directly from its declared initializer, rather than relying on
/// a value the caller must have already folded. Grounded on `getConstantValue`
/// (`MemoryMapChecks.cpp:45-73`), minus its final "element-number vector" special case, which has
/// no counterpart in this IR's value model.
fn constant_value_for_local(local: &Local, ranges: &[MemoryAccessRange]) -> Option<Value> {
    match &local.origin {
        LocalOrigin::Global { constant: true, initializer: Some(initializer) } => {
            constant_value_for_global(initializer, ranges)
        }
        _ => None,
    }
}

fn constant_value_for_global(initializer: &GlobalInitializer, ranges: &[MemoryAccessRange]) -> Option<Value> {
    match initializer {
        GlobalInitializer::Scalar(literal) | GlobalInitializer::AllSame(literal) => Some(Value::Literal(*literal)),
        GlobalInitializer::Compound(elements) => {
            let index = single_known_index(ranges)?;
            elements.get(index as usize).copied().map(Value::Literal)
        }
    }
}

/// The single address offset every access range agrees on exactly (`min == max`), recovering the
/// "fixed index" `getConstantValue` reads off `source.local()->reference.second` for a compound
/// initializer — applied across every access this base has, rather than one reference at a time,
/// since `classify` only sees the base and its aggregated ranges.
fn single_known_index(ranges: &[MemoryAccessRange]) -> Option<u32> {
    let mut index = None;
    for range in ranges {
        let exact = range.offset_range?;
        if exact.min != exact.max {
            return None;
        }
        let candidate = u32::try_from(exact.min).ok()?;
        match index {
            None => index = Some(candidate),
            Some(existing) if existing == candidate => {}
            Some(_) => return None,
        }
    }
    index
}

fn type_footprint_vectors(ty: &Ty) -> u32 {
    match ty {
        Ty::Array(array) => array.size.div_ceil(u32::from(NATIVE_VECTOR_SIZE)).max(1),
        _ => 1,
    }
}
