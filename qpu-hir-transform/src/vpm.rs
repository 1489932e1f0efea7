use qpu_hir::LocalId;

/// A reserved region of VPM, sized in `vec<i32>`-equivalent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VpmArea {
    pub id: u32,
    /// Size of this area, in rows of a 16-lane, 4-byte-per-lane vector.
    pub size_vectors: u32,
    pub shared: bool,
}

#[derive(Debug, Clone)]
struct AreaRecord {
    owner: LocalId,
    area: VpmArea,
}

/// Per-method, serial allocator for on-chip VPM scratch space.
///
/// Grounded on §5 "VPM manager": `addArea` allocates a contiguous region or returns `None` if
/// full; deallocation is implicit at method end (there is no `removeArea`, matching the
/// original's `VPM::addArea` contract — areas live for the method's lifetime).
#[derive(Debug, Clone)]
pub struct VpmManager {
    capacity_vectors: u32,
    used_vectors: u32,
    areas: Vec<AreaRecord>,
    next_id: u32,
}

impl VpmManager {
    pub fn new(capacity_vectors: u32) -> Self {
        Self {
            capacity_vectors,
            used_vectors: 0,
            areas: Vec::new(),
            next_id: 0,
        }
    }

    /// Reserve a contiguous VPM region of `size_vectors` rows for `owner`. `shared` marks a
    /// work-group-shared area (VPM_SHARED_ACCESS) as opposed to a per-QPU private area
    /// (VPM_PER_QPU); `workgroup_size` is accepted for parity with the source signature
    /// (`VPM::addArea(local, type, shared, [workgroupSize])`) but does not change the allocation
    /// size here: per-QPU multiplicities are the encoder's concern, not the planner's.
    pub fn add_area(
        &mut self,
        owner: LocalId,
        size_vectors: u32,
        shared: bool,
        _workgroup_size: Option<u32>,
    ) -> Option<VpmArea> {
        if self.used_vectors.checked_add(size_vectors)? > self.capacity_vectors {
            return None;
        }
        let area = VpmArea {
            id: self.next_id,
            size_vectors,
            shared,
        };
        self.next_id += 1;
        self.used_vectors += size_vectors;
        self.areas.push(AreaRecord { owner, area });
        Some(area)
    }

    /// Remaining capacity, i.e. the largest cache range the DMA cache-in-VPM check (§4.4) could
    /// still reserve. Named to match the source's `VPM::getMaxCacheVectors`.
    pub fn max_cache_vectors(&self) -> u32 {
        self.capacity_vectors - self.used_vectors
    }

    pub fn area_for(&self, owner: LocalId) -> Option<VpmArea> {
        self.areas.iter().find(|r| r.owner == owner).map(|r| r.area)
    }
}
