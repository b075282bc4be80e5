//! The generational arena itself (spec §4.1).

use crate::pool::Pools;
use scriptvm_errors::{ErrorKind, PartialError, PartialResult};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// A monotone scope identifier; a scope exit reclaims exactly one
/// generation (spec GLOSSARY).
pub type Generation = u32;

/// An index into a region's bookkeeping table. Stands in for the spec's raw
/// pointer (`Ref<T>` holds `(pointer, owning region, ...)`) — see
/// SPEC_FULL.md §4.1 for why an index-based arena was chosen over raw
/// pointers.
pub type SlotIndex = u32;

struct Inner {
    next_index: SlotIndex,
    /// Generation each live index was allocated in. Absence means the index
    /// was never allocated, or has since been fully released.
    owners: std::collections::HashMap<SlotIndex, Generation>,
    /// `generations[g]` lists every index allocated while generation `g`
    /// was current. `generations.len() - 1` is the current generation.
    generations: Vec<Vec<SlotIndex>>,
    pools: Pools,
}

/// Arena with nested generations; owns the bookkeeping for every `Linear`
/// and `Ref` allocated inside (spec §3, "Ownership & Lifetime").
///
/// Not `Send`/`Sync` by construction (`Rc`-backed): spec §4.1 states
/// "regions are not shared across threads" — this is enforced by the type
/// system rather than documented as a convention.
#[derive(Clone)]
pub struct MemoryRegion(Rc<RefCell<Inner>>);

impl MemoryRegion {
    pub fn new() -> Self {
        MemoryRegion(Rc::new(RefCell::new(Inner {
            next_index: 0,
            owners: std::collections::HashMap::new(),
            generations: vec![Vec::new()],
            pools: Pools::new(),
        })))
    }

    /// Installs a hard cap on pool capacity, turning pool exhaustion into
    /// `OutOfMemory` instead of growing forever. Intended for tests.
    pub fn with_max_pool_capacity(max_capacity: usize) -> Self {
        let region = Self::new();
        region.0.borrow_mut().pools.max_capacity = Some(max_capacity);
        region
    }

    /// The current generation, `G` in spec §4.1.
    pub fn current_generation(&self) -> Generation {
        (self.0.borrow().generations.len() - 1) as Generation
    }

    /// Increments the current generation; subsequent allocations belong to
    /// it (spec §4.1).
    pub fn enter_scope(&self) -> Generation {
        let mut inner = self.0.borrow_mut();
        inner.generations.push(Vec::new());
        let gen = (inner.generations.len() - 1) as Generation;
        debug!(generation = gen, "entered scope");
        gen
    }

    /// For every allocation recorded under the current generation, frees
    /// the bookkeeping slot; decrements `G`. A no-op when `G == 0` (spec
    /// §4.1).
    ///
    /// Returns the indices released, so callers (`Linear`/`Ref` owners who
    /// leaked their handle) can be told their pointee is gone; ordinary
    /// `Linear`/`Ref` drops already remove themselves and never appear
    /// here.
    pub fn exit_scope(&self) -> Vec<SlotIndex> {
        let mut inner = self.0.borrow_mut();
        if inner.generations.len() == 1 {
            // G == 0: silent no-op per spec §4.1.
            return Vec::new();
        }
        let released = inner.generations.pop().unwrap_or_default();
        for index in &released {
            inner.owners.remove(index);
        }
        let gen = (inner.generations.len() - 1) as Generation;
        debug!(generation = gen, freed = released.len(), "exited scope");
        released
    }

    /// Returns the generation that owns `index`, or `0` if the index is
    /// unknown or has already been released (spec §4.1, `get_generation`).
    pub fn generation_of(&self, index: SlotIndex) -> Generation {
        self.0
            .borrow()
            .owners
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    /// Reserves a fresh index under the current generation for an
    /// allocation of `size` bytes, failing with `InvalidAllocation` or
    /// `OutOfMemory` per spec §4.1's failure modes.
    pub(crate) fn reserve(&self, size: usize) -> PartialResult<(SlotIndex, Generation)> {
        if size == 0 {
            return Err(PartialError::new(
                ErrorKind::InvalidAllocation,
                "cannot allocate a zero-size value",
            ));
        }
        let mut inner = self.0.borrow_mut();
        if !inner.pools.record_alloc(size) {
            return Err(PartialError::new(
                ErrorKind::OutOfMemory,
                "pool exhausted and expansion exceeded its configured cap",
            ));
        }
        let index = inner.next_index;
        inner.next_index += 1;
        let gen = (inner.generations.len() - 1) as Generation;
        inner.owners.insert(index, gen);
        inner.generations[gen as usize].push(index);
        Ok((index, gen))
    }

    /// Releases `index` explicitly (a `Linear` drop or transfer, or the
    /// last `Ref` clone dropping), ahead of its owning generation's exit.
    pub(crate) fn release(&self, index: SlotIndex, size: usize) {
        let mut inner = self.0.borrow_mut();
        if let Some(gen) = inner.owners.remove(&index) {
            if let Some(list) = inner.generations.get_mut(gen as usize) {
                list.retain(|&i| i != index);
            }
            inner.pools.record_free(size);
        }
    }
}

impl Default for MemoryRegion {
    fn default() -> Self {
        Self::new()
    }
}
