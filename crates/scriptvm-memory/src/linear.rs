//! `Linear<T>`: move-only, exclusive ownership into a `MemoryRegion` (spec §3).

use crate::region::{Generation, MemoryRegion, SlotIndex};
use scriptvm_errors::PartialResult;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};

/// A move-only owning handle. Non-copyable; releases its pointee to the
/// owning region on drop unless already released by explicit transfer
/// (spec §3).
pub struct Linear<T> {
    data: Option<Box<T>>,
    region: MemoryRegion,
    index: SlotIndex,
    generation: Generation,
}

impl<T> Linear<T> {
    pub(crate) fn new(region: MemoryRegion, index: SlotIndex, generation: Generation, value: T) -> Self {
        Linear {
            data: Some(Box::new(value)),
            region,
            index,
            generation,
        }
    }

    /// The generation this value was allocated in.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The arena slot backing this handle, for `MemoryRegion::generation_of`
    /// lookups.
    pub fn slot_index(&self) -> SlotIndex {
        self.index
    }

    /// Consumes the handle, releasing its bookkeeping slot early (before
    /// the owning generation exits) and returning the owned value. This is
    /// the spec's "explicit transfer" (§3): the value moves on, but this
    /// arena slot is done.
    pub fn into_inner(mut self) -> T {
        let value = *self.data.take().expect("Linear always holds a value until dropped");
        self.region.release(self.index, mem::size_of::<T>().max(1));
        value
    }
}

impl<T> Deref for Linear<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data.as_ref().expect("Linear always holds a value until dropped")
    }
}

impl<T> DerefMut for Linear<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data.as_mut().expect("Linear always holds a value until dropped")
    }
}

impl<T> Drop for Linear<T> {
    fn drop(&mut self) {
        if self.data.take().is_some() {
            self.region.release(self.index, mem::size_of::<T>().max(1));
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Linear<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linear")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .field("value", &self.data)
            .finish()
    }
}

impl MemoryRegion {
    /// Acquires memory, constructs `T` in place, records the allocation
    /// under the current generation, and returns a `Linear<T>` (spec
    /// §4.1).
    pub fn alloc<T>(&self, init: T) -> PartialResult<Linear<T>> {
        let size = mem::size_of::<T>().max(1);
        let (index, generation) = self.reserve(size)?;
        Ok(Linear::new(self.clone(), index, generation, init))
    }
}
