//! Fork/join helpers for driving multiple [`VMContext`]s across OS threads
//! (spec §9, "Coroutines vs threads" — threads, not a coroutine scheduler,
//! are the primary concurrency model here).
//!
//! `VMContext` is deliberately `!Send`: it owns a [`scriptvm_memory::MemoryRegion`],
//! itself `Rc`-based (spec §5, "single-thread-owned per context"). `VirtualMachine`
//! holds only `Arc`/lock-protected state and is `Send + Sync`, so rather than
//! building contexts on one thread and moving them to others, each spawned
//! thread builds its own context from a shared `Arc<VirtualMachine>`.

use crate::context::VMContext;
use crate::vm::VirtualMachine;
use scriptvm_errors::PartialResult;
use scriptvm_types::Value;
use std::sync::Arc;
use std::thread;

/// One child context's outcome: the ordinal `BeginParallel count` assigned
/// it (0..count — distinct from `VMContext::context_id`, which is a
/// VM-global counter) and what [`VirtualMachine::run`] returned.
pub struct ChildOutcome {
    pub ordinal: u32,
    pub result: PartialResult<Value>,
}

/// Spawns `count` child contexts on their own OS threads, each starting at
/// `entry_ip(ordinal)` after `prime` has had a chance to push arguments
/// onto the fresh context, and blocks until every child has returned or
/// raised — the fork/join semantics `BeginParallel count` / `EndParallel`
/// describe (spec §8 scenario 6: "launches `k` child contexts executing an
/// idempotent body ...; `EndParallel` awaits all children").
pub fn fork_join<EntryFn, PrimeFn>(vm: &Arc<VirtualMachine>, count: u32, entry_ip: EntryFn, prime: PrimeFn) -> Vec<ChildOutcome>
where
    EntryFn: Fn(u32) -> usize + Send + Sync + 'static,
    PrimeFn: Fn(u32, &mut VMContext) + Send + Sync + 'static,
{
    let entry_ip = Arc::new(entry_ip);
    let prime = Arc::new(prime);

    let handles: Vec<_> = (0..count)
        .map(|ordinal| {
            let vm = Arc::clone(vm);
            let entry_ip = Arc::clone(&entry_ip);
            let prime = Arc::clone(&prime);
            thread::spawn(move || {
                let mut ctx = vm.new_context();
                ctx.ip = entry_ip(ordinal);
                prime(ordinal, &mut ctx);
                let result = vm.run(&mut ctx);
                ChildOutcome { ordinal, result }
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().expect("child context thread panicked")).collect()
}
