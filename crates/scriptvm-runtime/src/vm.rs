//! `VirtualMachine`: global VM state (spec §4.6) — the shared bytecode
//! vector, registries, and the native-function map — plus construction of
//! fresh per-thread `VMContext`s.

use crate::bytecode::Instruction;
use crate::context::VMContext;
use parking_lot::RwLock;
use scriptvm_classes::ClassRegistry;
use scriptvm_config::VMConfig;
use scriptvm_errors::{Diagnostic, Location, PartialError};
use scriptvm_functions::{FunctionRegistry, FunctionSignature, NativeCallback};
use scriptvm_types::TypeSystem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Global, shareable VM state (spec §4.6, "Global VM state"). Registries are
/// each behind their own `RwLock` rather than one coarse mutex — read-mostly
/// workload (method/function lookup vastly outnumbers definition) — while
/// still serializing all mutation, which is the invariant the spec's single
/// mutex actually protects (see SPEC_FULL.md §4.6).
pub struct VirtualMachine {
    pub bytecode: Arc<Vec<Instruction>>,
    pub type_system: Arc<TypeSystem>,
    pub classes: Arc<RwLock<ClassRegistry>>,
    pub functions: Arc<RwLock<FunctionRegistry>>,
    pub config: VMConfig,
    next_context_id: AtomicU32,
}

impl VirtualMachine {
    pub fn new(bytecode: Vec<Instruction>, config: VMConfig) -> Self {
        VirtualMachine {
            bytecode: Arc::new(bytecode),
            type_system: Arc::new(TypeSystem::new()),
            classes: Arc::new(RwLock::new(ClassRegistry::new())),
            functions: Arc::new(RwLock::new(FunctionRegistry::new())),
            config,
            next_context_id: AtomicU32::new(0),
        }
    }

    pub fn register_native(
        &self,
        name: impl Into<String>,
        signature: FunctionSignature,
        callback: NativeCallback,
    ) {
        let name = name.into();
        tracing::debug!(function = %name, "registering native function");
        self.functions.write().register_native(name, signature, callback);
    }

    /// Allocates a fresh `VMContext` with its own context id and a
    /// thread-owned `MemoryRegion` (spec §5, "the root MemoryRegion is
    /// single-thread-owned per context").
    pub fn new_context(&self) -> VMContext {
        let id = self.next_context_id.fetch_add(1, Ordering::SeqCst);
        VMContext::new(id)
    }

    /// Turns a `PartialError` observed while running `context` into the
    /// structured terminal record spec §7 describes, using the
    /// instruction's source line as the only location info the VM itself
    /// can supply.
    pub fn diagnostic_for(&self, error: PartialError, source_line: u32) -> Diagnostic {
        Diagnostic::from_partial(error, Location::at_line(source_line))
    }
}
