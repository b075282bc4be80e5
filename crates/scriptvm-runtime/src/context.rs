//! `VMContext`: per-thread execution state (spec §4.6).

use crate::environment::{Environment, EnvironmentChain};
use scriptvm_memory::MemoryRegion;
use scriptvm_types::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub function_name: String,
    pub return_ip: usize,
    /// Operand-stack depth at the moment of the call; `Return` truncates
    /// back to this depth before pushing the result (spec §4.5 step 3).
    pub base_pointer: usize,
    /// Environment-chain depth to restore on return.
    pub env_depth: usize,
}

/// A `BeginTry` entry: exactly what spec §4.6's exception state machine
/// says it records.
#[derive(Debug, Clone, Copy)]
pub struct TryEntry {
    pub call_stack_depth: usize,
    pub operand_stack_depth: usize,
    /// `ctx.environments.depth()` at the moment `BeginTry` ran — recorded
    /// separately from `call_stack_depth` since a `BeginScope` opens an
    /// environment frame with no matching call frame, so the two can
    /// diverge by the time a `Throw` inside that scope unwinds.
    pub environment_depth: usize,
    pub handler_ip: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionState {
    Running,
    InTry,
    Unwinding,
    Handling,
}

/// Marks an active loop for break/continue resolution (spec §4.6). Loop
/// bytecode lowers `break`/`continue` to `Jump` before reaching the VM (see
/// `BreakOutsideLoop`/`ContinueOutsideLoop`, front-end-stage errors), so
/// nothing in the dispatch loop pops this automatically; it exists so a
/// front end sharing this VM's context type has somewhere to record loop
/// boundaries.
#[derive(Debug, Clone, Copy)]
pub struct LoopMarker {
    pub break_target: usize,
    pub continue_target: usize,
}

pub struct VMContext {
    pub context_id: u32,
    pub operand_stack: Vec<Value>,
    pub call_stack: Vec<CallFrame>,
    pub environments: EnvironmentChain,
    pub ip: usize,
    pub last_exception: Option<Value>,
    /// Set by `Throw` just before it returns `Err`, holding the exact
    /// Value that was thrown; `enter_exception` consumes it so the caught
    /// handler sees that Value unchanged rather than a re-synthesized one
    /// (spec §4.6, "push the exception Value").
    pub pending_thrown: Option<Value>,
    pub loop_control: Vec<LoopMarker>,
    pub try_stack: Vec<TryEntry>,
    pub exception_state: ExceptionState,
    pub region: MemoryRegion,
    pub cancelled: Arc<AtomicBool>,
    pub deadline: Option<Instant>,
    pub instructions_executed: u64,
}

impl VMContext {
    pub fn new(context_id: u32) -> Self {
        VMContext {
            context_id,
            operand_stack: Vec::new(),
            call_stack: Vec::new(),
            environments: EnvironmentChain::new(),
            ip: 0,
            last_exception: None,
            pending_thrown: None,
            loop_control: Vec::new(),
            try_stack: Vec::new(),
            exception_state: ExceptionState::Running,
            region: MemoryRegion::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
            instructions_executed: 0,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn push(&mut self, value: Value) {
        self.operand_stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.operand_stack.pop()
    }

    pub fn peek(&self) -> Option<&Value> {
        self.operand_stack.last()
    }

    pub fn push_call_frame(&mut self, frame: CallFrame, new_env: Environment) {
        self.call_stack.push(frame);
        self.environments.push(new_env);
    }

    /// Unwinds to the given try entry: truncates the call stack and
    /// operand stack to their recorded depths (spec §4.6, Unwinding).
    pub fn unwind_to(&mut self, entry: TryEntry) {
        self.call_stack.truncate(entry.call_stack_depth);
        self.operand_stack.truncate(entry.operand_stack_depth);
        self.environments.truncate(entry.environment_depth);
        self.ip = entry.handler_ip;
    }
}
