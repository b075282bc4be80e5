//! The virtual machine: a flat bytecode vector, a fetch-decode-dispatch
//! loop, and per-thread `VMContext`s sharing one `VirtualMachine`'s
//! registries (spec §4.6).

pub mod bytecode;
pub mod concurrency;
pub mod context;
pub mod dispatch;
pub mod environment;
pub mod vm;

pub use bytecode::{Instruction, OpCode, ParamDecl};
pub use concurrency::{fork_join, ChildOutcome};
pub use context::{CallFrame, ExceptionState, LoopMarker, TryEntry, VMContext};
pub use dispatch::Flow;
pub use environment::{Environment, EnvironmentChain};
pub use vm::VirtualMachine;
