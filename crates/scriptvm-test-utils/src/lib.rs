//! Bytecode-builder and tracing helpers for the workspace's own test suites
//! — not part of the VM's public API surface, analogous to the teacher's
//! `move-compiler`-adjacent test utilities used only behind `#[cfg(test)]`.

use scriptvm_runtime::{Instruction, OpCode};
use std::sync::Once;

/// A small fluent assembler over [`Instruction`]s, for building bytecode
/// vectors in tests without hand-writing tuples. `source_line` defaults to
/// the instruction's position in the stream unless overridden.
#[derive(Default)]
pub struct BytecodeBuilder {
    instructions: Vec<Instruction>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, instr: Instruction) -> &mut Self {
        self.instructions.push(instr);
        self
    }

    fn here(&self) -> u32 {
        self.instructions.len() as u32
    }

    pub fn push_int(&mut self, value: i64) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::PushInt, line).with_int(value))
    }

    pub fn push_float(&mut self, value: f64) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::PushFloat, line).with_float(value))
    }

    pub fn push_string(&mut self, value: impl Into<std::sync::Arc<str>>) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::PushString, line).with_string(value))
    }

    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::PushBool, line).with_int(value as i64))
    }

    pub fn push_none(&mut self) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::PushNone, line))
    }

    pub fn op(&mut self, opcode: OpCode) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(opcode, line))
    }

    pub fn store_var(&mut self, name: impl Into<std::sync::Arc<str>>) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::StoreVar, line).with_string(name))
    }

    pub fn load_var(&mut self, name: impl Into<std::sync::Arc<str>>) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::LoadVar, line).with_string(name))
    }

    pub fn call(&mut self, name: impl Into<std::sync::Arc<str>>, argc: i64) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::Call, line).with_string(name).with_int(argc))
    }

    /// Emits a `BeginTry` whose `int_operand` is a *relative* jump target —
    /// same convention `Jump` uses (`signed_target`): relative to the
    /// instruction immediately after this one.
    pub fn begin_try(&mut self, relative_handler_offset: i64) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::BeginTry, line).with_int(relative_handler_offset))
    }

    pub fn jump(&mut self, relative_offset: i64) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::Jump, line).with_int(relative_offset))
    }

    pub fn jump_if_false(&mut self, relative_offset: i64) -> &mut Self {
        let line = self.here();
        self.emit(Instruction::new(OpCode::JumpIfFalse, line).with_int(relative_offset))
    }

    /// Current instruction count — usable to compute relative offsets for
    /// forward jumps once the target site is known.
    pub fn position(&self) -> u32 {
        self.here()
    }

    pub fn finish(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.instructions)
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs an `EnvFilter`-driven `tracing` subscriber exactly once per test
/// binary; safe to call from every test's first line.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init().ok();
    });
}
