//! The environment chain: one frame per `BeginScope`/function call,
//! holding named variable bindings and numbered temporaries (spec §4.6).

use scriptvm_types::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
    temps: Vec<Option<Value>>,
    /// The receiver bound by `LoadThis`, set when this frame belongs to a
    /// method call.
    pub this: Option<Value>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn with_this(this: Value) -> Self {
        Environment {
            this: Some(this),
            ..Environment::default()
        }
    }

    pub fn store(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn load(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn store_temp(&mut self, slot: usize, value: Value) {
        if slot >= self.temps.len() {
            self.temps.resize_with(slot + 1, || None);
        }
        self.temps[slot] = Some(value);
    }

    pub fn load_temp(&self, slot: usize) -> Option<&Value> {
        self.temps.get(slot).and_then(|v| v.as_ref())
    }

    pub fn clear_temp(&mut self, slot: usize) {
        if let Some(entry) = self.temps.get_mut(slot) {
            *entry = None;
        }
    }
}

/// The full environment chain for one `VMContext`: a stack of frames, the
/// top being the innermost active scope (spec §4.6, "current environment
/// pointer (link to parent)" realized as a stack rather than a linked
/// list of `Rc`s, since frames are always popped in LIFO order alongside
/// `MemoryRegion` generations).
#[derive(Debug, Default)]
pub struct EnvironmentChain {
    frames: Vec<Environment>,
}

impl EnvironmentChain {
    pub fn new() -> Self {
        EnvironmentChain {
            frames: vec![Environment::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: Environment) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Environment> {
        if self.frames.len() <= 1 {
            None
        } else {
            self.frames.pop()
        }
    }

    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    pub fn current(&self) -> &Environment {
        self.frames.last().expect("environment chain is never empty")
    }

    pub fn current_mut(&mut self) -> &mut Environment {
        self.frames.last_mut().expect("environment chain is never empty")
    }

    /// Resolves a variable by walking outward from the innermost frame,
    /// mirroring lexical scoping over the chain.
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.load(name))
    }

    /// Stores into the nearest frame that already binds `name`, or the
    /// current frame if none does (first assignment declares it there).
    pub fn store(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.iter_mut().rev().find(|frame| frame.load(name).is_some()) {
            frame.store(name.to_string(), value);
        } else {
            self.current_mut().store(name.to_string(), value);
        }
    }

    pub fn resolve_this(&self) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.this.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_updates_the_frame_that_already_declared_the_name() {
        let mut chain = EnvironmentChain::new();
        chain.store("x", Value::int32(1));
        chain.push(Environment::new());
        chain.store("x", Value::int32(2));
        assert_eq!(chain.resolve("x"), Some(&Value::int32(2)));
        chain.pop();
        assert_eq!(chain.resolve("x"), Some(&Value::int32(2)));
    }

    #[test]
    fn truncate_discards_inner_frames() {
        let mut chain = EnvironmentChain::new();
        chain.push(Environment::new());
        chain.push(Environment::new());
        assert_eq!(chain.depth(), 3);
        chain.truncate(1);
        assert_eq!(chain.depth(), 1);
    }
}
