//! `FunctionRegistry` (spec §4.5): functions keyed by name, each either a
//! user bytecode range or a native callback.

use crate::native::NativeCallback;
use crate::signature::FunctionSignature;
use scriptvm_errors::{ErrorKind, PartialError, PartialResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

#[derive(Clone)]
pub enum FunctionBody {
    /// `[start, end)` bytecode offsets (spec §4.5).
    User { start: u32, end: u32 },
    Native(NativeCallback),
}

impl std::fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionBody::User { start, end } => f.debug_struct("User").field("start", start).field("end", end).finish(),
            FunctionBody::Native(_) => write!(f, "Native(..)"),
        }
    }
}

#[derive(Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub signature: FunctionSignature,
    pub body: FunctionBody,
}

#[derive(Default)]
pub struct FunctionRegistry {
    functions: Vec<FunctionDefinition>,
    name_to_id: HashMap<String, FunctionId>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(&mut self, name: impl Into<String>, signature: FunctionSignature, start: u32, end: u32) -> FunctionId {
        self.register(name, signature, FunctionBody::User { start, end })
    }

    pub fn register_native(&mut self, name: impl Into<String>, signature: FunctionSignature, callback: NativeCallback) -> FunctionId {
        self.register(name, signature, FunctionBody::Native(callback))
    }

    fn register(&mut self, name: impl Into<String>, signature: FunctionSignature, body: FunctionBody) -> FunctionId {
        let name = name.into();
        let id = FunctionId(self.functions.len() as u32);
        tracing::debug!(function = %name, id = id.0, "registered function");
        self.name_to_id.insert(name.clone(), id);
        self.functions.push(FunctionDefinition { name, signature, body });
        id
    }

    pub fn get(&self, id: FunctionId) -> Option<&FunctionDefinition> {
        self.functions.get(id.0 as usize)
    }

    pub fn id_of(&self, name: &str) -> Option<FunctionId> {
        self.name_to_id.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> PartialResult<(FunctionId, &FunctionDefinition)> {
        let id = self
            .id_of(name)
            .ok_or_else(|| PartialError::new(ErrorKind::UndefinedFunction, format!("undefined function `{name}`")))?;
        Ok((id, self.get(id).expect("id_of returned a dangling FunctionId")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptvm_core_types::TypeDescriptor;

    fn sig() -> FunctionSignature {
        FunctionSignature::new(Vec::new(), TypeDescriptor::nil())
    }

    #[test]
    fn lookup_of_unregistered_name_fails_with_undefined_function() {
        let registry = FunctionRegistry::new();
        let err = registry.lookup("missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedFunction);
    }

    #[test]
    fn registered_user_function_is_looked_up_by_name() {
        let mut registry = FunctionRegistry::new();
        registry.register_user("main", sig(), 0, 10);
        let (_, def) = registry.lookup("main").unwrap();
        assert!(matches!(def.body, FunctionBody::User { start: 0, end: 10 }));
    }

    #[test]
    fn native_function_round_trips_through_the_registry() {
        use scriptvm_types::Value;
        let mut registry = FunctionRegistry::new();
        let callback = NativeCallback::new(|args: &[Value]| Ok(args[0].clone()));
        registry.register_native("identity", sig(), callback);
        let (_, def) = registry.lookup("identity").unwrap();
        match &def.body {
            FunctionBody::Native(cb) => {
                let result = cb.call(&[Value::int32(5)]).unwrap();
                assert_eq!(result, Value::int32(5));
            }
            _ => panic!("expected a native body"),
        }
    }
}
