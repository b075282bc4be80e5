//! The error-type name registry `ErrorUnion` type construction checks
//! against (spec §4.2, invariant "no structural error-type loss").

use scriptvm_errors::{ErrorKind, PartialError, PartialResult};
use std::collections::BTreeSet;

/// Names of user-declared error types known to the `TypeSystem`.
#[derive(Debug, Clone, Default)]
pub struct ErrorTypeRegistry {
    names: BTreeSet<String>,
}

impl ErrorTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Validates that every name in `errs` is registered, failing with
    /// `UnknownErrorType` otherwise (spec §4.2).
    pub fn validate(&self, errs: &BTreeSet<String>) -> PartialResult<()> {
        for name in errs {
            if !self.is_registered(name) {
                return Err(PartialError::new(
                    ErrorKind::UnknownErrorType,
                    format!("error type `{name}` is not registered"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_name_is_rejected() {
        let registry = ErrorTypeRegistry::new();
        let mut errs = BTreeSet::new();
        errs.insert("NotFound".to_string());
        let err = registry.validate(&errs).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownErrorType);
    }

    #[test]
    fn registered_names_pass() {
        let mut registry = ErrorTypeRegistry::new();
        registry.register("NotFound");
        let mut errs = BTreeSet::new();
        errs.insert("NotFound".to_string());
        assert!(registry.validate(&errs).is_ok());
    }
}
