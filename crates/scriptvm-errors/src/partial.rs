//! Location-free errors, the unit of failure inside `scriptvm-memory`,
//! `scriptvm-core-types`, `scriptvm-classes`, `scriptvm-functions`, and the
//! VM's own handlers before a `VMContext` attaches source location.
//!
//! Modeled on `move_binary_format::errors::PartialVMError`: a status plus an
//! optional free-form message, kept separate from the `VMError`-equivalent
//! ([`crate::Diagnostic`]) that adds where the error happened.

use crate::kind::ErrorKind;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{kind_description}{message_suffix}")]
pub struct PartialError {
    pub kind: ErrorKind,
    message: Option<String>,
    kind_description: &'static str,
    message_suffix: String,
}

impl PartialError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_suffix = format!(": {message}");
        PartialError {
            kind,
            kind_description: kind.description(),
            message_suffix,
            message: Some(message),
        }
    }

    /// A `PartialError` carrying only the kind's stable description, for
    /// call sites with nothing more specific to say.
    pub fn from_kind(kind: ErrorKind) -> Self {
        PartialError {
            kind,
            kind_description: kind.description(),
            message_suffix: String::new(),
            message: None,
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(self.kind_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_falls_back_to_kind_description() {
        let err = PartialError::from_kind(ErrorKind::StackUnderflow);
        assert_eq!(err.message(), "stack underflow");
    }

    #[test]
    fn custom_message_is_preserved() {
        let err = PartialError::new(ErrorKind::DivisionByZero, "Division by zero");
        assert_eq!(err.message(), "Division by zero");
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }
}
