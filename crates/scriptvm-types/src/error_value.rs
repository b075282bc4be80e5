//! `ErrorValue`: the payload carried by a fallible `Value` on its error side
//! (spec §3, §6.4).

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// `{error_type_name, message, arguments, source_location}` (spec §6.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub error_type_name: String,
    pub message: String,
    pub arguments: Vec<Value>,
    /// The source-line operand of the raising opcode, when applicable
    /// (spec §6.4).
    pub source_location: Option<u32>,
}

impl ErrorValue {
    pub fn new(error_type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorValue {
            error_type_name: error_type_name.into(),
            message: message.into(),
            arguments: Vec::new(),
            source_location: None,
        }
    }

    pub fn with_location(mut self, line: u32) -> Self {
        self.source_location = Some(line);
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }
}
