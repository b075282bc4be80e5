//! The outer, location-attached error record surfaced to a VM's caller.

use crate::hints::lookup_hint;
use crate::kind::ErrorKind;
use crate::partial::PartialError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The structured terminal error record described in spec §7: a runtime
/// error that escapes the outermost `VMContext` terminates that context
/// with exactly this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: u32,
    pub kind: ErrorKind,
    pub description: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub problematic_token: Option<String>,
    pub hint: Option<&'static str>,
    pub suggestion: Option<&'static str>,
    pub caused_by: Option<String>,
    pub context_lines: Vec<String>,
}

impl Diagnostic {
    /// Builds a `Diagnostic` from a [`PartialError`] plus the location
    /// information only available once the error is observed by the running
    /// context (spec §7: errors are location-free until they reach here).
    pub fn from_partial(partial: PartialError, location: Location) -> Self {
        let (hint, suggestion) = lookup_hint(partial.kind.stage(), partial.message());
        Diagnostic {
            code: partial.kind.code(),
            kind: partial.kind,
            description: partial.message().to_owned(),
            file: location.file,
            line: location.line,
            column: location.column,
            problematic_token: location.problematic_token,
            hint,
            suggestion,
            caused_by: location.caused_by,
            context_lines: location.context_lines,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:03}: {}", self.code, self.description)?;
        if let (Some(file), Some(line)) = (&self.file, self.line) {
            write!(f, " ({file}:{line}")?;
            if let Some(col) = self.column {
                write!(f, ":{col}")?;
            }
            write!(f, ")")?;
        }
        if let Some(hint) = self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        if let Some(suggestion) = self.suggestion {
            write!(f, "\n  suggestion: {suggestion}")?;
        }
        if let Some(caused_by) = &self.caused_by {
            write!(f, "\n  caused by: {caused_by}")?;
        }
        for line in &self.context_lines {
            write!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

/// Source-location detail attached to an error when it is observed, not when
/// it is raised — the raising opcode only knows its `source_line`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub problematic_token: Option<String>,
    pub caused_by: Option<String>,
    pub context_lines: Vec<String>,
}

impl Location {
    pub fn at_line(line: u32) -> Self {
        Location {
            line: Some(line),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_description() {
        let partial = PartialError::new(ErrorKind::DivisionByZero, "Division by zero");
        let diag = Diagnostic::from_partial(partial, Location::at_line(12));
        let text = diag.to_string();
        assert!(text.contains("E400"));
        assert!(text.contains("Division by zero"));
        assert!(text.contains(":12"));
    }
}
