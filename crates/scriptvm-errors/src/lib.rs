//! Error catalog and diagnostics shared across the workspace.
//!
//! Two tiers, mirroring `move_binary_format::errors::{PartialVMError, VMError}`:
//! [`PartialError`] is raised deep inside a component before any source
//! location is known; [`Diagnostic`] is what a [`Location`] turns it into
//! once a `VMContext` observes the failure (spec §7).

mod diagnostic;
mod hints;
mod kind;
mod partial;
mod stage;

pub use diagnostic::{Diagnostic, Location};
pub use hints::lookup_hint;
pub use kind::ErrorKind;
pub use partial::PartialError;
pub use stage::Stage;

/// Convenience alias used throughout the workspace for operations that can
/// fail before a source location is known.
pub type PartialResult<T> = Result<T, PartialError>;
