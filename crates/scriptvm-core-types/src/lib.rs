//! Core type vocabulary shared by the rest of the workspace: `Tag`, the
//! numeric lattice, `TypeDescriptor`, union canonicalization, and the
//! error-type registry (spec §3, component A: TypeDescriptor).

mod descriptor;
mod error_registry;
mod numeric;
mod tag;
mod union_canon;

pub use descriptor::{EnumVariant, ErrorSpec, TypeDescriptor, TypeExtra, TypeRef};
pub use error_registry::ErrorTypeRegistry;
pub use numeric::{is_safe_widen, wider};
pub use tag::Tag;
pub use union_canon::canonicalize_union;
