//! `Value`, `Payload`, and the `TypeSystem` operations defined over them
//! (spec §3 component B, §4 TypeSystem operations).

mod error_value;
mod iterator;
pub mod typesystem;
mod value;

pub use error_value::ErrorValue;
pub use iterator::IteratorHandle;
pub use typesystem::TypeSystem;
pub use value::{Callable, FallibleState, Instance, Payload, Value};
