//! `Value`: the tagged runtime datum that flows across the operand stack,
//! local slots, and container payloads (spec §3, component B: Value).
//!
//! Design note: `List`/`Dict` hold owned `Value`s directly rather than
//! arena handles into a `MemoryRegion` (contrast spec §9's suggestion to
//! "replace with arena indices"). See DESIGN.md for the scoped rationale;
//! none of the worked scenarios in spec §8 depend on container aliasing,
//! and `Dup` already implies stack-level value-copy semantics.

use crate::error_value::ErrorValue;
use crate::iterator::IteratorHandle;
use indexmap::IndexMap;
use scriptvm_core_types::{Tag, TypeDescriptor, TypeRef};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A function value: either a user-defined bytecode range or a registered
/// native callback index. Kept inline here (rather than re-exported from
/// `scriptvm-functions`) so `scriptvm-types` never depends on the function
/// registry crate — see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Callable {
    /// `[start, end)` bytecode offsets of a user-defined function body.
    User { start: u32, end: u32 },
    /// Index into the native function table (spec §6.5).
    Native(u32),
}

/// An instance of a user-defined class. `class_id` is a plain id rather
/// than a handle into `scriptvm-classes`, for the same reason as
/// `Callable` above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub class_id: u32,
    pub fields: IndexMap<String, Value>,
}

/// The data carried by a `Value`, independent of its declared `TypeRef`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Nil,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(Arc<str>),
    List(Vec<Value>),
    Dict(IndexMap<Value, Value>),
    Range {
        start: i64,
        end: i64,
        step: i64,
        inclusive: bool,
    },
    /// Enum variant by name, with an optional associated value (spec §3).
    Enum {
        variant: String,
        associated: Option<Box<Value>>,
    },
    /// Sum variant by index — the index is the variant's stable identity
    /// (spec §3, invariant).
    Sum { variant: u32, inner: Box<Value> },
    /// A Union-typed value boxes whichever concrete variant it currently
    /// holds; `ty` on the enclosing `Value` carries the Union descriptor.
    Union(Box<Value>),
    /// The success/error halves of a fallible value (spec §6.4).
    ErrorUnion(FallibleState),
    UserDefined(Instance),
    Function(Callable),
    Iterator(Box<IteratorHandle>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FallibleState {
    Success(Box<Value>),
    Error(ErrorValue),
}

/// A typed runtime value: a `TypeRef` paired with its `Payload` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub ty: TypeRef,
    pub data: Payload,
}

impl Value {
    pub fn new(ty: TypeRef, data: Payload) -> Self {
        Value { ty, data }
    }

    pub fn nil() -> Self {
        Value::new(TypeDescriptor::nil(), Payload::Nil)
    }

    pub fn bool(b: bool) -> Self {
        Value::new(TypeDescriptor::boolean(), Payload::Bool(b))
    }

    pub fn int8(v: i8) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::Int8), Payload::Int8(v))
    }

    pub fn int16(v: i16) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::Int16), Payload::Int16(v))
    }

    pub fn int32(v: i32) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::Int32), Payload::Int32(v))
    }

    pub fn int64(v: i64) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::Int64), Payload::Int64(v))
    }

    pub fn uint8(v: u8) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::UInt8), Payload::UInt8(v))
    }

    pub fn uint16(v: u16) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::UInt16), Payload::UInt16(v))
    }

    pub fn uint32(v: u32) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::UInt32), Payload::UInt32(v))
    }

    pub fn uint64(v: u64) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::UInt64), Payload::UInt64(v))
    }

    pub fn float32(v: f32) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::Float32), Payload::Float32(v))
    }

    pub fn float64(v: f64) -> Self {
        Value::new(TypeDescriptor::numeric(Tag::Float64), Payload::Float64(v))
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::new(TypeDescriptor::string(), Payload::String(s.into()))
    }

    pub fn list(element_ty: TypeRef, items: Vec<Value>) -> Self {
        Value::new(TypeDescriptor::list(element_ty), Payload::List(items))
    }

    pub fn dict(key_ty: TypeRef, value_ty: TypeRef, entries: IndexMap<Value, Value>) -> Self {
        Value::new(TypeDescriptor::dict(key_ty, value_ty), Payload::Dict(entries))
    }

    pub fn range(start: i64, end: i64, step: i64, inclusive: bool) -> Self {
        Value::new(
            TypeDescriptor::range(),
            Payload::Range {
                start,
                end,
                step,
                inclusive,
            },
        )
    }

    /// Wraps `inner` as the `Some` arm of an `Option(inner.ty)` value
    /// (spec §4.4, Option-as-Union sugar).
    pub fn some(inner: Value) -> Self {
        let some_ty = inner.ty.clone();
        let ty = TypeDescriptor::new(
            Tag::Option,
            scriptvm_core_types::TypeExtra::Option { some: some_ty },
        );
        Value::new(ty, Payload::Union(Box::new(inner)))
    }

    pub fn none(some_ty: TypeRef) -> Self {
        let ty = TypeDescriptor::new(Tag::Option, scriptvm_core_types::TypeExtra::Option { some: some_ty });
        Value::new(ty, Payload::Union(Box::new(Value::nil())))
    }

    pub fn is_some(&self) -> bool {
        if self.ty.tag != Tag::Option {
            return false;
        }
        match &self.data {
            Payload::Union(inner) => !matches!(inner.data, Payload::Nil),
            _ => false,
        }
    }

    pub fn is_none(&self) -> bool {
        if self.ty.tag != Tag::Option {
            return false;
        }
        match &self.data {
            Payload::Union(inner) => matches!(inner.data, Payload::Nil),
            _ => false,
        }
    }

    /// Unwraps an `Option` value, panicking if it is `None` — mirrors the
    /// VM's `UnwrapOption` opcode, which raises `UnwrapNone` instead of
    /// panicking; callers inside the VM should check `is_some` first.
    pub fn unwrap_some(self) -> Value {
        match self.data {
            Payload::Union(inner) => *inner,
            other => panic!("unwrap_some called on non-Option payload: {other:?}"),
        }
    }

    /// Wraps `inner` as the success arm of a `Result(inner.ty, err_ty)`
    /// value (spec §4.4).
    pub fn ok(inner: Value, err_ty: TypeRef) -> Self {
        let ok_ty = inner.ty.clone();
        let ty = TypeDescriptor::new(
            Tag::Result,
            scriptvm_core_types::TypeExtra::Result { ok: ok_ty, err: err_ty },
        );
        Value::new(ty, Payload::Union(Box::new(inner)))
    }

    pub fn err(error: ErrorValue, ok_ty: TypeRef, err_ty: TypeRef) -> Self {
        let ty = TypeDescriptor::new(
            Tag::Result,
            scriptvm_core_types::TypeExtra::Result { ok: ok_ty, err: err_ty },
        );
        Value::new(ty, Payload::ErrorUnion(FallibleState::Error(error)))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.ty.tag, Tag::Result) && matches!(self.data, Payload::Union(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self.ty.tag, Tag::Result) && matches!(self.data, Payload::ErrorUnion(FallibleState::Error(_)))
    }

    /// Builds a numeric `Value` of the given integer `tag` from an exact
    /// `i128` magnitude, or `None` if `value` does not fit `tag`'s range.
    /// Used by arithmetic opcodes to materialize a checked integer result.
    pub fn from_i128(tag: Tag, value: i128) -> Option<Value> {
        match tag {
            Tag::Int8 => i8::try_from(value).ok().map(Value::int8),
            Tag::Int16 => i16::try_from(value).ok().map(Value::int16),
            Tag::Int32 => i32::try_from(value).ok().map(Value::int32),
            Tag::Int64 => i64::try_from(value).ok().map(Value::int64),
            Tag::UInt8 => u8::try_from(value).ok().map(Value::uint8),
            Tag::UInt16 => u16::try_from(value).ok().map(Value::uint16),
            Tag::UInt32 => u32::try_from(value).ok().map(Value::uint32),
            Tag::UInt64 => u64::try_from(value).ok().map(Value::uint64),
            _ => None,
        }
    }

    /// Builds a numeric `Value` of the given float `tag` from an `f64`
    /// magnitude.
    pub fn from_f64(tag: Tag, value: f64) -> Option<Value> {
        match tag {
            Tag::Float32 => Some(Value::float32(value as f32)),
            Tag::Float64 => Some(Value::float64(value)),
            _ => None,
        }
    }

    /// This value's numeric magnitude as `f64`, or `None` if its payload is
    /// non-numeric. Used by arithmetic opcodes once both operands have
    /// already been widened to a common float tag.
    pub fn as_f64(&self) -> Option<f64> {
        as_f64(&self.data)
    }

    /// This value's exact integer magnitude as `i128`, or `None` if its
    /// payload is non-integer (including floats, which callers should read
    /// via [`Value::as_f64`] instead to avoid a lossy round trip).
    pub fn as_i128(&self) -> Option<i128> {
        match &self.data {
            Payload::Int8(v) => Some(*v as i128),
            Payload::Int16(v) => Some(*v as i128),
            Payload::Int32(v) => Some(*v as i128),
            Payload::Int64(v) => Some(*v as i128),
            Payload::UInt8(v) => Some(*v as i128),
            Payload::UInt16(v) => Some(*v as i128),
            Payload::UInt32(v) => Some(*v as i128),
            Payload::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Coercion used by `InterpolateString` (spec §6.2) — every value has a
    /// textual rendering.
    pub fn to_display_string(&self) -> String {
        match &self.data {
            Payload::Nil => "nil".to_string(),
            Payload::Bool(b) => b.to_string(),
            Payload::Int8(v) => v.to_string(),
            Payload::Int16(v) => v.to_string(),
            Payload::Int32(v) => v.to_string(),
            Payload::Int64(v) => v.to_string(),
            Payload::UInt8(v) => v.to_string(),
            Payload::UInt16(v) => v.to_string(),
            Payload::UInt32(v) => v.to_string(),
            Payload::UInt64(v) => v.to_string(),
            Payload::Float32(v) => v.to_string(),
            Payload::Float64(v) => v.to_string(),
            Payload::String(s) => s.to_string(),
            Payload::List(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_display_string).collect();
                format!("[{}]", rendered.join(", "))
            }
            Payload::Dict(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_display_string(), v.to_display_string()))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Payload::Range {
                start,
                end,
                inclusive,
                ..
            } => {
                if *inclusive {
                    format!("{start}..={end}")
                } else {
                    format!("{start}..{end}")
                }
            }
            Payload::Enum { variant, associated } => match associated {
                Some(v) => format!("{variant}({})", v.to_display_string()),
                None => variant.clone(),
            },
            Payload::Sum { variant, inner } => format!("#{variant}({})", inner.to_display_string()),
            Payload::Union(inner) => inner.to_display_string(),
            Payload::ErrorUnion(FallibleState::Success(inner)) => inner.to_display_string(),
            Payload::ErrorUnion(FallibleState::Error(e)) => format!("{}: {}", e.error_type_name, e.message),
            Payload::UserDefined(instance) => format!("<instance of class #{}>", instance.class_id),
            Payload::Function(Callable::User { start, end }) => format!("<function @{start}..{end}>"),
            Payload::Function(Callable::Native(idx)) => format!("<native #{idx}>"),
            Payload::Iterator(_) => "<iterator>".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

/// Structural equality over `(ty, data)`. Floats compare bitwise (via
/// `to_bits`) so that `Value` can serve as an `IndexMap`/`IndexSet` key —
/// this diverges from IEEE-754 `==` (e.g. `NaN != NaN`) the same way
/// `Tag`-level numeric comparisons in `scriptvm-core-types` never need to,
/// since this is solely about keying, not arithmetic.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && payload_eq(&self.data, &other.data)
    }
}

impl Eq for Value {}

fn payload_eq(a: &Payload, b: &Payload) -> bool {
    match (a, b) {
        (Payload::Nil, Payload::Nil) => true,
        (Payload::Bool(x), Payload::Bool(y)) => x == y,
        (Payload::Int8(x), Payload::Int8(y)) => x == y,
        (Payload::Int16(x), Payload::Int16(y)) => x == y,
        (Payload::Int32(x), Payload::Int32(y)) => x == y,
        (Payload::Int64(x), Payload::Int64(y)) => x == y,
        (Payload::UInt8(x), Payload::UInt8(y)) => x == y,
        (Payload::UInt16(x), Payload::UInt16(y)) => x == y,
        (Payload::UInt32(x), Payload::UInt32(y)) => x == y,
        (Payload::UInt64(x), Payload::UInt64(y)) => x == y,
        (Payload::Float32(x), Payload::Float32(y)) => x.to_bits() == y.to_bits(),
        (Payload::Float64(x), Payload::Float64(y)) => x.to_bits() == y.to_bits(),
        (Payload::String(x), Payload::String(y)) => x == y,
        (Payload::List(x), Payload::List(y)) => x == y,
        (Payload::Dict(x), Payload::Dict(y)) => x.len() == y.len() && x.iter().all(|(k, v)| y.get(k) == Some(v)),
        (
            Payload::Range {
                start: s1,
                end: e1,
                step: st1,
                inclusive: i1,
            },
            Payload::Range {
                start: s2,
                end: e2,
                step: st2,
                inclusive: i2,
            },
        ) => s1 == s2 && e1 == e2 && st1 == st2 && i1 == i2,
        (
            Payload::Enum {
                variant: v1,
                associated: a1,
            },
            Payload::Enum {
                variant: v2,
                associated: a2,
            },
        ) => v1 == v2 && a1 == a2,
        (Payload::Sum { variant: v1, inner: i1 }, Payload::Sum { variant: v2, inner: i2 }) => v1 == v2 && i1 == i2,
        (Payload::Union(x), Payload::Union(y)) => x == y,
        (Payload::ErrorUnion(x), Payload::ErrorUnion(y)) => match (x, y) {
            (FallibleState::Success(a), FallibleState::Success(b)) => a == b,
            (FallibleState::Error(a), FallibleState::Error(b)) => a == b,
            _ => false,
        },
        (Payload::UserDefined(x), Payload::UserDefined(y)) => x.class_id == y.class_id && x.fields == y.fields,
        (Payload::Function(x), Payload::Function(y)) => x == y,
        (Payload::Iterator(_), Payload::Iterator(_)) => false,
        _ => false,
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        hash_payload(&self.data, state);
    }
}

fn hash_payload<H: Hasher>(data: &Payload, state: &mut H) {
    match data {
        Payload::Nil => 0u8.hash(state),
        Payload::Bool(b) => b.hash(state),
        Payload::Int8(v) => v.hash(state),
        Payload::Int16(v) => v.hash(state),
        Payload::Int32(v) => v.hash(state),
        Payload::Int64(v) => v.hash(state),
        Payload::UInt8(v) => v.hash(state),
        Payload::UInt16(v) => v.hash(state),
        Payload::UInt32(v) => v.hash(state),
        Payload::UInt64(v) => v.hash(state),
        Payload::Float32(v) => v.to_bits().hash(state),
        Payload::Float64(v) => v.to_bits().hash(state),
        Payload::String(s) => s.hash(state),
        Payload::List(items) => items.hash(state),
        Payload::Dict(entries) => {
            // Order-independent: XOR per-entry hashes together.
            let mut acc = 0u64;
            for (k, v) in entries.iter() {
                let mut h = std::collections::hash_map::DefaultHasher::new();
                k.hash(&mut h);
                v.hash(&mut h);
                acc ^= h.finish();
            }
            acc.hash(state);
        }
        Payload::Range {
            start,
            end,
            step,
            inclusive,
        } => {
            start.hash(state);
            end.hash(state);
            step.hash(state);
            inclusive.hash(state);
        }
        Payload::Enum { variant, associated } => {
            variant.hash(state);
            associated.hash(state);
        }
        Payload::Sum { variant, inner } => {
            variant.hash(state);
            inner.hash(state);
        }
        Payload::Union(inner) => inner.hash(state),
        Payload::ErrorUnion(FallibleState::Success(inner)) => inner.hash(state),
        Payload::ErrorUnion(FallibleState::Error(e)) => {
            e.error_type_name.hash(state);
            e.message.hash(state);
        }
        Payload::UserDefined(instance) => {
            instance.class_id.hash(state);
            for (k, v) in instance.fields.iter() {
                k.hash(state);
                v.hash(state);
            }
        }
        Payload::Function(c) => c.hash(state),
        Payload::Iterator(_) => 0xFFu8.hash(state),
    }
}

/// Numeric ordering used by comparison opcodes (spec §6.3); only defined
/// between two numeric payloads of any width, widening per
/// `scriptvm-core-types::numeric`.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let a = as_f64(&self.data)?;
        let b = as_f64(&other.data)?;
        a.partial_cmp(&b)
    }
}

fn as_f64(data: &Payload) -> Option<f64> {
    match data {
        Payload::Int8(v) => Some(*v as f64),
        Payload::Int16(v) => Some(*v as f64),
        Payload::Int32(v) => Some(*v as f64),
        Payload::Int64(v) => Some(*v as f64),
        Payload::UInt8(v) => Some(*v as f64),
        Payload::UInt16(v) => Some(*v as f64),
        Payload::UInt32(v) => Some(*v as f64),
        Payload::UInt64(v) => Some(*v as f64),
        Payload::Float32(v) => Some(*v as f64),
        Payload::Float64(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn some_and_none_are_distinguishable() {
        let some = Value::some(Value::int32(3));
        let none = Value::none(TypeDescriptor::numeric(Tag::Int32));
        assert!(some.is_some());
        assert!(!some.is_none());
        assert!(none.is_none());
        assert!(!none.is_some());
    }

    #[test]
    fn nan_floats_compare_equal_for_keying_purposes() {
        let a = Value::float64(f64::NAN);
        let b = Value::float64(f64::NAN);
        assert_eq!(a, b);
    }

    #[test]
    fn dict_equality_is_order_independent() {
        let mut m1 = IndexMap::new();
        m1.insert(Value::string("a"), Value::int32(1));
        m1.insert(Value::string("b"), Value::int32(2));
        let mut m2 = IndexMap::new();
        m2.insert(Value::string("b"), Value::int32(2));
        m2.insert(Value::string("a"), Value::int32(1));
        let ty_key = TypeDescriptor::string();
        let ty_val = TypeDescriptor::numeric(Tag::Int32);
        let d1 = Value::dict(ty_key.clone(), ty_val.clone(), m1);
        let d2 = Value::dict(ty_key, ty_val, m2);
        assert_eq!(d1, d2);
    }

    #[test]
    fn numeric_comparison_widens_across_payload_kinds() {
        let a = Value::int32(3);
        let b = Value::float64(3.5);
        assert!(a < b);
    }

    #[test]
    fn display_renders_option_transparently() {
        let v = Value::some(Value::string("hi"));
        assert_eq!(v.to_display_string(), "hi");
    }
}
