//! `TypeDescriptor`: names all runtime types (spec §3).

use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Shared, structurally-comparable handle to a `TypeDescriptor`. `Arc`'s
/// `PartialEq`/`Hash` impls delegate to the pointee, so two `TypeRef`s
/// built independently from the same shape compare equal — exactly the
/// "structural equality" spec §4.2 requires for union de-duplication.
pub type TypeRef = Arc<TypeDescriptor>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub tag: Tag,
    pub extra: TypeExtra,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub associated: Option<TypeRef>,
}

/// Whether an `ErrorUnion` accepts any error, or only a finite named set
/// (spec §3, TypeDescriptor/ErrorUnion).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSpec {
    Generic,
    Named(BTreeSet<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExtra {
    None,
    List {
        element: TypeRef,
    },
    Dict {
        key: TypeRef,
        value: TypeRef,
    },
    /// Ordered set of variant names; each may carry an associated
    /// descriptor (spec §3).
    Enum {
        variants: Vec<EnumVariant>,
    },
    Function {
        params: Vec<TypeRef>,
        ret: TypeRef,
    },
    /// Ordered list of variant descriptors, indexed by position — the
    /// index is the variant's stable identity (spec §3, invariant).
    Sum {
        variants: Vec<TypeRef>,
    },
    /// Canonicalized member set: no member is itself a Union, no two
    /// members are structurally equal (spec §3, Union invariant).
    Union {
        members: Vec<TypeRef>,
    },
    ErrorUnion {
        success: TypeRef,
        errors: ErrorSpec,
    },
    /// `Option(T)` sugar over `Union{Some(T), None}` (spec §4.4).
    Option {
        some: TypeRef,
    },
    /// `Result(T,E)` sugar over `Union{Success(T), Error(E)}` (spec §4.4).
    Result {
        ok: TypeRef,
        err: TypeRef,
    },
    UserDefined {
        class_name: String,
    },
}

impl TypeDescriptor {
    pub fn new(tag: Tag, extra: TypeExtra) -> TypeRef {
        Arc::new(TypeDescriptor { tag, extra })
    }

    pub fn nil() -> TypeRef {
        Self::new(Tag::Nil, TypeExtra::None)
    }

    pub fn boolean() -> TypeRef {
        Self::new(Tag::Bool, TypeExtra::None)
    }

    pub fn numeric(tag: Tag) -> TypeRef {
        debug_assert!(tag.is_numeric());
        Self::new(tag, TypeExtra::None)
    }

    pub fn string() -> TypeRef {
        Self::new(Tag::String, TypeExtra::None)
    }

    pub fn any() -> TypeRef {
        Self::new(Tag::Any, TypeExtra::None)
    }

    pub fn object() -> TypeRef {
        Self::new(Tag::Object, TypeExtra::None)
    }

    pub fn range() -> TypeRef {
        Self::new(Tag::Range, TypeExtra::None)
    }

    pub fn list(element: TypeRef) -> TypeRef {
        Self::new(Tag::List, TypeExtra::List { element })
    }

    pub fn dict(key: TypeRef, value: TypeRef) -> TypeRef {
        Self::new(Tag::Dict, TypeExtra::Dict { key, value })
    }

    pub fn function(params: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
        Self::new(Tag::Function, TypeExtra::Function { params, ret })
    }

    pub fn sum(variants: Vec<TypeRef>) -> TypeRef {
        Self::new(Tag::Sum, TypeExtra::Sum { variants })
    }

    pub fn enum_type(variants: Vec<EnumVariant>) -> TypeRef {
        Self::new(Tag::Enum, TypeExtra::Enum { variants })
    }

    pub fn user_defined(class_name: impl Into<String>) -> TypeRef {
        Self::new(
            Tag::UserDefined,
            TypeExtra::UserDefined {
                class_name: class_name.into(),
            },
        )
    }

    /// This descriptor's members, if it is a `Union` — used by
    /// `is_compatible`'s "to is a Union and some member is compatible"
    /// branch (spec §4.2).
    pub fn union_members(&self) -> Option<&[TypeRef]> {
        match &self.extra {
            TypeExtra::Union { members } => Some(members),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_descriptors_built_independently_are_equal() {
        let a = TypeDescriptor::list(TypeDescriptor::numeric(Tag::Int32));
        let b = TypeDescriptor::list(TypeDescriptor::numeric(Tag::Int32));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn sum_variant_order_is_significant() {
        let a = TypeDescriptor::sum(vec![TypeDescriptor::nil(), TypeDescriptor::boolean()]);
        let b = TypeDescriptor::sum(vec![TypeDescriptor::boolean(), TypeDescriptor::nil()]);
        assert_ne!(a, b);
    }
}
