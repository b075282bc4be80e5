//! `Tag`: the closed set of runtime type kinds (spec §3, TypeDescriptor).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Nil,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    List,
    Dict,
    Range,
    Enum,
    Function,
    Sum,
    Union,
    ErrorUnion,
    Option,
    Result,
    UserDefined,
    Object,
    Any,
}

impl Tag {
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Tag::Int8
                | Tag::Int16
                | Tag::Int32
                | Tag::Int64
                | Tag::UInt8
                | Tag::UInt16
                | Tag::UInt32
                | Tag::UInt64
                | Tag::Float32
                | Tag::Float64
        )
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, Tag::UInt8 | Tag::UInt16 | Tag::UInt32 | Tag::UInt64)
    }

    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Tag::Float32 | Tag::Float64)
    }

    /// Bit width of a numeric tag, `None` for non-numeric tags.
    pub const fn width(self) -> Option<u32> {
        match self {
            Tag::Int8 | Tag::UInt8 => Some(8),
            Tag::Int16 | Tag::UInt16 => Some(16),
            Tag::Int32 | Tag::UInt32 | Tag::Float32 => Some(32),
            Tag::Int64 | Tag::UInt64 | Tag::Float64 => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
