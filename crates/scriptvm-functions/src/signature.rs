//! Function signatures (spec §4.5): parameter names/types, optional
//! default-expression offsets, and a return type.

use scriptvm_core_types::TypeRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    /// Bytecode offset of this parameter's default-value expression, when
    /// the parameter is optional (spec §4.5); evaluated in the callee's
    /// environment at call time, not at registration.
    pub default_expr_offset: Option<u32>,
}

impl Parameter {
    pub fn required(name: impl Into<String>, ty: TypeRef) -> Self {
        Parameter {
            name: name.into(),
            ty,
            default_expr_offset: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TypeRef, default_expr_offset: u32) -> Self {
        Parameter {
            name: name.into(),
            ty,
            default_expr_offset: Some(default_expr_offset),
        }
    }

    pub fn is_optional(&self) -> bool {
        self.default_expr_offset.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub params: Vec<Parameter>,
    pub return_ty: TypeRef,
}

impl FunctionSignature {
    pub fn new(params: Vec<Parameter>, return_ty: TypeRef) -> Self {
        FunctionSignature { params, return_ty }
    }

    /// Number of arguments that must be supplied by the caller before
    /// defaults are applied (spec §4.5 call protocol, step 2).
    pub fn required_arity(&self) -> usize {
        self.params.iter().filter(|p| !p.is_optional()).count()
    }
}
