//! `ClassDefinition`: the static shape of a class (spec §4.3).

use crate::class_id::ClassId;
use crate::visibility::Visibility;
use scriptvm_core_types::TypeRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    /// Bytecode offset of the field's default-value expression, evaluated
    /// lazily by the VM at instance construction (spec §4.3).
    pub default_expr_offset: Option<u32>,
    pub visibility: Visibility,
    pub is_static: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef, visibility: Visibility) -> Self {
        Field {
            name: name.into(),
            ty,
            default_expr_offset: None,
            visibility,
            is_static: false,
        }
    }

    pub fn with_default_expr(mut self, offset: u32) -> Self {
        self.default_expr_offset = Some(offset);
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }
}

/// A method's implementation handle: an opaque index into the
/// `FunctionRegistry` maintained by `scriptvm-functions`. Kept opaque here
/// (rather than depending on that crate) to avoid a cycle — the function
/// registry never needs to reach back into `ClassDefinition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionHandle(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub impl_handle: FunctionHandle,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
}

impl Method {
    pub fn new(name: impl Into<String>, impl_handle: FunctionHandle, visibility: Visibility) -> Self {
        Method {
            name: name.into(),
            impl_handle,
            visibility,
            is_static: false,
            is_abstract: false,
            is_final: false,
        }
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_final(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<String>,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ClassDefinition {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
        }
    }

    pub fn with_superclass(mut self, superclass: ClassId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn own_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn own_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
