//! `ClassRegistry`: stores class definitions keyed by `ClassId`, resolves
//! methods/fields up the superclass chain, and enforces visibility (spec
//! §4.3).

use crate::class_id::ClassId;
use crate::definition::{ClassDefinition, Field, Method};
use indexmap::IndexMap;
use scriptvm_errors::{ErrorKind, PartialError, PartialResult};
use scriptvm_types::{Instance, Value};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDefinition>,
    name_to_id: HashMap<String, ClassId>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ClassDefinition) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.name_to_id.insert(definition.name.clone(), id);
        tracing::debug!(class = %definition.name, id = id.0, "registered class");
        self.classes.push(definition);
        id
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassDefinition> {
        self.classes.get(id.0 as usize)
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.name_to_id.get(name).copied()
    }

    /// True iff `a` and `b` are the same class, or one is an ancestor of
    /// the other (spec §4.3, "protected" rule).
    pub fn is_related(&self, a: ClassId, b: ClassId) -> bool {
        self.is_ancestor_of(a, b) || self.is_ancestor_of(b, a)
    }

    fn is_ancestor_of(&self, candidate: ClassId, descendant: ClassId) -> bool {
        let mut current = Some(descendant);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.get(id).and_then(|def| def.superclass);
        }
        false
    }

    /// Own table first, then recurses into the superclass; `None` if
    /// absent along the whole chain (spec §4.3).
    pub fn resolve_method(&self, class: ClassId, name: &str) -> Option<(ClassId, &Method)> {
        let definition = self.get(class)?;
        if let Some(method) = definition.own_method(name) {
            return Some((class, method));
        }
        let superclass = definition.superclass?;
        self.resolve_method(superclass, name)
    }

    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<(ClassId, &Field)> {
        let definition = self.get(class)?;
        if let Some(field) = definition.own_field(name) {
            return Some((class, field));
        }
        let superclass = definition.superclass?;
        self.resolve_field(superclass, name)
    }

    /// All field names a freshly-constructed instance of `class` must
    /// carry: inherited fields first, in declaration order, then the
    /// class's own (spec §4.3, "every declared and inherited field").
    pub fn instance_field_names(&self, class: ClassId) -> Vec<String> {
        let definition = match self.get(class) {
            Some(d) => d,
            None => return Vec::new(),
        };
        let mut names = match definition.superclass {
            Some(superclass) => self.instance_field_names(superclass),
            None => Vec::new(),
        };
        names.extend(definition.fields.iter().map(|f| f.name.clone()));
        names
    }

    /// Allocates a fresh instance of `class` with every declared and
    /// inherited field initialized to Nil (spec §4.3, "Instance
    /// creation"). Fields with a default-value expression are left Nil
    /// here too — evaluating them requires running bytecode, which is a
    /// VM concern; the VM's `NewInstance` handler fills them in afterward
    /// via `field_default_expr`.
    pub fn create_instance(&self, class: ClassId) -> Instance {
        let mut fields = IndexMap::new();
        for name in self.instance_field_names(class) {
            fields.insert(name, Value::nil());
        }
        Instance { class_id: class.0, fields }
    }

    /// The bytecode offset of `name`'s default-value expression, resolved
    /// up the superclass chain the same way `resolve_field` is, or `None`
    /// if the field has no default (spec §4.3).
    pub fn field_default_expr(&self, class: ClassId, name: &str) -> Option<u32> {
        self.resolve_field(class, name).and_then(|(_, field)| field.default_expr_offset)
    }

    /// Checks a read access against the member's declared visibility,
    /// raising `VisibilityViolation` on failure (spec §4.3).
    pub fn check_read(&self, accessing: ClassId, declaring: ClassId, visibility: crate::Visibility) -> PartialResult<()> {
        if visibility.allows_read(self, accessing, declaring) {
            Ok(())
        } else {
            Err(PartialError::new(
                ErrorKind::VisibilityViolation,
                format!("{accessing} cannot read a member declared {visibility:?} in {declaring}"),
            ))
        }
    }

    pub fn check_write(&self, accessing: ClassId, declaring: ClassId, visibility: crate::Visibility) -> PartialResult<()> {
        if visibility.allows_write(self, accessing, declaring) {
            Ok(())
        } else {
            Err(PartialError::new(
                ErrorKind::VisibilityViolation,
                format!("{accessing} cannot write a member declared {visibility:?} in {declaring}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FunctionHandle, Method};
    use crate::visibility::Visibility;

    #[test]
    fn resolve_method_recurses_into_superclass() {
        let mut registry = ClassRegistry::new();
        let base = registry.register(
            ClassDefinition::new("Base").with_method(Method::new("greet", FunctionHandle(0), Visibility::Public)),
        );
        let leaf = registry.register(ClassDefinition::new("Leaf").with_superclass(base));
        let (owner, method) = registry.resolve_method(leaf, "greet").unwrap();
        assert_eq!(owner, base);
        assert_eq!(method.name, "greet");
    }

    #[test]
    fn resolve_method_returns_none_when_absent_anywhere() {
        let mut registry = ClassRegistry::new();
        let base = registry.register(ClassDefinition::new("Base"));
        assert!(registry.resolve_method(base, "missing").is_none());
    }

    #[test]
    fn instance_field_names_lists_inherited_then_own_in_order() {
        use crate::definition::Field;
        use scriptvm_core_types::TypeDescriptor;

        let mut registry = ClassRegistry::new();
        let base = registry.register(
            ClassDefinition::new("Base").with_field(Field::new("x", TypeDescriptor::nil(), Visibility::Public)),
        );
        let leaf = registry.register(
            ClassDefinition::new("Leaf")
                .with_superclass(base)
                .with_field(Field::new("y", TypeDescriptor::nil(), Visibility::Public)),
        );
        assert_eq!(registry.instance_field_names(leaf), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn create_instance_carries_every_inherited_and_own_field_as_nil() {
        use crate::definition::Field;
        use scriptvm_core_types::TypeDescriptor;

        let mut registry = ClassRegistry::new();
        let base = registry.register(
            ClassDefinition::new("Base").with_field(Field::new("x", TypeDescriptor::nil(), Visibility::Public)),
        );
        let leaf = registry.register(
            ClassDefinition::new("Leaf")
                .with_superclass(base)
                .with_field(Field::new("y", TypeDescriptor::nil(), Visibility::Public)),
        );
        let instance = registry.create_instance(leaf);
        assert_eq!(instance.class_id, leaf.0);
        assert_eq!(instance.fields.get("x"), Some(&Value::nil()));
        assert_eq!(instance.fields.get("y"), Some(&Value::nil()));
    }

    #[test]
    fn field_default_expr_resolves_up_the_superclass_chain() {
        use crate::definition::Field;
        use scriptvm_core_types::TypeDescriptor;

        let mut registry = ClassRegistry::new();
        let base = registry.register(
            ClassDefinition::new("Base").with_field(Field::new("x", TypeDescriptor::nil(), Visibility::Public).with_default_expr(42)),
        );
        let leaf = registry.register(ClassDefinition::new("Leaf").with_superclass(base));
        assert_eq!(registry.field_default_expr(leaf, "x"), Some(42));
        assert_eq!(registry.field_default_expr(leaf, "missing"), None);
    }

    #[test]
    fn own_method_shadows_inherited_method_of_the_same_name() {
        let mut registry = ClassRegistry::new();
        let base = registry.register(
            ClassDefinition::new("Base").with_method(Method::new("speak", FunctionHandle(1), Visibility::Public)),
        );
        let leaf = registry.register(
            ClassDefinition::new("Leaf")
                .with_superclass(base)
                .with_method(Method::new("speak", FunctionHandle(2), Visibility::Public)),
        );
        let (owner, method) = registry.resolve_method(leaf, "speak").unwrap();
        assert_eq!(owner, leaf);
        assert_eq!(method.impl_handle, FunctionHandle(2));
    }
}
