//! Member visibility and the access rule spec §4.3 defines over it.

use crate::class_id::ClassId;
use crate::registry::ClassRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    /// Allowed iff the accessing class equals the declaring class or is a
    /// sub-/super-class of it.
    Protected,
    /// Allowed iff the accessing class equals the declaring class.
    Private,
    /// Public for read; forbidden to write from any site (spec §4.3).
    Const,
}

impl Visibility {
    /// Whether `accessing` may read a member declared in `declaring` with
    /// this visibility, per spec §4.3.
    pub fn allows_read(self, registry: &ClassRegistry, accessing: ClassId, declaring: ClassId) -> bool {
        match self {
            Visibility::Public | Visibility::Const => true,
            Visibility::Protected => accessing == declaring || registry.is_related(accessing, declaring),
            Visibility::Private => accessing == declaring,
        }
    }

    /// Whether `accessing` may write a member declared in `declaring` with
    /// this visibility. `Const` rejects every writer, including the
    /// declaring class itself.
    pub fn allows_write(self, registry: &ClassRegistry, accessing: ClassId, declaring: ClassId) -> bool {
        match self {
            Visibility::Const => false,
            other => other.allows_read(registry, accessing, declaring),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ClassDefinition;

    fn registry_with_chain() -> (ClassRegistry, ClassId, ClassId, ClassId) {
        let mut registry = ClassRegistry::new();
        let base = registry.register(ClassDefinition::new("Base"));
        let mid = registry.register(ClassDefinition::new("Mid").with_superclass(base));
        let leaf = registry.register(ClassDefinition::new("Leaf").with_superclass(mid));
        (registry, base, mid, leaf)
    }

    #[test]
    fn private_is_only_readable_by_the_declaring_class() {
        let (registry, base, _mid, leaf) = registry_with_chain();
        assert!(Visibility::Private.allows_read(&registry, base, base));
        assert!(!Visibility::Private.allows_read(&registry, leaf, base));
    }

    #[test]
    fn protected_is_readable_anywhere_in_the_hierarchy() {
        let (registry, base, mid, leaf) = registry_with_chain();
        assert!(Visibility::Protected.allows_read(&registry, leaf, base));
        assert!(Visibility::Protected.allows_read(&registry, base, leaf));
        assert!(Visibility::Protected.allows_read(&registry, mid, base));
    }

    #[test]
    fn const_forbids_writes_even_from_the_declaring_class() {
        let (registry, base, _mid, _leaf) = registry_with_chain();
        assert!(Visibility::Const.allows_read(&registry, base, base));
        assert!(!Visibility::Const.allows_write(&registry, base, base));
    }
}
