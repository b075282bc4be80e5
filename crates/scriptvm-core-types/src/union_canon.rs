//! Union canonicalization (spec §4.2, `create_union`).

use crate::descriptor::{TypeDescriptor, TypeExtra, TypeRef};
use crate::tag::Tag;

/// Flattens nested Unions, de-duplicates by structural equality, and
/// collapses a single remaining member to itself rather than a one-member
/// Union (spec §4.2, steps 1-4).
pub fn canonicalize_union(variants: Vec<TypeRef>) -> TypeRef {
    let mut flat: Vec<TypeRef> = Vec::with_capacity(variants.len());
    let mut stack = variants;
    stack.reverse();
    while let Some(member) = stack.pop() {
        match member.tag {
            Tag::Union => {
                if let Some(nested) = member.union_members() {
                    for m in nested.iter().rev() {
                        stack.push(m.clone());
                    }
                }
            }
            _ => flat.push(member),
        }
    }

    let mut deduped: Vec<TypeRef> = Vec::with_capacity(flat.len());
    for member in flat {
        if !deduped.iter().any(|existing| existing == &member) {
            deduped.push(member);
        }
    }

    if deduped.len() == 1 {
        return deduped.into_iter().next().unwrap();
    }

    TypeDescriptor::new(Tag::Union, TypeExtra::Union { members: deduped })
}
