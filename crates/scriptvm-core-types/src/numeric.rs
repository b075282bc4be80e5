//! The numeric lattice (spec §4.2): `i8 < u8 < i16 < u16 < i32 < u32 < i64 <
//! u64 < f32 < f64`.

use crate::tag::Tag;

/// Total order over the numeric tags, narrowest to widest.
const LATTICE: [Tag; 10] = [
    Tag::Int8,
    Tag::UInt8,
    Tag::Int16,
    Tag::UInt16,
    Tag::Int32,
    Tag::UInt32,
    Tag::Int64,
    Tag::UInt64,
    Tag::Float32,
    Tag::Float64,
];

fn rank(tag: Tag) -> Option<usize> {
    LATTICE.iter().position(|&t| t == tag)
}

/// True iff a cast `from -> to` is statically safe: `to` appears at or
/// after `from` in the lattice, and (per spec §4.2) unsigned-to-signed
/// widening requires the target width to be strictly greater than the
/// source width.
pub fn is_safe_widen(from: Tag, to: Tag) -> bool {
    let (Some(rank_from), Some(rank_to)) = (rank(from), rank(to)) else {
        return false;
    };
    if rank_to < rank_from {
        return false;
    }
    if from.is_unsigned() && to.is_signed_integer() {
        let (Some(w_from), Some(w_to)) = (from.width(), to.width()) else {
            return false;
        };
        if w_to <= w_from {
            return false;
        }
    }
    true
}

/// The wider of two numeric tags per the lattice order. Panics if either
/// tag is non-numeric — callers are expected to check `Tag::is_numeric`
/// first, mirroring `TypeSystem::common_type`'s numeric branch (spec
/// §4.2).
pub fn wider(a: Tag, b: Tag) -> Tag {
    let (Some(rank_a), Some(rank_b)) = (rank(a), rank(b)) else {
        panic!("wider() called with a non-numeric tag");
    };
    if rank_a >= rank_b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_widens_to_itself() {
        assert!(is_safe_widen(Tag::Int32, Tag::Int32));
    }

    #[test]
    fn widening_forward_in_the_lattice_is_safe() {
        assert!(is_safe_widen(Tag::Int8, Tag::UInt8));
        assert!(is_safe_widen(Tag::Int32, Tag::Float64));
    }

    #[test]
    fn narrowing_is_unsafe() {
        assert!(!is_safe_widen(Tag::Int64, Tag::Int32));
        assert!(!is_safe_widen(Tag::Float64, Tag::Int64));
    }

    #[test]
    fn unsigned_to_signed_requires_strictly_greater_width() {
        assert!(is_safe_widen(Tag::UInt32, Tag::Int64));
        assert!(!is_safe_widen(Tag::UInt64, Tag::Int64));
    }

    #[test]
    fn wider_picks_the_higher_ranked_tag() {
        assert_eq!(wider(Tag::Int32, Tag::Float32), Tag::Float32);
        assert_eq!(wider(Tag::UInt64, Tag::Int8), Tag::UInt64);
    }
}
