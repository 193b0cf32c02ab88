//! Positions inside a block sequence
//!
//! Provides [`Position`] and the total order every range check relies on.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// Location inside a document: block index plus char offset within that block
///
/// Ordered lexicographically by `block`, then `offset`. The derived `Ord`
/// follows field declaration order, so the field order here is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Index into the content block sequence
    pub block: usize,
    /// Char offset within the block text
    pub offset: usize,
}

impl Position {
    /// Create new position
    #[inline]
    #[must_use]
    pub const fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }

    /// Start of the document
    #[inline]
    #[must_use]
    pub const fn origin() -> Self {
        Self::new(0, 0)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.block, self.offset)
    }
}

/// Compare two positions
///
/// Same as `Ord::cmp`; kept as a free function for call sites that read
/// better with an explicit comparator (sorting, range checks).
#[inline]
#[must_use]
pub fn compare(a: &Position, b: &Position) -> Ordering {
    a.block.cmp(&b.block).then(a.offset.cmp(&b.offset))
}

/// Half-open interval intersection: `[s1,e1)` and `[s2,e2)` intersect iff `s1 < e2 && e1 > s2`
#[inline]
#[must_use]
pub fn ranges_intersect(s1: Position, e1: Position, s2: Position, e2: Position) -> bool {
    s1 < e2 && e1 > s2
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn position() -> impl Strategy<Value = Position> {
        (0usize..6, 0usize..12).prop_map(|(b, o)| Position::new(b, o))
    }

    #[test]
    fn block_dominates_offset() {
        assert_eq!(
            compare(&Position::new(0, 99), &Position::new(1, 0)),
            Ordering::Less
        );
        assert_eq!(
            compare(&Position::new(2, 3), &Position::new(2, 3)),
            Ordering::Equal
        );
        assert_eq!(
            compare(&Position::new(2, 4), &Position::new(2, 3)),
            Ordering::Greater
        );
    }

    #[test]
    fn half_open_touching_ranges_do_not_intersect() {
        let a = (Position::new(0, 0), Position::new(0, 10));
        let b = (Position::new(0, 10), Position::new(0, 20));
        assert!(!ranges_intersect(a.0, a.1, b.0, b.1));
        assert!(ranges_intersect(a.0, Position::new(0, 11), b.0, b.1));
    }

    #[test]
    fn display_format() {
        assert_eq!(Position::new(3, 7).to_string(), "{3,7}");
    }

    proptest! {
        #[test]
        fn prop_antisymmetric(a in position(), b in position()) {
            prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }

        #[test]
        fn prop_transitive(a in position(), b in position(), c in position()) {
            if compare(&a, &b) != Ordering::Greater && compare(&b, &c) != Ordering::Greater {
                prop_assert_ne!(compare(&a, &c), Ordering::Greater);
            }
        }

        #[test]
        fn prop_total_and_consistent_with_eq(a in position(), b in position()) {
            let ord = compare(&a, &b);
            prop_assert_eq!(ord == Ordering::Equal, a == b);
            prop_assert_eq!(ord, a.cmp(&b));
        }
    }
}
