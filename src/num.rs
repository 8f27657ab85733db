use num_rational::Rational64;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::{Add, Mul, Neg, Sub};

/// A numeric type usable as an edge weight or a vertex potential.
/// This trait is just a collection of abilities (other traits) and is automatically derived.
///
/// Weights are added along paths without overflow checks; it is the
/// responsibility of the caller to pick a type wide enough for the sums that
/// can appear in its constraint graphs.
pub trait Weight:
    Add<Self, Output = Self>
    + Sub<Self, Output = Self>
    + Mul<Self, Output = Self>
    + Neg<Output = Self>
    + num_traits::Zero
    + Ord
    + Copy
    + Step
    + Hash
    + Debug
{
}

impl<T> Weight for T where
    T: Add<Self, Output = Self>
        + Sub<Self, Output = Self>
        + Mul<Self, Output = Self>
        + Neg<Output = Self>
        + num_traits::Zero
        + Ord
        + Copy
        + Step
        + Hash
        + Debug
{
}

/// The smallest representable gap between two distinct weight values.
///
/// Negating `x - y <= c` yields the strict inequality `y - x < -c`, which is
/// encoded as `y - x <= -c - step`. Over the integers the step is one; over
/// rationals it is one as well, under the assumption that rational problems
/// have been rescaled to integral weights (see `DlConfig::rescale`).
pub trait Step {
    fn step() -> Self;
}

impl Step for i32 {
    fn step() -> Self {
        1
    }
}

impl Step for i64 {
    fn step() -> Self {
        1
    }
}

impl Step for Rational64 {
    fn step() -> Self {
        Rational64::from_integer(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    fn negate<W: Weight>(w: W) -> W {
        -w - W::step()
    }

    #[test]
    fn test_negation_involution() {
        for w in [-7i64, -1, 0, 1, 42] {
            assert_eq!(negate(negate(w)), w);
        }
        let q = Rational64::new(3, 1);
        assert_eq!(negate(negate(q)), q);
    }

    #[test]
    fn test_rational_ordering() {
        let a = Rational64::new(1, 3);
        let b = Rational64::new(1, 2);
        assert!(a < b);
        assert!((a - b) < Rational64::zero());
    }
}
