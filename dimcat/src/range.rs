use std::fmt::Debug;

use ndarray::Array1;
use num_traits::{cast, PrimInt};

/// An arithmetic progression of integers: `start + i * step` for `i` in `0..steps`.
///
/// Used for dimension coordinates that are a plain integer sequence, so they can be
/// concatenated without materializing their labels.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntRange<N>
where
    N: PrimInt + Debug + Send + Sync + 'static,
{
    pub start: N,
    pub step: N,
    pub steps: usize,
}

impl<N> IntRange<N>
where
    N: PrimInt + Debug + Send + Sync + 'static,
{
    pub fn new(start: N, step: N, steps: usize) -> Self {
        Self { start, step, steps }
    }

    /// The value one step past the end, or `None` if it does not fit in `N`.
    ///
    pub fn stop(&self) -> Option<N> {
        cast::<usize, N>(self.steps)?
            .checked_mul(&self.step)?
            .checked_add(&self.start)
    }

    pub fn len(&self) -> usize {
        self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }

    /// Join `other` onto the end of this range, if the result is still a single progression.
    ///
    pub fn concat(&self, other: &Self) -> Option<Self> {
        if self.is_empty() {
            return Some(other.clone());
        }
        if other.is_empty() {
            return Some(self.clone());
        }
        if self.step != other.step || self.stop()? != other.start {
            return None;
        }

        Some(Self::new(self.start, self.step, self.steps + other.steps))
    }

    pub fn to_array(&self) -> Array1<N> {
        Array1::from_iter(self.clone())
    }
}

/// Iterating consumes the range, clone it first to keep it.
///
impl<N> Iterator for IntRange<N>
where
    N: PrimInt + Debug + Send + Sync + 'static,
{
    type Item = N;

    fn next(&mut self) -> Option<Self::Item> {
        if self.steps == 0 {
            return None;
        }

        let next = self.start;
        self.steps -= 1;
        if self.steps > 0 {
            match self.start.checked_add(&self.step) {
                Some(start) => self.start = start,
                None => self.steps = 0,
            }
        }

        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.steps, Some(self.steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;
    use paste::paste;

    macro_rules! int_range_tests {
        ($name:ident) => {
            paste! {
                #[test]
                fn [<$name _test_to_array>]() {
                    let (data, range) = $name();
                    assert_eq!(range.to_array(), data);
                    assert_eq!(range.clone().count(), range.len());
                }

                #[test]
                fn [<$name _test_concat>]() {
                    let (data, range) = $name();
                    let left = IntRange::new(range.start, range.step, 10);
                    let right = IntRange::new(left.stop().unwrap(), range.step, range.len() - 10);

                    let joined = left.concat(&right).unwrap();
                    assert_eq!(joined, range);
                    assert_eq!(joined.to_array(), data);

                    assert_eq!(right.concat(&left), None);
                    let gap = IntRange::new(right.start + range.step, range.step, 1);
                    assert_eq!(left.concat(&gap), None);
                    let empty = IntRange::new(range.start, range.step, 0);
                    assert_eq!(left.concat(&empty), Some(left.clone()));
                }
            }
        };
    }

    fn range_i32() -> (Array1<i32>, IntRange<i32>) {
        let data = Array1::from_iter((-20..130).step_by(5));
        let range = IntRange::new(-20, 5, 30);

        assert_eq!(range.len(), 30);
        assert_eq!(range.stop(), Some(130));

        (data, range)
    }

    int_range_tests!(range_i32);

    fn range_i64() -> (Array1<i64>, IntRange<i64>) {
        let data = Array1::from_iter((-20..130).step_by(5));
        let range = IntRange::new(-20, 5, 30);

        assert_eq!(range.len(), 30);
        assert_eq!(range.stop(), Some(130));

        (data, range)
    }

    int_range_tests!(range_i64);

    #[test]
    fn test_mismatched_steps() {
        let a = IntRange::new(0i64, 1, 3);
        let b = IntRange::new(3i64, 2, 3);
        assert_eq!(a.concat(&b), None);
        assert_eq!(a.to_array(), array![0, 1, 2]);
    }

    #[test]
    fn test_near_integer_limits() {
        let last = IntRange::new(i64::MAX, 1, 1);
        assert_eq!(last.stop(), None);
        assert_eq!(last.to_array(), array![i64::MAX]);

        let top = IntRange::new(i64::MAX - 2, 1, 3);
        assert_eq!(top.to_array(), array![i64::MAX - 2, i64::MAX - 1, i64::MAX]);

        let down = IntRange::new(i64::MIN + 4, -2, 3);
        assert_eq!(down.to_array(), array![i64::MIN + 4, i64::MIN + 2, i64::MIN]);
        assert_eq!(down.stop(), None);

        let left = IntRange::new(i64::MAX - 1, 1, 1);
        let joined = left.concat(&last).unwrap();
        assert_eq!(joined.to_array(), array![i64::MAX - 1, i64::MAX]);
        assert_eq!(last.concat(&left), None);
    }
}
