//! Exact floating-point summation.
//!
//! Replicator payoffs are sums over every strategy profile, which can be
//! thousands of terms of wildly different magnitude. Naive left-to-right
//! accumulation drifts with the enumeration order and shows up as spurious
//! differences between consecutive generations once a run is close to its
//! fixed point.
//!
//! [`ExactSum`] keeps a list of non-overlapping partial sums (Shewchuk's
//! algorithm) so the final [`ExactSum::total`] is the correctly rounded
//! value of the exact sum. The result does not depend on insertion order.

/// Accumulator producing the correctly rounded sum of its inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExactSum {
    /// Non-overlapping partials in increasing magnitude.
    partials: Vec<f64>,
    /// Running sum of non-finite inputs (infinities and NaN).
    special: f64,
    /// Whether any non-finite input has been seen.
    non_finite: bool,
    /// Whether a partial overflowed although every input was finite.
    overflowed: bool,
}

impl ExactSum {
    /// Create an empty accumulator.
    pub const fn new() -> Self {
        Self {
            partials: Vec::new(),
            special: 0.0,
            non_finite: false,
            overflowed: false,
        }
    }

    /// Add one term.
    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            self.special += value;
            self.non_finite = true;
            return;
        }

        let mut x = value;
        let mut kept: usize = 0;
        let len = self.partials.len();
        for idx in 0..len {
            let Some(mut y) = self.partials.get(idx).copied() else {
                break;
            };
            if x.abs() < y.abs() {
                core::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            if !hi.is_finite() {
                self.overflowed = true;
                return;
            }
            let lo = y - (hi - x);
            if lo != 0.0 {
                if let Some(slot) = self.partials.get_mut(kept) {
                    *slot = lo;
                }
                kept = kept.saturating_add(1);
            }
            x = hi;
        }
        self.partials.truncate(kept);
        self.partials.push(x);
    }

    /// Return the correctly rounded total of everything added so far.
    ///
    /// An empty accumulator sums to `0.0`. If any non-finite value was
    /// added, the total is the IEEE sum of the non-finite values
    /// (`inf`, `-inf` or `NaN`). If an intermediate partial overflowed
    /// `f64::MAX` the exact total cannot be recovered and the result is
    /// `NaN`; use [`Self::checked_total`] to tell that case apart.
    pub fn total(&self) -> f64 {
        if self.overflowed {
            return f64::NAN;
        }
        if self.non_finite {
            return self.special;
        }

        let mut iter = self.partials.iter().rev().copied();
        let Some(mut hi) = iter.next() else {
            return 0.0;
        };
        let mut lo = 0.0;
        for y in iter.by_ref() {
            let x = hi;
            hi = x + y;
            let yr = hi - x;
            lo = y - yr;
            if lo != 0.0 {
                break;
            }
        }

        // Round half-even across the remaining partials.
        if let Some(next) = iter.next()
            && ((lo < 0.0 && next < 0.0) || (lo > 0.0 && next > 0.0))
        {
            let y = lo * 2.0;
            let x = hi + y;
            let yr = x - hi;
            if y - yr == 0.0 {
                hi = x;
            }
        }
        hi
    }

    /// The total, or `None` if an intermediate partial overflowed.
    pub fn checked_total(&self) -> Option<f64> {
        if self.overflowed {
            None
        } else {
            Some(self.total())
        }
    }

    /// Whether an intermediate partial overflowed on finite inputs.
    pub const fn overflowed(&self) -> bool {
        self.overflowed
    }
}

impl Extend<f64> for ExactSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for ExactSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = Self::new();
        sum.extend(iter);
        sum
    }
}

/// Correctly rounded sum of an iterator of floats.
pub fn fsum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().collect::<ExactSum>().total()
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(fsum(core::iter::empty()), 0.0);
    }

    #[test]
    fn cancellation_keeps_small_terms() {
        assert_eq!(fsum([1e100, 1.0, -1e100]), 1.0);
        assert_eq!(fsum([1e16, 1.0, 1e-16, -1e16]), 1.0);
    }

    #[test]
    fn tenths_sum_exactly_to_one() {
        // Naive accumulation yields 0.9999999999999999.
        let naive: f64 = [0.1; 10].iter().sum();
        assert!(naive < 1.0);
        assert_eq!(fsum([0.1; 10]), 1.0);
    }

    #[test]
    fn order_does_not_matter() {
        let forward = [0.3, 1e-17, 2.5e10, -2.5e10, 0.7, 3e-18];
        let mut backward = forward;
        backward.reverse();
        assert_eq!(fsum(forward), fsum(backward));
    }

    #[test]
    fn non_finite_propagates() {
        assert!(fsum([1.0, f64::INFINITY]).is_infinite());
        assert!(fsum([f64::INFINITY, f64::NEG_INFINITY]).is_nan());
        assert!(fsum([1.0, f64::NAN]).is_nan());
    }

    #[test]
    fn intermediate_overflow_is_flagged() {
        let acc: ExactSum = [f64::MAX, f64::MAX, -f64::MAX].into_iter().collect();
        assert!(acc.overflowed());
        assert!(acc.total().is_nan());
        assert_eq!(acc.checked_total(), None);
        assert!(fsum([f64::MAX, f64::MAX, -f64::MAX]).is_nan());

        let fine: ExactSum = [f64::MAX, -f64::MAX, f64::MAX].into_iter().collect();
        assert!(!fine.overflowed());
        assert_eq!(fine.checked_total(), Some(f64::MAX));
    }

    #[test]
    fn incremental_and_collected_agree() {
        let mut acc = ExactSum::new();
        for value in [0.25, 0.5, 0.125] {
            acc.add(value);
        }
        assert_eq!(acc.total(), 0.875);
        assert_eq!(acc, [0.25, 0.5, 0.125].into_iter().collect::<ExactSum>());
    }
}
