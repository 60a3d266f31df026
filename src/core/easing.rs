//! Easing curves mapping normalized progress to eased output.
//!
//! Inputs are normally in `[0, 1]`. `smooth_ramp`, `ease_in` and `ease_out`
//! pass values outside the open interval through unchanged, so a timeline
//! that is exactly at either end always yields exactly 0 or 1.

use std::f32::consts::PI;

/// Ramp to 1 with a small overshoot past 1 before settling.
///
/// Only the fractional part of `x` is eased; the integer part is carried
/// through, so `overshoot(1.0) == 1.0`.
pub fn overshoot(x: f32) -> f32 {
    let offset = x.trunc();
    let amt = x - offset;
    let ramp = 1.0 - (amt * PI).cos(); // 0..=2
    let converge = (0.5 * PI * (1.0 - amt)).sin(); // 0..=1
    offset + (ramp * 0.675) * converge + (1.0 - converge)
}

/// Cosine S-curve.
pub fn smooth_ramp(amt: f32) -> f32 {
    if amt > 0.0 && amt < 1.0 {
        (1.0 - (amt * PI).cos()) * 0.5
    } else {
        amt
    }
}

/// Accelerating quarter-cosine.
pub fn ease_in(amt: f32) -> f32 {
    if amt > 0.0 && amt < 1.0 {
        1.0 - (amt * PI * 0.5).cos()
    } else {
        amt
    }
}

/// Decelerating quarter-cosine.
pub fn ease_out(amt: f32) -> f32 {
    if amt > 0.0 && amt < 1.0 {
        ((1.0 - amt) * PI * 0.5).cos()
    } else {
        amt
    }
}

/// Cubic acceleration used by the screen rotation.
pub fn cubic(amt: f32) -> f32 {
    amt * amt * amt
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_curves_hit_their_endpoints() {
        for curve in [smooth_ramp, ease_in, ease_out, cubic] {
            assert_eq!(curve(0.0), 0.0);
            assert_eq!(curve(1.0), 1.0);
        }
    }

    #[test]
    fn test_identity_outside_unit_interval() {
        for curve in [smooth_ramp, ease_in, ease_out] {
            assert_eq!(curve(-0.5), -0.5);
            assert_eq!(curve(1.5), 1.5);
        }
    }

    #[test]
    fn test_smooth_ramp_midpoint() {
        assert!((smooth_ramp(0.5) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_overshoot_settles_at_one() {
        assert!(overshoot(0.0).abs() < EPSILON);
        assert!((overshoot(1.0) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_overshoot_exceeds_one_inside() {
        let peak = (1..100)
            .map(|i| overshoot(i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(peak > 1.0, "peak was {peak}");
    }

    #[test]
    fn test_overshoot_carries_integer_part() {
        assert!((overshoot(2.25) - (2.0 + overshoot(0.25))).abs() < EPSILON);
    }

    proptest! {
        /// Monotonic non-decreasing on the unit interval
        #[test]
        fn test_curves_are_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for curve in [smooth_ramp, ease_in, ease_out] {
                prop_assert!(curve(lo) <= curve(hi) + EPSILON,
                    "curve({lo}) = {} > curve({hi}) = {}", curve(lo), curve(hi));
            }
        }

        /// Output stays in the unit interval for unit input
        #[test]
        fn test_curves_stay_bounded(x in 0.0f32..=1.0) {
            for curve in [smooth_ramp, ease_in, ease_out] {
                let y = curve(x);
                prop_assert!((-EPSILON..=1.0 + EPSILON).contains(&y));
            }
        }

        /// Small input steps never produce jumps
        #[test]
        fn test_curves_are_continuous(x in 0.0f32..0.999) {
            for curve in [smooth_ramp, ease_in, ease_out, overshoot] {
                prop_assert!((curve(x + 0.001) - curve(x)).abs() < 0.01);
            }
        }
    }
}
