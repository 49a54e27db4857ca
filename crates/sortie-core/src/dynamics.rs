//! Piecewise-linear real dynamics and their analytic threshold solvers.
//!
//! Conditions and constraints over real resources are answered by solving
//! the linear equation for the crossing instant instead of sampling every
//! microsecond. Entry instants round upward and exit instants round
//! downward, so a returned window never contains an instant at which the
//! value is (mathematically) outside the bounds.

use serde::{Deserialize, Serialize};

use crate::time::{Duration, Window};

/// `value(t) = initial + rate * t`, with `t` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealDynamics {
    /// Value at the start of the segment.
    pub initial: f64,
    /// Change per second.
    pub rate: f64,
}

impl RealDynamics {
    /// A value that does not change.
    pub fn constant(value: f64) -> Self {
        Self {
            initial: value,
            rate: 0.0,
        }
    }

    /// A value changing at a constant rate.
    pub fn linear(initial: f64, rate: f64) -> Self {
        Self { initial, rate }
    }

    /// The value after `elapsed`.
    pub fn value_at(&self, elapsed: Duration) -> f64 {
        self.initial + self.rate * elapsed.as_seconds()
    }

    /// The same trajectory, re-based to start `elapsed` later.
    pub fn shifted(&self, elapsed: Duration) -> Self {
        Self {
            initial: self.value_at(elapsed),
            rate: self.rate,
        }
    }

    /// The part of `[0, extent]` where `lower <= value <= upper`.
    ///
    /// A linear trajectory spends at most one contiguous interval inside a
    /// band, so the answer is a single window or nothing.
    pub fn when_between(&self, lower: f64, upper: f64, extent: Duration) -> Option<Window> {
        if extent.is_negative() || lower.is_nan() || upper.is_nan() || lower > upper {
            return None;
        }
        let span = extent.as_seconds();
        let (lo, hi) = if self.rate == 0.0 {
            if lower <= self.initial && self.initial <= upper {
                (0.0, span)
            } else {
                return None;
            }
        } else {
            let a = (lower - self.initial) / self.rate;
            let b = (upper - self.initial) / self.rate;
            (a.min(b), a.max(b))
        };
        let lo = lo.max(0.0);
        let hi = hi.min(span);
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return None;
        }
        let start = clamp_micros((lo * 1e6).ceil(), extent);
        let end = clamp_micros((hi * 1e6).floor(), extent);
        (start <= end).then(|| Window::new(start, end))
    }

    /// The parts of `[0, extent]` where the value is outside `[lower, upper]`.
    ///
    /// At most two windows: one before the band is entered and one after it
    /// is left.
    pub fn when_not_between(&self, lower: f64, upper: f64, extent: Duration) -> Vec<Window> {
        if extent.is_negative() {
            return Vec::new();
        }
        match self.when_between(lower, upper, extent) {
            None => vec![Window::new(Duration::ZERO, extent)],
            Some(inside) => {
                let mut outside = Vec::with_capacity(2);
                if inside.start > Duration::ZERO {
                    outside.push(Window::new(
                        Duration::ZERO,
                        inside.start.saturating_minus(Duration::EPSILON),
                    ));
                }
                if inside.end < extent {
                    outside.push(Window::new(
                        inside.end.saturating_plus(Duration::EPSILON),
                        extent,
                    ));
                }
                outside
            }
        }
    }
}

// Float-to-int `as` saturates, and the result is clamped to the segment.
fn clamp_micros(micros: f64, extent: Duration) -> Duration {
    if micros <= 0.0 {
        Duration::ZERO
    } else if micros >= extent.as_micros() as f64 {
        extent
    } else {
        Duration::from_micros(micros as i64).min(extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: i64) -> Duration {
        Duration::of(s, Duration::SECOND).unwrap()
    }

    #[test]
    fn value_and_shift() {
        let d = RealDynamics::linear(4.0, -0.5);
        assert_eq!(d.value_at(secs(2)), 3.0);
        assert_eq!(d.shifted(secs(2)), RealDynamics::linear(3.0, -0.5));
    }

    #[test]
    fn constant_inside_band_covers_extent() {
        let d = RealDynamics::constant(1.0);
        assert_eq!(d.when_between(0.0, 2.0, secs(10)), Some(Window::new(Duration::ZERO, secs(10))));
        assert_eq!(d.when_between(2.0, 3.0, secs(10)), None);
    }

    #[test]
    fn rising_line_enters_band() {
        // 0 + 1/s crosses 5.0 at 5s and 7.0 at 7s.
        let d = RealDynamics::linear(0.0, 1.0);
        assert_eq!(d.when_between(5.0, 7.0, secs(10)), Some(Window::new(secs(5), secs(7))));
        assert_eq!(d.when_between(5.0, f64::INFINITY, secs(10)), Some(Window::new(secs(5), secs(10))));
    }

    #[test]
    fn falling_line_leaves_band() {
        let d = RealDynamics::linear(10.0, -2.0);
        assert_eq!(
            d.when_between(0.0, f64::INFINITY, secs(100)),
            Some(Window::new(Duration::ZERO, secs(5)))
        );
        assert_eq!(
            d.when_not_between(0.0, f64::INFINITY, secs(100)),
            vec![Window::new(secs(5).plus(Duration::EPSILON).unwrap(), secs(100))]
        );
    }

    #[test]
    fn crossing_rounds_inward() {
        // Crosses 1.0 at 1/3 s: entry rounds up to 333_334us.
        let d = RealDynamics::linear(0.0, 3.0);
        let w = d.when_between(1.0, f64::INFINITY, secs(1)).unwrap();
        assert_eq!(w.start, Duration::from_micros(333_334));
        assert!(d.value_at(w.start) >= 1.0);
    }

    #[test]
    fn unbounded_horizon_does_not_overflow() {
        let d = RealDynamics::linear(0.0, 1.0);
        let w = d.when_between(5.0, f64::INFINITY, Duration::MAX).unwrap();
        assert_eq!(w.start, secs(5));
        assert_eq!(w.end, Duration::MAX);
    }

    #[test]
    fn band_never_reached() {
        let d = RealDynamics::linear(0.0, 1.0);
        assert_eq!(d.when_between(50.0, 60.0, secs(10)), None);
        assert_eq!(d.when_not_between(50.0, 60.0, secs(10)), vec![Window::new(Duration::ZERO, secs(10))]);
    }
}
