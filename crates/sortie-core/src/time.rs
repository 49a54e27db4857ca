//! Fixed-resolution simulation time.
//!
//! [`Duration`] is a signed count of microseconds. All ordering in the
//! engine is done on this integer representation, so there is no
//! floating-point drift between runs. Arithmetic is checked: every
//! operation that could overflow returns [`TimeError`] rather than wrapping.
//! `Duration` deliberately does not implement `Add`/`Sub`.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimeError;

/// A signed span of simulated time with microsecond resolution.
///
/// Durations also serve as instants: an instant is the elapsed duration
/// since the start of the plan.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration(i64);

impl Duration {
    /// The empty duration.
    pub const ZERO: Self = Self(0);
    /// The smallest positive duration the clock can represent.
    pub const EPSILON: Self = Self(1);
    /// One microsecond.
    pub const MICROSECOND: Self = Self(1);
    /// One millisecond.
    pub const MILLISECOND: Self = Self(1_000);
    /// One second.
    pub const SECOND: Self = Self(1_000_000);
    /// One minute.
    pub const MINUTE: Self = Self(60_000_000);
    /// One hour.
    pub const HOUR: Self = Self(3_600_000_000);
    /// One day.
    pub const DAY: Self = Self(86_400_000_000);
    /// The most negative representable duration.
    pub const MIN: Self = Self(i64::MIN);
    /// The most positive representable duration.
    pub const MAX: Self = Self(i64::MAX);

    /// Construct from a raw microsecond count.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// The raw microsecond count.
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// `amount` multiples of `unit`, e.g. `Duration::of(14, Duration::SECOND)`.
    pub fn of(amount: i64, unit: Duration) -> Result<Self, TimeError> {
        unit.times(amount)
    }

    /// Checked addition.
    pub fn plus(self, other: Duration) -> Result<Self, TimeError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(TimeError::Overflow {
                op: "plus",
                lhs: self.0,
                rhs: other.0,
            })
    }

    /// Checked subtraction.
    pub fn minus(self, other: Duration) -> Result<Self, TimeError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(TimeError::Overflow {
                op: "minus",
                lhs: self.0,
                rhs: other.0,
            })
    }

    /// Checked multiplication by an integer scalar.
    pub fn times(self, factor: i64) -> Result<Self, TimeError> {
        self.0
            .checked_mul(factor)
            .map(Self)
            .ok_or(TimeError::Overflow {
                op: "times",
                lhs: self.0,
                rhs: factor,
            })
    }

    /// Checked negation. Fails only for [`Duration::MIN`].
    pub fn negate(self) -> Result<Self, TimeError> {
        self.0.checked_neg().map(Self).ok_or(TimeError::Overflow {
            op: "negate",
            lhs: self.0,
            rhs: 0,
        })
    }

    /// Addition clamped to `[MIN, MAX]`.
    ///
    /// Only for computing search horizons, never for instants that end up
    /// in results.
    pub fn saturating_plus(self, other: Duration) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtraction clamped to `[MIN, MAX]`.
    pub fn saturating_minus(self, other: Duration) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// True if strictly less than zero.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// True if exactly zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// True if strictly greater than zero.
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// How many `unit`s fit in `self`, as a float.
    pub fn ratio_over(self, unit: Duration) -> f64 {
        self.0 as f64 / unit.0 as f64
    }

    /// This duration in (fractional) seconds.
    pub fn as_seconds(self) -> f64 {
        self.ratio_over(Self::SECOND)
    }

    /// The smallest duration not shorter than `seconds`.
    pub fn from_seconds_upward(seconds: f64) -> Result<Self, TimeError> {
        Self::from_micros_f64((seconds * 1e6).ceil(), seconds)
    }

    /// The largest duration not longer than `seconds`.
    pub fn from_seconds_downward(seconds: f64) -> Result<Self, TimeError> {
        Self::from_micros_f64((seconds * 1e6).floor(), seconds)
    }

    fn from_micros_f64(micros: f64, seconds: f64) -> Result<Self, TimeError> {
        // i64::MAX as f64 rounds up to 2^63, so the upper test is exclusive.
        if !micros.is_finite() || micros < i64::MIN as f64 || micros >= i64::MAX as f64 {
            return Err(TimeError::Unrepresentable { seconds });
        }
        Ok(Self(micros as i64))
    }

    /// The calendar instant `self` after `epoch`.
    pub fn add_to(self, epoch: DateTime<Utc>) -> Result<DateTime<Utc>, TimeError> {
        epoch
            .checked_add_signed(TimeDelta::microseconds(self.0))
            .ok_or(TimeError::EpochOutOfRange { micros: self.0 })
    }

    /// The signed duration from `from` to `to`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, TimeError> {
        (to - from)
            .num_microseconds()
            .map(Self)
            .ok_or(TimeError::Unrepresentable {
                seconds: (to - from).num_seconds() as f64,
            })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { '-' } else { '+' };
        let micros = self.0.unsigned_abs();
        let hours = micros / 3_600_000_000;
        let minutes = (micros / 60_000_000) % 60;
        let seconds = (micros / 1_000_000) % 60;
        let fraction = micros % 1_000_000;
        write!(f, "{sign}{hours:02}:{minutes:02}:{seconds:02}.{fraction:06}")
    }
}

impl From<i64> for Duration {
    fn from(micros: i64) -> Self {
        Self(micros)
    }
}

// ── Window ──────────────────────────────────────────────────────

/// A closed interval `[start, end]` of simulated time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// First instant in the window.
    pub start: Duration,
    /// Last instant in the window (inclusive).
    pub end: Duration,
}

impl Window {
    /// Construct `[start, end]`.
    pub fn new(start: Duration, end: Duration) -> Self {
        Self { start, end }
    }

    /// True if `at` lies within the window.
    pub fn contains(&self, at: Duration) -> bool {
        self.start <= at && at <= self.end
    }

    /// The same window moved later by `offset`.
    pub fn shifted(&self, offset: Duration) -> Result<Self, TimeError> {
        Ok(Self {
            start: self.start.plus(offset)?,
            end: self.end.plus(offset)?,
        })
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unit_constants_are_consistent() {
        assert_eq!(Duration::of(1000, Duration::MICROSECOND).unwrap(), Duration::MILLISECOND);
        assert_eq!(Duration::of(60, Duration::SECOND).unwrap(), Duration::MINUTE);
        assert_eq!(Duration::of(24, Duration::HOUR).unwrap(), Duration::DAY);
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        assert!(matches!(
            Duration::MAX.plus(Duration::EPSILON),
            Err(TimeError::Overflow { op: "plus", .. })
        ));
        assert!(Duration::MIN.minus(Duration::EPSILON).is_err());
        assert!(Duration::MAX.times(2).is_err());
        assert!(Duration::MIN.negate().is_err());
    }

    #[test]
    fn seconds_rounding_directions() {
        assert_eq!(
            Duration::from_seconds_upward(1.0000001).unwrap(),
            Duration::from_micros(1_000_001)
        );
        assert_eq!(
            Duration::from_seconds_downward(1.0000009).unwrap(),
            Duration::SECOND
        );
        assert!(Duration::from_seconds_upward(f64::NAN).is_err());
        assert!(Duration::from_seconds_downward(f64::INFINITY).is_err());
        assert!(Duration::from_seconds_upward(1e300).is_err());
    }

    #[test]
    fn display_formats_sign_and_fields() {
        let d = Duration::of(3723, Duration::SECOND)
            .unwrap()
            .plus(Duration::from_micros(5))
            .unwrap();
        assert_eq!(d.to_string(), "+01:02:03.000005");
        assert_eq!(d.negate().unwrap().to_string(), "-01:02:03.000005");
        assert_eq!(Duration::MIN.to_string().chars().next(), Some('-'));
    }

    #[test]
    fn epoch_offsets_round_trip() {
        let epoch = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = Duration::of(90, Duration::MINUTE).unwrap().add_to(epoch).unwrap();
        assert_eq!(
            Duration::between(epoch, later).unwrap(),
            Duration::of(90, Duration::MINUTE).unwrap()
        );
    }

    #[test]
    fn window_shift_and_contains() {
        let w = Window::new(Duration::SECOND, Duration::of(2, Duration::SECOND).unwrap());
        assert!(w.contains(Duration::SECOND));
        assert!(!w.contains(Duration::ZERO));
        let s = w.shifted(Duration::SECOND).unwrap();
        assert_eq!(s.start, Duration::of(2, Duration::SECOND).unwrap());
    }

    proptest! {
        #[test]
        fn plus_then_minus_is_identity(a in -1_000_000_000_000i64..1_000_000_000_000, b in -1_000_000_000_000i64..1_000_000_000_000) {
            let a = Duration::from_micros(a);
            let b = Duration::from_micros(b);
            prop_assert_eq!(a.plus(b).unwrap().minus(b).unwrap(), a);
        }

        #[test]
        fn ordering_matches_micros(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(Duration::from_micros(a).cmp(&Duration::from_micros(b)), a.cmp(&b));
        }
    }
}
