//! Error types shared across the Sortie crates.
//!
//! Two families live here because every other crate needs them: clock
//! arithmetic failures ([`TimeError`]) and effect-combination conflicts
//! ([`EffectConflict`]). Subsystem errors (history, engine) wrap these.

use thiserror::Error;

/// Failures of fixed-resolution time arithmetic.
///
/// Every operation on [`Duration`](crate::Duration) that could leave the
/// representable range reports one of these instead of wrapping.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TimeError {
    /// An arithmetic operation overflowed the signed 64-bit microsecond range.
    #[error("duration overflow in {op}: {lhs}us and {rhs}")]
    Overflow {
        /// The operation that overflowed (`plus`, `minus`, `times`, ...).
        op: &'static str,
        /// Left operand, in microseconds.
        lhs: i64,
        /// Right operand (microseconds, or a scalar factor for `times`).
        rhs: i64,
    },
    /// A floating-point quantity of seconds was NaN, infinite, or out of range.
    #[error("{seconds} seconds cannot be represented as a duration")]
    Unrepresentable {
        /// The offending number of seconds.
        seconds: f64,
    },
    /// Adding a duration to a calendar epoch left chrono's supported range.
    #[error("epoch offset of {micros}us is out of calendar range")]
    EpochOutOfRange {
        /// The offset that could not be applied, in microseconds.
        micros: i64,
    },
}

/// Two effects emitted concurrently on the same cell cannot be combined.
///
/// Raised by [`EffectTrait::concurrently`](crate::EffectTrait::concurrently)
/// for effect types with no commutative merge for the given pair (for
/// example, two different absolute "set" values).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("conflicting concurrent effects: {reason}")]
pub struct EffectConflict {
    /// Human-readable description of the conflicting pair.
    pub reason: String,
}

impl EffectConflict {
    /// Build a conflict with the given description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
