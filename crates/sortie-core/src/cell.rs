//! The cell and effect-algebra contract.
//!
//! A [`Cell`] is one unit of simulated state. Tasks never mutate cells
//! directly; they emit effects, and the history substrate applies them.
//! The cell's [`EffectTrait`] decides how effects emitted at the same
//! instant combine, which is the single place where "what happens when two
//! things occur at once" is settled for that kind of state.

use std::fmt;

use crate::error::EffectConflict;
use crate::time::Duration;

/// The combination algebra for one kind of effect.
///
/// # Laws
///
/// - `empty()` is an identity for both operators.
/// - `sequentially` is associative.
/// - `concurrently` is associative and commutative wherever it succeeds.
/// - Reacting to `a` then `b` equals reacting once to `sequentially(a, b)`.
///
/// Effect types without a commutative merge for some pair (absolute sets,
/// for example) must return [`EffectConflict`] from `concurrently` instead
/// of picking a winner by incidental ordering.
pub trait EffectTrait: Clone + fmt::Debug + Send + Sync + 'static {
    /// The effect that changes nothing.
    fn empty() -> Self;

    /// `prefix` followed by `suffix` on the same causal line.
    fn sequentially(prefix: &Self, suffix: &Self) -> Self;

    /// `left` and `right` emitted in sibling branches at the same instant.
    fn concurrently(left: &Self, right: &Self) -> Result<Self, EffectConflict>;
}

/// A unit of simulated state with a deterministic merge rule.
///
/// # Contract
///
/// - `duplicate` returns a value-independent copy; mutating one never
///   affects the other. Forked history branches rely on this.
/// - `react` is a pure function of the current state and the effect.
/// - `step` advances continuous dynamics by `elapsed` and must commute with
///   `react` for effects that logically occur at the start of the interval.
pub trait Cell: Send + Sync + 'static {
    /// The effect type this cell interprets.
    type Effect: EffectTrait;

    /// Independent copy of this cell.
    fn duplicate(&self) -> Self
    where
        Self: Sized;

    /// Apply one (possibly combined) effect in place.
    fn react(&mut self, effect: &Self::Effect);

    /// Advance continuous dynamics. Discrete cells keep the default no-op.
    fn step(&mut self, elapsed: Duration) {
        let _ = elapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Sum(i64);

    impl EffectTrait for Sum {
        fn empty() -> Self {
            Sum(0)
        }
        fn sequentially(prefix: &Self, suffix: &Self) -> Self {
            Sum(prefix.0 + suffix.0)
        }
        fn concurrently(left: &Self, right: &Self) -> Result<Self, EffectConflict> {
            Ok(Sum(left.0 + right.0))
        }
    }

    struct Tally(i64);

    impl Cell for Tally {
        type Effect = Sum;
        fn duplicate(&self) -> Self {
            Tally(self.0)
        }
        fn react(&mut self, effect: &Sum) {
            self.0 += effect.0;
        }
    }

    #[test]
    fn react_sequence_matches_combined_effect() {
        let mut a = Tally(5);
        a.react(&Sum(2));
        a.react(&Sum(3));
        let mut b = Tally(5);
        b.react(&Sum::sequentially(&Sum(2), &Sum(3)));
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn duplicate_is_independent() {
        let a = Tally(1);
        let mut b = a.duplicate();
        b.react(&Sum(10));
        assert_eq!(a.0, 1);
        assert_eq!(b.0, 11);
    }

    #[test]
    fn default_step_is_noop() {
        let mut a = Tally(4);
        a.step(Duration::SECOND);
        assert_eq!(a.0, 4);
    }
}
