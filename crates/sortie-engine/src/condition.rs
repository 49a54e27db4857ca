//! Resource-derived wake-up conditions.
//!
//! A [`Condition`] answers one question: starting from the queried node,
//! after how long does the predicate first hold? It answers analytically,
//! from the current dynamics, rather than by polling. The engine records
//! which cells the condition read and asks again only when one of them
//! changes.

use sortie_core::{Duration, RealDynamics};
use sortie_history::{HistoryError, Querier};

/// A predicate over resources with an analytic earliest-satisfaction solver.
pub trait Condition: Send {
    /// Offset from `querier.now()` at which the predicate first holds,
    /// searching no further than `horizon` ahead. `None` if it does not hold
    /// within that span under the current dynamics.
    fn next_satisfied(
        &mut self,
        querier: &mut Querier<'_>,
        horizon: Duration,
    ) -> Result<Option<Duration>, HistoryError>;
}

impl<F> Condition for F
where
    F: FnMut(&mut Querier<'_>, Duration) -> Result<Option<Duration>, HistoryError> + Send,
{
    fn next_satisfied(
        &mut self,
        querier: &mut Querier<'_>,
        horizon: Duration,
    ) -> Result<Option<Duration>, HistoryError> {
        self(querier, horizon)
    }
}

/// Box a closure as a condition, pinning down its signature for inference.
pub fn condition_fn<F>(f: F) -> Box<dyn Condition>
where
    F: FnMut(&mut Querier<'_>, Duration) -> Result<Option<Duration>, HistoryError>
        + Send
        + 'static,
{
    Box::new(f)
}

/// Holds while a real resource lies within `[lower, upper]`.
pub struct WhenBetween<R> {
    read: R,
    lower: f64,
    upper: f64,
}

impl<R> Condition for WhenBetween<R>
where
    R: FnMut(&mut Querier<'_>) -> Result<RealDynamics, HistoryError> + Send,
{
    fn next_satisfied(
        &mut self,
        querier: &mut Querier<'_>,
        horizon: Duration,
    ) -> Result<Option<Duration>, HistoryError> {
        let dynamics = (self.read)(querier)?;
        Ok(dynamics
            .when_between(self.lower, self.upper, horizon)
            .map(|window| window.start))
    }
}

/// A condition that holds while `read` yields dynamics within the band.
pub fn when_between<R>(read: R, lower: f64, upper: f64) -> WhenBetween<R>
where
    R: FnMut(&mut Querier<'_>) -> Result<RealDynamics, HistoryError> + Send,
{
    WhenBetween { read, lower, upper }
}

/// A condition that holds while `read` yields dynamics at or above `threshold`.
pub fn when_at_least<R>(read: R, threshold: f64) -> WhenBetween<R>
where
    R: FnMut(&mut Querier<'_>) -> Result<RealDynamics, HistoryError> + Send,
{
    when_between(read, threshold, f64::INFINITY)
}

/// A condition that holds while `read` yields dynamics at or below `threshold`.
pub fn when_at_most<R>(read: R, threshold: f64) -> WhenBetween<R>
where
    R: FnMut(&mut Querier<'_>) -> Result<RealDynamics, HistoryError> + Send,
{
    when_between(read, f64::NEG_INFINITY, threshold)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sortie_core::{Cell, EffectConflict, EffectTrait};
    use sortie_history::{History, HistoryConfig, RegistryBuilder};

    use super::*;

    #[derive(Clone, Debug)]
    struct Nothing;

    impl EffectTrait for Nothing {
        fn empty() -> Self {
            Nothing
        }
        fn sequentially(_: &Self, _: &Self) -> Self {
            Nothing
        }
        fn concurrently(_: &Self, _: &Self) -> Result<Self, EffectConflict> {
            Ok(Nothing)
        }
    }

    struct Falling;

    impl Cell for Falling {
        type Effect = Nothing;
        fn duplicate(&self) -> Self {
            Falling
        }
        fn react(&mut self, _: &Nothing) {}
    }

    fn history() -> (History, sortie_core::CellRef<Falling>) {
        let mut b = RegistryBuilder::new();
        let cell = b.allocate("falling", Falling);
        let h = History::new(Arc::new(b.build()), HistoryConfig::default()).unwrap();
        (h, cell)
    }

    #[test]
    fn threshold_crossing_is_solved_analytically() {
        let (h, cell) = history();
        let mut q = Querier::new(&h, h.root()).unwrap();
        // 10 - 2t reaches 4 at t = 3s.
        let mut cond = when_at_most(
            move |q: &mut Querier<'_>| q.get(&cell, |_| RealDynamics::linear(10.0, -2.0)),
            4.0,
        );
        let at = cond.next_satisfied(&mut q, Duration::MINUTE).unwrap();
        assert_eq!(at, Some(Duration::of(3, Duration::SECOND).unwrap()));
        assert_eq!(q.reads(), &[cell.id()]);
    }

    #[test]
    fn already_true_is_zero_and_never_is_none() {
        let (h, cell) = history();
        let mut q = Querier::new(&h, h.root()).unwrap();
        let mut above = when_at_least(
            move |q: &mut Querier<'_>| q.get(&cell, |_| RealDynamics::constant(5.0)),
            1.0,
        );
        assert_eq!(
            above.next_satisfied(&mut q, Duration::SECOND).unwrap(),
            Some(Duration::ZERO)
        );
        let mut never = when_at_least(
            move |q: &mut Querier<'_>| q.get(&cell, |_| RealDynamics::constant(0.0)),
            1.0,
        );
        assert_eq!(never.next_satisfied(&mut q, Duration::SECOND).unwrap(), None);
    }

    #[test]
    fn closures_are_conditions() {
        let (h, _) = history();
        let mut q = Querier::new(&h, h.root()).unwrap();
        let mut cond = condition_fn(|_, horizon| Ok(Some(horizon)));
        assert_eq!(
            cond.next_satisfied(&mut q, Duration::SECOND).unwrap(),
            Some(Duration::SECOND)
        );
    }
}
