//! Linear integration cell.
//!
//! Holds a `volume` that grows at `rate` per second. Effects add deltas to
//! either quantity, so concurrent effects combine by summation.
//!
//! # Construction
//!
//! ```
//! use sortie_cells::{AccumulatorCell, LinearEffect};
//! use sortie_core::Cell;
//!
//! let mut fruit = AccumulatorCell::new(4.0, 0.0);
//! fruit.react(&LinearEffect::volume(-1.0));
//! assert_eq!(fruit.volume(), 3.0);
//! ```

use sortie_core::{Cell, Duration, EffectConflict, EffectTrait, RealDynamics};

/// Additive change to an accumulator's volume and rate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinearEffect {
    /// Added to the volume.
    pub volume_delta: f64,
    /// Added to the rate (per second).
    pub rate_delta: f64,
}

impl LinearEffect {
    /// Change only the volume.
    pub fn volume(delta: f64) -> Self {
        Self {
            volume_delta: delta,
            rate_delta: 0.0,
        }
    }

    /// Change only the rate.
    pub fn rate(delta: f64) -> Self {
        Self {
            volume_delta: 0.0,
            rate_delta: delta,
        }
    }
}

impl EffectTrait for LinearEffect {
    fn empty() -> Self {
        Self::default()
    }

    fn sequentially(prefix: &Self, suffix: &Self) -> Self {
        Self {
            volume_delta: prefix.volume_delta + suffix.volume_delta,
            rate_delta: prefix.rate_delta + suffix.rate_delta,
        }
    }

    fn concurrently(left: &Self, right: &Self) -> Result<Self, EffectConflict> {
        Ok(Self::sequentially(left, right))
    }
}

/// A volume integrated over a piecewise-constant rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AccumulatorCell {
    volume: f64,
    rate: f64,
}

impl AccumulatorCell {
    /// Start at `volume`, changing by `rate` per second.
    pub fn new(volume: f64, rate: f64) -> Self {
        Self { volume, rate }
    }

    /// Current volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Current rate per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The trajectory from this instant on, until the next effect.
    pub fn dynamics(&self) -> RealDynamics {
        RealDynamics::linear(self.volume, self.rate)
    }
}

impl Cell for AccumulatorCell {
    type Effect = LinearEffect;

    fn duplicate(&self) -> Self {
        *self
    }

    fn react(&mut self, effect: &LinearEffect) {
        self.volume += effect.volume_delta;
        self.rate += effect.rate_delta;
    }

    fn step(&mut self, elapsed: Duration) {
        self.volume += self.rate * elapsed.as_seconds();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_integrates_rate() {
        let mut c = AccumulatorCell::new(1.0, 0.5);
        c.step(Duration::of(4, Duration::SECOND).unwrap());
        assert_eq!(c.volume(), 3.0);
        assert_eq!(c.rate(), 0.5);
    }

    #[test]
    fn react_adjusts_volume_and_rate() {
        let mut c = AccumulatorCell::new(4.0, 0.0);
        c.react(&LinearEffect::volume(-10.0));
        c.react(&LinearEffect::rate(2.0));
        assert_eq!(c.dynamics(), RealDynamics::linear(-6.0, 2.0));
    }

    #[test]
    fn concurrent_effects_sum() {
        let merged = LinearEffect::concurrently(&LinearEffect::volume(3.0), &LinearEffect::volume(7.0)).unwrap();
        assert_eq!(merged, LinearEffect::volume(10.0));
    }

    #[test]
    fn empty_is_identity() {
        let e = LinearEffect { volume_delta: 1.5, rate_delta: -0.25 };
        assert_eq!(LinearEffect::sequentially(&LinearEffect::empty(), &e), e);
        assert_eq!(LinearEffect::concurrently(&e, &LinearEffect::empty()).unwrap(), e);
    }
}
