//! Integer tally cell.

use sortie_core::{Cell, EffectConflict, EffectTrait};

/// Signed increment to a [`CounterCell`].
///
/// Sequential composition saturates at the `i64` bounds, and saturation is
/// lossy: near a bound, reacting to `+1` then `-1` is not the same as
/// reacting once to their sequential composition. Concurrent composition
/// reports overflow as a conflict instead, since no order exists in which to
/// clamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterEffect(pub i64);

impl EffectTrait for CounterEffect {
    fn empty() -> Self {
        Self(0)
    }

    fn sequentially(prefix: &Self, suffix: &Self) -> Self {
        Self(prefix.0.saturating_add(suffix.0))
    }

    fn concurrently(left: &Self, right: &Self) -> Result<Self, EffectConflict> {
        left.0
            .checked_add(right.0)
            .map(Self)
            .ok_or_else(|| EffectConflict::new(format!("counter overflow: {} + {}", left.0, right.0)))
    }
}

/// An integer count. Saturates at the `i64` bounds; see [`CounterEffect`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterCell {
    value: i64,
}

impl CounterCell {
    /// Start at `value`.
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    /// Current count.
    pub fn value(&self) -> i64 {
        self.value
    }
}

impl Cell for CounterCell {
    type Effect = CounterEffect;

    fn duplicate(&self) -> Self {
        *self
    }

    fn react(&mut self, effect: &CounterEffect) {
        self.value = self.value.saturating_add(effect.0);
    }
}
