//! Absolute-value register cell.
//!
//! # Concurrency policy
//!
//! Sequential sets keep the last value. Two sibling branches setting the
//! *same* value merge to that value; two different values are an
//! [`EffectConflict`]. Picking a winner would make the result depend on
//! which branch the engine happened to combine first.

use std::fmt;

use sortie_core::{Cell, EffectConflict, EffectTrait};

/// Either leave the register alone or overwrite it.
#[derive(Clone, Debug, PartialEq)]
pub enum SetEffect<T> {
    /// No change.
    Unchanged,
    /// Overwrite with this value.
    Set(T),
}

impl<T> Default for SetEffect<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

impl<T> EffectTrait for SetEffect<T>
where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn empty() -> Self {
        Self::Unchanged
    }

    fn sequentially(prefix: &Self, suffix: &Self) -> Self {
        match suffix {
            Self::Unchanged => prefix.clone(),
            Self::Set(_) => suffix.clone(),
        }
    }

    fn concurrently(left: &Self, right: &Self) -> Result<Self, EffectConflict> {
        match (left, right) {
            (Self::Unchanged, other) | (other, Self::Unchanged) => Ok(other.clone()),
            (Self::Set(a), Self::Set(b)) if a == b => Ok(left.clone()),
            (Self::Set(a), Self::Set(b)) => Err(EffectConflict::new(format!(
                "concurrent sets {a:?} and {b:?}"
            ))),
        }
    }
}

/// Holds one value of type `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterCell<T> {
    value: T,
}

impl<T> RegisterCell<T> {
    /// Start holding `value`.
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Current value.
    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T> Cell for RegisterCell<T>
where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    type Effect = SetEffect<T>;

    fn duplicate(&self) -> Self {
        self.clone()
    }

    fn react(&mut self, effect: &SetEffect<T>) {
        if let SetEffect::Set(v) = effect {
            self.value = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_sequential_set_wins() {
        let e = SetEffect::sequentially(&SetEffect::Set(1), &SetEffect::Set(2));
        assert_eq!(e, SetEffect::Set(2));
        let e = SetEffect::sequentially(&SetEffect::Set(1), &SetEffect::Unchanged);
        assert_eq!(e, SetEffect::Set(1));
    }

    #[test]
    fn different_concurrent_sets_conflict() {
        let err = SetEffect::concurrently(&SetEffect::Set("Dole"), &SetEffect::Set("Chiquita")).unwrap_err();
        assert!(err.reason.contains("Dole"));
    }

    #[test]
    fn identical_concurrent_sets_agree() {
        assert_eq!(
            SetEffect::concurrently(&SetEffect::Set(3), &SetEffect::Set(3)).unwrap(),
            SetEffect::Set(3)
        );
        assert_eq!(
            SetEffect::concurrently(&SetEffect::Unchanged, &SetEffect::Set(3)).unwrap(),
            SetEffect::Set(3)
        );
    }

    #[test]
    fn react_overwrites() {
        let mut r = RegisterCell::new(String::from("Chiquita"));
        r.react(&SetEffect::Set(String::from("Dole")));
        r.react(&SetEffect::Unchanged);
        assert_eq!(r.get(), "Dole");
    }
}
