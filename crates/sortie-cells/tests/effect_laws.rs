//! Algebraic laws for the reference effect types.
//!
//! Integer-valued deltas keep float sums exact so equality is meaningful.

use proptest::prelude::*;
use sortie_cells::{AccumulatorCell, CounterEffect, LinearEffect, SetEffect};
use sortie_core::{Cell, EffectTrait};

fn linear() -> impl Strategy<Value = LinearEffect> {
    (-1000i32..1000, -50i32..50).prop_map(|(v, r)| LinearEffect {
        volume_delta: f64::from(v),
        rate_delta: f64::from(r),
    })
}

fn set() -> impl Strategy<Value = SetEffect<u8>> {
    prop_oneof![Just(SetEffect::Unchanged), (0u8..4).prop_map(SetEffect::Set)]
}

proptest! {
    #[test]
    fn linear_concurrent_is_commutative(a in linear(), b in linear()) {
        prop_assert_eq!(
            LinearEffect::concurrently(&a, &b).unwrap(),
            LinearEffect::concurrently(&b, &a).unwrap()
        );
    }

    #[test]
    fn linear_sequential_is_associative(a in linear(), b in linear(), c in linear()) {
        let left = LinearEffect::sequentially(&LinearEffect::sequentially(&a, &b), &c);
        let right = LinearEffect::sequentially(&a, &LinearEffect::sequentially(&b, &c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn reacting_twice_matches_combined(a in linear(), b in linear()) {
        let mut one = AccumulatorCell::new(4.0, 0.0);
        one.react(&a);
        one.react(&b);
        let mut two = AccumulatorCell::new(4.0, 0.0);
        two.react(&LinearEffect::sequentially(&a, &b));
        prop_assert_eq!(one, two);
    }

    #[test]
    fn counter_concurrent_is_commutative(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
        prop_assert_eq!(
            CounterEffect::concurrently(&CounterEffect(a), &CounterEffect(b)).unwrap(),
            CounterEffect::concurrently(&CounterEffect(b), &CounterEffect(a)).unwrap()
        );
    }

    #[test]
    fn set_concurrent_agrees_both_ways(a in set(), b in set()) {
        let ab = SetEffect::concurrently(&a, &b);
        let ba = SetEffect::concurrently(&b, &a);
        prop_assert_eq!(ab.is_ok(), ba.is_ok());
        if let (Ok(x), Ok(y)) = (ab, ba) {
            prop_assert_eq!(x, y);
        }
    }
}
