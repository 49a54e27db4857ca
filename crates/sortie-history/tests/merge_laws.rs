//! Merge-order independence of the branching history.
//!
//! For commutative effect algebras the merged state must not depend on the
//! order in which concurrent branches are listed, and replay through
//! snapshots must agree with replay from the root.

use std::sync::Arc;

use proptest::prelude::*;
use sortie_cells::{AccumulatorCell, CounterCell, CounterEffect, LinearEffect};
use sortie_core::Duration;
use sortie_history::{History, HistoryConfig, RegistryBuilder};

fn deltas() -> impl Strategy<Value = Vec<Vec<i32>>> {
    prop::collection::vec(prop::collection::vec(-100i32..100, 0..4), 1..5)
}

proptest! {
    #[test]
    fn merged_volume_is_order_independent(branches in deltas()) {
        let mut b = RegistryBuilder::new();
        let (fruit, topic) = b.allocate_with_topic("fruit", AccumulatorCell::new(0.0, 0.0));
        let mut h = History::new(Arc::new(b.build()), HistoryConfig::default()).unwrap();
        let root = h.root();

        let mut tips = Vec::new();
        for deltas in &branches {
            let mut branch = h.fork(root).unwrap();
            for d in deltas {
                h.emit_on(&mut branch, &topic, LinearEffect::volume(f64::from(*d))).unwrap();
            }
            tips.push(branch.tip);
        }
        let forward = h.merge(root, &tips).unwrap();
        tips.reverse();
        let backward = h.merge(root, &tips).unwrap();

        let expected: i32 = branches.iter().flatten().sum();
        prop_assert_eq!(h.query(forward, &fruit, |c| c.volume()).unwrap(), f64::from(expected));
        prop_assert_eq!(h.query(backward, &fruit, |c| c.volume()).unwrap(), f64::from(expected));
    }

    #[test]
    fn snapshot_interval_does_not_change_answers(steps in prop::collection::vec(-50i64..50, 1..40), interval in 1usize..8) {
        let build = |interval: usize| {
            let mut b = RegistryBuilder::new();
            let (count, topic) = b.allocate_with_topic("count", CounterCell::new(0));
            let h = History::new(Arc::new(b.build()), HistoryConfig { snapshot_interval: interval }).unwrap();
            (h, count, topic)
        };
        let (mut sparse, count, topic) = build(usize::MAX);
        let (mut dense, _, _) = build(interval);

        let mut a = sparse.root();
        let mut c = dense.root();
        for step in &steps {
            a = sparse.emit(a, &topic, CounterEffect(*step)).unwrap();
            a = sparse.advance(a, Duration::SECOND).unwrap();
            sparse.commit(a).unwrap();
            c = dense.emit(c, &topic, CounterEffect(*step)).unwrap();
            c = dense.advance(c, Duration::SECOND).unwrap();
            dense.commit(c).unwrap();
        }
        prop_assert_eq!(
            sparse.query(a, &count, |x| x.value()).unwrap(),
            dense.query(c, &count, |x| x.value()).unwrap()
        );
        prop_assert_eq!(sparse.query(a, &count, |x| x.value()).unwrap(), steps.iter().sum::<i64>());
    }
}
