//! Deterministic ready queue.
//!
//! A min-heap keyed by `(instant, seq)`, where `seq` increases with every
//! push. Jobs at the same instant therefore come out in enqueue order,
//! independent of heap internals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use sortie_core::{Duration, TaskId};

/// Work the engine can be asked to do at an instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Job {
    /// Step the task.
    Step(TaskId),
    /// Step the task if its condition wait is still at `generation`.
    Wake {
        /// The waiting task.
        task: TaskId,
        /// Generation of the condition evaluation that scheduled this.
        generation: u64,
    },
}

#[cfg(test)]
impl Job {
    pub(crate) fn task(self) -> TaskId {
        match self {
            Self::Step(task) | Self::Wake { task, .. } => task,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    at: Duration,
    seq: u64,
    job: Job,
}

// Reversed so `BinaryHeap` pops the smallest `(at, seq)` first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl ReadyQueue {
    pub(crate) fn push(&mut self, at: Duration, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { at, seq, job });
    }

    /// Earliest pending instant.
    pub(crate) fn next_time(&self) -> Option<Duration> {
        self.heap.peek().map(|e| e.at)
    }

    /// Remove every job queued at exactly `at`, in enqueue order.
    pub(crate) fn pop_at(&mut self, at: Duration) -> Vec<Job> {
        let mut jobs = Vec::new();
        while self.heap.peek().is_some_and(|e| e.at == at) {
            if let Some(entry) = self.heap.pop() {
                jobs.push(entry.job);
            }
        }
        jobs
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instant_is_fifo() {
        let mut q = ReadyQueue::default();
        for i in [5u64, 1, 9, 3] {
            q.push(Duration::SECOND, Job::Step(TaskId(i)));
        }
        let order: Vec<u64> = q.pop_at(Duration::SECOND).iter().map(|j| j.task().0).collect();
        assert_eq!(order, vec![5, 1, 9, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn earlier_instants_first() {
        let mut q = ReadyQueue::default();
        q.push(Duration::MINUTE, Job::Step(TaskId(0)));
        q.push(Duration::SECOND, Job::Step(TaskId(1)));
        q.push(
            Duration::SECOND,
            Job::Wake {
                task: TaskId(2),
                generation: 7,
            },
        );
        assert_eq!(q.next_time(), Some(Duration::SECOND));
        assert_eq!(q.pop_at(Duration::SECOND).len(), 2);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_time(), Some(Duration::MINUTE));
        assert!(q.pop_at(Duration::SECOND).is_empty());
    }
}
