//! Deadline-ordered timer queue.
//!
//! A min-heap ordered by deadline, then by insertion sequence, so timers
//! with equal deadlines fire in registration order. Cancellation is lazy:
//! the owner drops the callback and the stale heap entry is skipped when it
//! surfaces.

use super::TimerId;
use crate::types::Time;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
struct Entry {
    deadline: Time,
    seq: u64,
    id: TimerId,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn push(&mut self, deadline: Time, id: TimerId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { deadline, seq, id });
    }

    /// Earliest deadline among entries for which `live` holds.
    ///
    /// Dead entries found at the top are discarded on the way.
    pub(crate) fn next_deadline(&mut self, live: impl Fn(TimerId) -> bool) -> Option<Time> {
        while let Some(top) = self.heap.peek() {
            if live(top.id) {
                return Some(top.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops the earliest entry due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Time) -> Option<(Time, TimerId)> {
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop().map(|e| (e.deadline, e.id))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}
