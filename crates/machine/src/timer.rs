//! Deadline-ordered queue of delayed events owned by the machine.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Handle to cancel a scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Entries fire in deadline order; equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<(Instant, u64), T>,
    deadlines: HashMap<u64, Instant>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, at: Instant, item: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((at, seq), item);
        self.deadlines.insert(seq, at);
        TimerId(seq)
    }

    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let at = self.deadlines.remove(&id.0)?;
        self.entries.remove(&(at, id.0))
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(at, _)| *at)
    }

    /// Remove and return the earliest entry due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        let (&(at, seq), _) = self.entries.iter().next()?;
        if at > now {
            return None;
        }
        self.deadlines.remove(&seq);
        self.entries.remove(&(at, seq))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_fires_in_deadline_order() {
        let start = Instant::now();
        let mut timers = TimerQueue::new();
        timers.schedule(start + Duration::from_millis(20), "late");
        timers.schedule(start + Duration::from_millis(10), "early");
        timers.schedule(start + Duration::from_millis(10), "early-second");

        assert_eq!(timers.next_deadline(), Some(start + Duration::from_millis(10)));
        assert_eq!(timers.pop_due(start), None);

        let now = start + Duration::from_millis(15);
        assert_eq!(timers.pop_due(now), Some("early"));
        assert_eq!(timers.pop_due(now), Some("early-second"));
        assert_eq!(timers.pop_due(now), None);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_cancel() {
        let start = Instant::now();
        let mut timers = TimerQueue::new();
        let id = timers.schedule(start, 1u8);
        timers.schedule(start, 2u8);

        assert_eq!(timers.cancel(id), Some(1));
        assert_eq!(timers.cancel(id), None);
        assert_eq!(timers.pop_due(start), Some(2));
        assert!(timers.is_empty());
    }
}
