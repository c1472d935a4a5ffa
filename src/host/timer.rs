use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Deadline-ordered one-shot timers on a caller-supplied clock
///
/// Times are offsets from an arbitrary epoch; the owner decides whether that
/// clock is virtual or wall time.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    /// (deadline, id) so ties fire in scheduling order
    by_deadline: BTreeSet<(Duration, TimerId)>,
    deadlines: HashMap<TimerId, Duration>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Duration, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let deadline = now.saturating_add(delay);
        self.by_deadline.insert((deadline, id));
        self.deadlines.insert(id, deadline);
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.by_deadline.remove(&(deadline, id)),
            None => false,
        }
    }

    /// Remove and return every timer due at `now`, earliest first
    ///
    /// Timers scheduled while the caller dispatches these are left for the
    /// next call, so zero-delay chains cannot spin inside one pump.
    pub fn take_due(&mut self, now: Duration) -> Vec<TimerId> {
        let mut due = Vec::new();
        while let Some(&(deadline, id)) = self.by_deadline.first() {
            if deadline > now {
                break;
            }
            self.by_deadline.pop_first();
            self.deadlines.remove(&id);
            due.push(id);
        }
        due
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Duration> {
        self.by_deadline.first().map(|&(deadline, _)| deadline)
    }

    pub fn pending(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        let late = timers.schedule(Duration::ZERO, 80 * MS);
        let early = timers.schedule(Duration::ZERO, 40 * MS);
        let same = timers.schedule(Duration::ZERO, 40 * MS);

        assert!(timers.take_due(39 * MS).is_empty());
        assert_eq!(timers.take_due(40 * MS), vec![early, same]);
        assert_eq!(timers.take_due(200 * MS), vec![late]);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut timers = TimerQueue::new();
        let id = timers.schedule(Duration::ZERO, MS);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.take_due(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn next_deadline_tracks_earliest() {
        let mut timers = TimerQueue::new();
        assert_eq!(timers.next_deadline(), None);
        timers.schedule(10 * MS, 5 * MS);
        timers.schedule(10 * MS, 2 * MS);
        assert_eq!(timers.next_deadline(), Some(12 * MS));
    }
}
