//! Frame-keyed deferred actions
//!
//! Delayed work (group resets, ball respawn, multiball release) is queued with
//! the frame it becomes due and the game epoch it belongs to. Entries from an
//! older epoch are dropped when they come due, so restarting a game never
//! needs to cancel anything.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scheduled<A> {
    due_frame: u64,
    epoch: u32,
    action: A,
}

/// Queue of actions waiting for a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler<A> {
    entries: Vec<Scheduled<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_frame: u64, epoch: u32, action: A) {
        self.entries.push(Scheduled {
            due_frame,
            epoch,
            action,
        });
    }

    /// Remove and return every action due at or before `frame` for `epoch`
    ///
    /// Actions come out in the order they were scheduled. Due entries from
    /// other epochs are discarded.
    pub fn drain_due(&mut self, frame: u64, epoch: u32) -> Vec<A> {
        let mut due = Vec::new();
        let mut pending = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.due_frame > frame {
                pending.push(entry);
            } else if entry.epoch == epoch {
                due.push(entry.action);
            } else {
                log::debug!("Dropping stale action from epoch {}", entry.epoch);
            }
        }
        self.entries = pending;
        due
    }

    /// Any action queued for `epoch` matching `pred`
    pub fn any_pending(&self, epoch: u32, mut pred: impl FnMut(&A) -> bool) -> bool {
        self.entries.iter().any(|e| e.epoch == epoch && pred(&e.action))
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
    use super::*;

    #[test]
    fn test_actions_fire_when_due() {
        let mut sched = Scheduler::new();
        sched.schedule(10, 1, "a");
        sched.schedule(5, 1, "b");
        assert!(sched.drain_due(4, 1).is_empty());
        assert_eq!(sched.drain_due(5, 1), vec!["b"]);
        assert_eq!(sched.drain_due(20, 1), vec!["a"]);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_stale_epoch_is_dropped() {
        let mut sched = Scheduler::new();
        sched.schedule(3, 1, 7u32);
        sched.schedule(3, 2, 8u32);
        assert_eq!(sched.drain_due(3, 2), vec![8]);
        assert!(sched.is_empty());
    }

    #[test]
    fn test_any_pending() {
        let mut sched = Scheduler::new();
        sched.schedule(3, 1, 7u32);
        assert!(sched.any_pending(1, |&a| a == 7));
        assert!(!sched.any_pending(2, |&a| a == 7));
        assert!(!sched.any_pending(1, |&a| a == 8));
        assert_eq!(sched.len(), 1);
    }
}
