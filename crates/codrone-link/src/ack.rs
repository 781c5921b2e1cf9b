//! Correlates outbound messages with the frames that answer them.
//!
//! The protocol has no sequence numbers; an answer is matched only by kind.
//! Waiters for the same key are therefore queued and resolved oldest first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use codrone_frame::MessageKind;

/// What a waiter is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expectation {
    /// An Ack frame whose payload names this kind.
    Ack(MessageKind),
    /// Any frame of this kind.
    Data(MessageKind),
}

impl Expectation {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Ack(kind) | Self::Data(kind) => *kind,
        }
    }
}

/// Result of one [`Ticket::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Resolved,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Resolved,
    Cancelled,
}

#[derive(Debug)]
struct Waiter {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Waiter {
    fn settle(&self, outcome: Slot) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if *slot == Slot::Pending {
            *slot = outcome;
        }
        self.ready.notify_all();
    }
}

/// Registry of pending waiters.
#[derive(Debug, Default)]
pub struct AckCoordinator {
    waiters: Mutex<HashMap<Expectation, VecDeque<Arc<Waiter>>>>,
}

impl AckCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a waiter behind any existing ones for the same key.
    ///
    /// The returned ticket deregisters itself when dropped.
    pub fn register(&self, key: Expectation) -> Ticket<'_> {
        let waiter = Arc::new(Waiter {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        });
        self.lock()
            .entry(key)
            .or_default()
            .push_back(Arc::clone(&waiter));
        Ticket {
            coordinator: self,
            key,
            waiter,
        }
    }

    /// Wake the oldest waiter for `key`. Returns `false` if nobody was waiting.
    pub fn resolve(&self, key: Expectation) -> bool {
        let waiter = {
            let mut waiters = self.lock();
            let Some(queue) = waiters.get_mut(&key) else {
                return false;
            };
            let waiter = queue.pop_front();
            if queue.is_empty() {
                waiters.remove(&key);
            }
            waiter
        };

        match waiter {
            Some(waiter) => {
                waiter.settle(Slot::Resolved);
                true
            }
            None => false,
        }
    }

    /// Wake every waiter with [`WaitOutcome::Cancelled`].
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.lock().drain().flat_map(|(_, queue)| queue).collect();
        for waiter in drained {
            waiter.settle(Slot::Cancelled);
        }
    }

    /// Number of waiters queued for `key`.
    pub fn pending(&self, key: Expectation) -> usize {
        self.lock().get(&key).map_or(0, VecDeque::len)
    }

    /// Number of waiters across all keys.
    pub fn len(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Expectation, VecDeque<Arc<Waiter>>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One registration. Wait on it as many times as needed; it stays queued
/// until resolved, cancelled or dropped.
#[derive(Debug)]
pub struct Ticket<'a> {
    coordinator: &'a AckCoordinator,
    key: Expectation,
    waiter: Arc<Waiter>,
}

impl Ticket<'_> {
    pub fn key(&self) -> Expectation {
        self.key
    }

    /// Block until resolved, cancelled, or `timeout` elapses.
    ///
    /// Returns immediately if the ticket was settled while nobody waited.
    pub fn wait(&self, timeout: Duration) -> WaitOutcome {
        let slot = self
            .waiter
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (slot, _) = self
            .waiter
            .ready
            .wait_timeout_while(slot, timeout, |slot| *slot == Slot::Pending)
            .unwrap_or_else(PoisonError::into_inner);

        match *slot {
            Slot::Pending => WaitOutcome::TimedOut,
            Slot::Resolved => WaitOutcome::Resolved,
            Slot::Cancelled => WaitOutcome::Cancelled,
        }
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let mut waiters = self.coordinator.lock();
        if let Some(queue) = waiters.get_mut(&self.key) {
            queue.retain(|waiter| !Arc::ptr_eq(waiter, &self.waiter));
            if queue.is_empty() {
                waiters.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use super::*;

    const COMMAND: Expectation = Expectation::Ack(MessageKind::Command);

    #[test]
    fn resolve_wakes_waiter_on_other_thread() {
        let acks = Arc::new(AckCoordinator::new());
        let ticket = acks.register(COMMAND);

        let resolver = {
            let acks = Arc::clone(&acks);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                acks.resolve(COMMAND)
            })
        };

        assert_eq!(ticket.wait(Duration::from_secs(2)), WaitOutcome::Resolved);
        assert!(resolver.join().unwrap());
        drop(ticket);
        assert!(acks.is_empty());
    }

    #[test]
    fn times_out_without_resolution() {
        let acks = AckCoordinator::new();
        let ticket = acks.register(COMMAND);

        let start = Instant::now();
        assert_eq!(ticket.wait(Duration::from_millis(50)), WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(50));
        // Still registered for the next attempt.
        assert_eq!(acks.pending(COMMAND), 1);
    }

    #[test]
    fn same_key_waiters_resolve_fifo() {
        let acks = AckCoordinator::new();
        let first = acks.register(COMMAND);
        let second = acks.register(COMMAND);
        assert_eq!(acks.pending(COMMAND), 2);

        assert!(acks.resolve(COMMAND));
        assert_eq!(first.wait(Duration::ZERO), WaitOutcome::Resolved);
        assert_eq!(second.wait(Duration::ZERO), WaitOutcome::TimedOut);

        assert!(acks.resolve(COMMAND));
        assert_eq!(second.wait(Duration::ZERO), WaitOutcome::Resolved);
        assert!(!acks.resolve(COMMAND));
    }

    #[test]
    fn keys_are_independent() {
        let acks = AckCoordinator::new();
        let ack = acks.register(Expectation::Ack(MessageKind::State));
        let data = acks.register(Expectation::Data(MessageKind::State));

        assert!(acks.resolve(Expectation::Data(MessageKind::State)));
        assert_eq!(data.wait(Duration::ZERO), WaitOutcome::Resolved);
        assert_eq!(ack.wait(Duration::ZERO), WaitOutcome::TimedOut);
        assert_eq!(ack.key().kind(), MessageKind::State);
    }

    #[test]
    fn late_resolution_is_seen_by_next_wait() {
        let acks = AckCoordinator::new();
        let ticket = acks.register(COMMAND);

        assert_eq!(ticket.wait(Duration::from_millis(10)), WaitOutcome::TimedOut);
        acks.resolve(COMMAND);
        assert_eq!(ticket.wait(Duration::from_secs(1)), WaitOutcome::Resolved);
    }

    #[test]
    fn dropped_ticket_deregisters() {
        let acks = AckCoordinator::new();
        let stale = acks.register(COMMAND);
        let live = acks.register(COMMAND);
        drop(stale);

        assert_eq!(acks.pending(COMMAND), 1);
        assert!(acks.resolve(COMMAND));
        assert_eq!(live.wait(Duration::ZERO), WaitOutcome::Resolved);
    }

    #[test]
    fn cancel_all_wakes_everyone() {
        let acks = Arc::new(AckCoordinator::new());
        let handles: Vec<_> = [MessageKind::Command, MessageKind::Control, MessageKind::Command]
            .into_iter()
            .map(|kind| {
                let acks = Arc::clone(&acks);
                thread::spawn(move || {
                    let ticket = acks.register(Expectation::Ack(kind));
                    ticket.wait(Duration::from_secs(5))
                })
            })
            .collect();

        let deadline = Instant::now() + Duration::from_secs(2);
        while acks.len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        acks.cancel_all();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), WaitOutcome::Cancelled);
        }
        assert!(acks.is_empty());
    }
}
