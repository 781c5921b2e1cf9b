use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use codrone_frame::MessageKind;

use crate::message::{
    Altitude, Attitude, Count, ErrorReport, Flow, Message, Motion, Position, Range, Rssi, State,
    Trim,
};

/// Latest message of one kind and when it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub message: Message,
    pub received_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    latest: HashMap<MessageKind, StatusEntry>,
    counts: BTreeMap<MessageKind, u64>,
}

/// Most recent telemetry per message kind, shared between the reader thread
/// and callers.
#[derive(Debug, Default)]
pub struct StatusStore {
    inner: RwLock<Inner>,
}

macro_rules! typed_getters {
    ($( $(#[$meta:meta])* $name:ident => $variant:ident($ty:ty), )+) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> Option<$ty> {
                match self.get(<$ty as crate::message::Payload>::KIND)? {
                    Message::$variant(value) => Some(value),
                    _ => None,
                }
            }
        )+
    };
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message` as the latest of its kind.
    pub fn update(&self, message: Message) {
        self.update_at(message, Instant::now());
    }

    pub fn update_at(&self, message: Message, received_at: Instant) {
        let kind = message.kind();
        let mut inner = self.write();
        *inner.counts.entry(kind).or_insert(0) += 1;
        inner.latest.insert(
            kind,
            StatusEntry {
                message,
                received_at,
            },
        );
    }

    /// Latest message of `kind`.
    pub fn get(&self, kind: MessageKind) -> Option<Message> {
        self.read()
            .latest
            .get(&kind)
            .map(|entry| entry.message.clone())
    }

    /// Latest message of `kind` with its arrival time.
    pub fn entry(&self, kind: MessageKind) -> Option<StatusEntry> {
        self.read().latest.get(&kind).cloned()
    }

    /// How long ago the latest message of `kind` arrived.
    pub fn age(&self, kind: MessageKind) -> Option<Duration> {
        self.read()
            .latest
            .get(&kind)
            .map(|entry| entry.received_at.elapsed())
    }

    typed_getters! {
        state => State(State),
        attitude => Attitude(Attitude),
        position => Position(Position),
        altitude => Altitude(Altitude),
        motion => Motion(Motion),
        range => Range(Range),
        flow => Flow(Flow),
        trim => Trim(Trim),
        count => Count(Count),
        rssi => Rssi(Rssi),
        /// Latest error report.
        last_error => Error(ErrorReport),
    }

    /// Frames received per kind since creation or the last [`clear`](Self::clear).
    pub fn counters(&self) -> BTreeMap<MessageKind, u64> {
        self.read().counts.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.latest.clear();
        inner.counts.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn keeps_latest_per_kind() {
        let store = StatusStore::new();
        store.update(Message::from(Attitude {
            roll: 1,
            pitch: 2,
            yaw: 3,
        }));
        store.update(Message::from(Attitude {
            roll: 4,
            pitch: 5,
            yaw: 6,
        }));
        store.update(Message::from(State {
            battery: 70,
            ..State::default()
        }));

        assert_eq!(store.attitude().unwrap().roll, 4);
        assert_eq!(store.state().unwrap().battery, 70);
        assert!(store.position().is_none());

        let counters = store.counters();
        assert_eq!(counters[&MessageKind::Attitude], 2);
        assert_eq!(counters[&MessageKind::State], 1);
    }

    #[test]
    fn opaque_entry_does_not_satisfy_typed_getter() {
        let store = StatusStore::new();
        store.update(Message::raw(MessageKind::Altitude, Bytes::from_static(&[1, 2])));

        assert!(store.get(MessageKind::Altitude).is_some());
        assert!(store.altitude().is_none());
    }

    #[test]
    fn age_tracks_arrival() {
        let store = StatusStore::new();
        let earlier = Instant::now() - Duration::from_millis(500);
        store.update_at(Message::from(Rssi { rssi: -70 }), earlier);

        assert!(store.age(MessageKind::Rssi).unwrap() >= Duration::from_millis(500));
        assert_eq!(store.entry(MessageKind::Rssi).unwrap().received_at, earlier);
        assert!(store.age(MessageKind::Trim).is_none());
    }

    #[test]
    fn clear_empties_everything() {
        let store = StatusStore::new();
        store.update(Message::from(ErrorReport {
            system_time: 1,
            sensor_flags: 0x4,
            state_flags: 0,
        }));
        assert!(!store.last_error().unwrap().is_clear());

        store.clear();
        assert!(store.last_error().is_none());
        assert!(store.counters().is_empty());
    }
}
