//! Thread-safe registry of live publisher and observer connections.
//!
//! One reader/writer lock guards both device-id-keyed maps. The lock
//! protects map structure only: callers copy handles out before doing any
//! I/O, so a stalled socket can never hold up registration or another
//! device's fan-out.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::connection::Sender;

/// Role of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Observer,
}

/// Identifies one registered connection within its device-id set.
pub type ConnId = uuid::Uuid;

struct Entry {
    /// Registration order, used to keep fan-out copies stably ordered.
    seq: u64,
    sender: Sender,
}

type DeviceMap = BTreeMap<String, HashMap<ConnId, Entry>>;

#[derive(Default)]
struct Maps {
    publishers: DeviceMap,
    observers: DeviceMap,
    next_seq: u64,
}

impl Maps {
    fn map_for(&mut self, role: Role) -> &mut DeviceMap {
        match role {
            Role::Publisher => &mut self.publishers,
            Role::Observer => &mut self.observers,
        }
    }
}

/// Registry of live connections, keyed by device id and role.
///
/// Invariant: a device id is present in a map iff its connection set is
/// non-empty. "Known device" therefore means "key present in the
/// publisher map".
pub struct Registry {
    maps: RwLock<Maps>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
        }
    }

    // A connection task that panicked mid-mutation poisons the lock; the
    // maps themselves stay structurally valid, so recover the guard.
    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a connection to the set for `(device_id, role)`. Never fails;
    /// a device id accumulates connections without a cap.
    pub fn register(&self, device_id: &str, role: Role, conn_id: ConnId, sender: Sender) {
        let mut maps = self.write();
        let seq = maps.next_seq;
        maps.next_seq += 1;
        maps.map_for(role)
            .entry(device_id.to_string())
            .or_default()
            .insert(conn_id, Entry { seq, sender });
    }

    /// Removes a connection from its set, deleting the device-id key when
    /// the set empties. Idempotent.
    pub fn unregister(&self, device_id: &str, role: Role, conn_id: ConnId) {
        let mut maps = self.write();
        let map = maps.map_for(role);
        if let Some(set) = map.get_mut(device_id) {
            set.remove(&conn_id);
            if set.is_empty() {
                map.remove(device_id);
            }
        }
    }

    /// Returns `true` iff `device_id` has at least one registered
    /// publisher. Gates observer admission.
    pub fn is_known(&self, device_id: &str) -> bool {
        self.read().publishers.contains_key(device_id)
    }

    /// Sorted snapshot of all device ids with at least one publisher.
    pub fn known_device_ids(&self) -> Vec<String> {
        self.read().publishers.keys().cloned().collect()
    }

    /// Copy of the observer handles for `device_id` at call time, ordered
    /// by registration. Never exposes the live set.
    pub fn observers_of(&self, device_id: &str) -> Vec<Sender> {
        let maps = self.read();
        let Some(set) = maps.observers.get(device_id) else {
            return Vec::new();
        };
        let mut entries: Vec<&Entry> = set.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.sender.clone()).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
