// SPDX-License-Identifier: BSD-3-Clause
// Copyright Beamline Project Authors

//! Shared-state collaborator boundary.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

/// Key/value backend used for configuration broadcast.
///
/// Every operation returns `None` when the connection to the backend is
/// down; callers treat that as "no change" and keep their cached values.
/// `hget` also returns `None` for a missing field, which callers handle the
/// same way.
pub trait SharedState: Send + Sync {
    /// Set one field. Returns 1 when the field was created, 0 on overwrite.
    fn hset(&self, name: &str, key: &str, value: &str) -> Option<i64>;

    fn hget(&self, name: &str, key: &str) -> Option<String>;

    /// Batched [`SharedState::hget`] over several fields of one hash.
    fn hmget(&self, name: &str, keys: &[&str]) -> Option<Vec<Option<String>>>;

    /// All fields of a hash; a missing hash is an empty map.
    fn hget_all(&self, name: &str) -> Option<HashMap<String, String>>;

    /// All fields of several hashes in one round trip.
    fn hget_all_multi(&self, names: &[&str]) -> Option<Vec<HashMap<String, String>>>;

    fn hdel(&self, name: &str, keys: &[&str]) -> Option<i64>;

    /// Increment an integer field, creating it at 0 first if absent.
    fn hincrease_by(&self, name: &str, key: &str, amount: i64) -> Option<i64>;

    /// Increment a float field, creating it at 0 first if absent.
    fn hincrease_by_float(&self, name: &str, key: &str, amount: f64) -> Option<f64>;

    /// Publish a message; returns the number of receivers.
    fn publish(&self, chan: &str, message: &str) -> Option<usize>;

    /// Subscribe to a channel. Messages published after the call are
    /// delivered in order.
    fn subscribe(&self, chan: &str) -> Option<Receiver<String>>;
}

/// In-process backend for tests and standalone runs.
#[derive(Default)]
pub struct MemoryStore {
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
    subscribers: RwLock<HashMap<String, Vec<Sender<String>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SharedState for MemoryStore {
    fn hset(&self, name: &str, key: &str, value: &str) -> Option<i64> {
        let mut hashes = self.hashes.write();
        let created = hashes
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string())
            .is_none();
        trace!(name, key, value, "hset");
        Some(i64::from(created))
    }

    fn hget(&self, name: &str, key: &str) -> Option<String> {
        self.hashes.read().get(name)?.get(key).cloned()
    }

    fn hmget(&self, name: &str, keys: &[&str]) -> Option<Vec<Option<String>>> {
        let hashes = self.hashes.read();
        let hash = hashes.get(name);
        Some(
            keys.iter()
                .map(|k| hash.and_then(|h| h.get(*k).cloned()))
                .collect(),
        )
    }

    fn hget_all(&self, name: &str) -> Option<HashMap<String, String>> {
        Some(self.hashes.read().get(name).cloned().unwrap_or_default())
    }

    fn hget_all_multi(&self, names: &[&str]) -> Option<Vec<HashMap<String, String>>> {
        let hashes = self.hashes.read();
        Some(
            names
                .iter()
                .map(|n| hashes.get(*n).cloned().unwrap_or_default())
                .collect(),
        )
    }

    fn hdel(&self, name: &str, keys: &[&str]) -> Option<i64> {
        let mut hashes = self.hashes.write();
        let Some(hash) = hashes.get_mut(name) else {
            return Some(0);
        };
        let mut removed = 0;
        for key in keys {
            if hash.remove(*key).is_some() {
                removed += 1;
            }
        }
        Some(removed)
    }

    fn hincrease_by(&self, name: &str, key: &str, amount: i64) -> Option<i64> {
        let mut hashes = self.hashes.write();
        let entry = hashes
            .entry(name.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().ok()? + amount;
        *entry = next.to_string();
        Some(next)
    }

    fn hincrease_by_float(&self, name: &str, key: &str, amount: f64) -> Option<f64> {
        let mut hashes = self.hashes.write();
        let entry = hashes
            .entry(name.to_string())
            .or_default()
            .entry(key.to_string())
            .or_insert_with(|| "0".to_string());
        let next = entry.parse::<f64>().ok()? + amount;
        *entry = next.to_string();
        Some(next)
    }

    fn publish(&self, chan: &str, message: &str) -> Option<usize> {
        let mut subscribers = self.subscribers.write();
        let Some(senders) = subscribers.get_mut(chan) else {
            return Some(0);
        };
        // drop disconnected subscribers as we go
        senders.retain(|tx| tx.send(message.to_string()).is_ok());
        Some(senders.len())
    }

    fn subscribe(&self, chan: &str) -> Option<Receiver<String>> {
        let (tx, rx) = unbounded();
        self.subscribers
            .write()
            .entry(chan.to_string())
            .or_default()
            .push(tx);
        Some(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hset_reports_create_vs_overwrite() {
        let store = MemoryStore::new();
        assert_eq!(store.hset("h", "k", "1"), Some(1));
        assert_eq!(store.hset("h", "k", "2"), Some(0));
        assert_eq!(store.hget("h", "k").as_deref(), Some("2"));
    }

    #[test]
    fn missing_hash_reads_as_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.hget("nope", "k"), None);
        assert_eq!(store.hget_all("nope"), Some(HashMap::new()));
        assert_eq!(store.hmget("nope", &["a", "b"]), Some(vec![None, None]));
    }

    #[test]
    fn increments_create_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.hincrease_by("h", "n", 3), Some(3));
        assert_eq!(store.hincrease_by("h", "n", -1), Some(2));
        assert_eq!(store.hincrease_by_float("h", "x", 0.5), Some(0.5));
    }

    #[test]
    fn pubsub_delivers_in_order() {
        let store = MemoryStore::new();
        let rx = store.subscribe("c").unwrap();
        assert_eq!(store.publish("c", "a"), Some(1));
        assert_eq!(store.publish("c", "b"), Some(1));
        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
    }
}
