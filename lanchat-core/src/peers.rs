//! Peer liveness table.
//!
//! Written by the receive loop, read by whoever calls `list_active`. One
//! mutex guards the whole map and is held only for the duration of a single
//! operation, so an eviction pass never races a concurrent upsert.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A remote participant known through a recent announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub username: String,
    /// Source address of the most recent announcement.
    pub address: SocketAddr,
    /// Set once on first sighting; never moves afterwards.
    pub first_seen: Instant,
    /// Moves forward on every accepted announcement.
    pub last_seen: Instant,
}

/// Username-keyed liveness table with lazy, read-coupled eviction.
#[derive(Debug, Default)]
pub struct PeerTable {
    inner: Mutex<HashMap<String, Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an announcement. A first sighting fixes `first_seen`; later
    /// sightings update `address` and `last_seen` only.
    pub fn upsert(&self, username: &str, address: SocketAddr, now: Instant) {
        let mut peers = self.lock();
        match peers.get_mut(username) {
            Some(peer) => {
                peer.address = address;
                peer.last_seen = now;
            }
            None => {
                peers.insert(
                    username.to_string(),
                    Peer {
                        username: username.to_string(),
                        address,
                        first_seen: now,
                        last_seen: now,
                    },
                );
            }
        }
    }

    /// Look up a peer regardless of liveness.
    pub fn get(&self, username: &str) -> Option<Peer> {
        self.lock().get(username).cloned()
    }

    /// Peers seen within `timeout`, sorted by username. Anything older is
    /// removed for good as a side effect; this call is the table's only
    /// garbage collection.
    pub fn list_active(&self, now: Instant, timeout: Duration) -> Vec<Peer> {
        let mut peers = self.lock();
        peers.retain(|_, peer| now.saturating_duration_since(peer.last_seen) <= timeout);
        let mut active: Vec<Peer> = peers.values().cloned().collect();
        active.sort_by(|a, b| a.username.cmp(&b.username));
        active
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Peer>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
