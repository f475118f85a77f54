//! Ties per-peer connection state, presence, gossip dedup, rate limiting
//! and sync guarding into the one piece of mutable peer bookkeeping a node
//! needs. `srishti-node`'s event loop owns one
//! `PeerManager` and calls into it for every inbound/outbound peer event;
//! this struct never touches `ChainManager` or `WorldState` directly,
//! keeping the chain and state pair as the only piece of mutable state
//! guarded by a lock.
//!
//! A single registry aggregating several per-peer concerns behind one API,
//! rather than five separately-owned maps, covering the five peer-facing
//! concerns this protocol needs.

use std::collections::HashMap;
use std::time::Instant;

use srishti_consensus::{ConnectionId, GossipDedup, MessageKind, RateLimiter};
use srishti_core::NodeId;

use crate::connection::{on_hello_received, ConnectionState, PeerConnection};
use crate::presence::PresenceTable;
use crate::sync::SyncGuard;

pub struct PeerManager {
    local_chain_epoch: u64,
    connections: HashMap<NodeId, PeerConnection>,
    connection_ids: HashMap<NodeId, ConnectionId>,
    next_connection_id: ConnectionId,
    presence: PresenceTable,
    dedup: GossipDedup,
    rate_limiter: RateLimiter,
    sync_guard: SyncGuard,
}

impl PeerManager {
    pub fn new(local_chain_epoch: u64) -> Self {
        Self {
            local_chain_epoch,
            connections: HashMap::new(),
            connection_ids: HashMap::new(),
            next_connection_id: 0,
            presence: PresenceTable::new(),
            dedup: GossipDedup::new(),
            rate_limiter: RateLimiter::new(),
            sync_guard: SyncGuard::new(),
        }
    }

    /// Begin tracking a peer discovered via the relay's peer-joined event,
    /// assigning it a fresh connection id and moving it to `CONNECTING`.
    pub fn on_peer_joined(&mut self, node_id: NodeId) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        self.connection_ids.insert(node_id.clone(), id);
        let mut conn = PeerConnection::new(node_id.clone());
        conn.transition(ConnectionState::Connecting);
        self.connections.insert(node_id, conn);
        id
    }

    /// Stop tracking a peer that left the relay (`onPeerChange`
    /// with `left`). Connection bookkeeping is dropped; presence and rate
    /// limit history are left intact so a quick reconnect isn't treated as
    /// a fresh, unthrottled peer.
    pub fn on_peer_left(&mut self, node_id: &NodeId) {
        self.connections.remove(node_id);
        self.connection_ids.remove(node_id);
    }

    /// Apply a received `HELLO`: move to `HELLO_SENT` then
    /// `COMPATIBLE`/`REJECTED` depending on chain-epoch agreement, and
    /// record the peer's advertised tip.
    pub fn on_hello(
        &mut self,
        node_id: &NodeId,
        remote_chain_epoch: u64,
        chain_length: u64,
        latest_hash: String,
    ) -> ConnectionState {
        let next = on_hello_received(self.local_chain_epoch, remote_chain_epoch);
        let conn = self
            .connections
            .entry(node_id.clone())
            .or_insert_with(|| PeerConnection::new(node_id.clone()));
        if conn.state == ConnectionState::Connecting {
            conn.transition(ConnectionState::HelloSent);
        }
        conn.transition(next);
        conn.record_hello(chain_length, latest_hash, remote_chain_epoch);
        conn.state
    }

    /// Node ids currently in `COMPATIBLE` state — the set eligible for
    /// gossip fanout and sync requests.
    pub fn compatible_peers(&self) -> Vec<NodeId> {
        self.connections
            .values()
            .filter(|c| c.state == ConnectionState::Compatible)
            .map(|c| c.node_id.clone())
            .collect()
    }

    pub fn peer_state(&self, node_id: &NodeId) -> Option<ConnectionState> {
        self.connections.get(node_id).map(|c| c.state)
    }

    pub fn connection_id(&self, node_id: &NodeId) -> Option<ConnectionId> {
        self.connection_ids.get(node_id).copied()
    }

    /// A compatible peer's last-advertised `(chain_length, latest_hash)`
    /// from its most recent `HELLO` (resync-tick re-evaluation).
    pub fn advertised_tip(&self, node_id: &NodeId) -> Option<(u64, &str)> {
        let conn = self.connections.get(node_id)?;
        if conn.state != ConnectionState::Compatible {
            return None;
        }
        Some((conn.advertised_chain_length, conn.advertised_latest_hash.as_str()))
    }

    /// Admit or drop an inbound message for rate limiting.
    pub fn admit(
        &mut self,
        node_id: &NodeId,
        kind: MessageKind,
        node_age_ms: Option<u64>,
        now_ms: u64,
    ) -> bool {
        let connection_id = self.connection_ids.get(node_id).copied().unwrap_or(u64::MAX);
        self.rate_limiter
            .admit(node_id, connection_id, kind, node_age_ms, now_ms)
    }

    /// First-sighting check for gossip dedup.
    pub fn observe_gossip(&mut self, message_id: &str, now_ms: u64) -> bool {
        self.dedup.observe(message_id, now_ms)
    }

    pub fn record_direct_heartbeat(&mut self, node_id: NodeId, is_online: bool, now_ms: u64) {
        self.presence.record_direct(node_id, is_online, now_ms);
    }

    pub fn record_piggybacked_presence(&mut self, node_id: NodeId, is_online: bool, now_ms: u64) {
        self.presence.record_piggybacked(node_id, is_online, now_ms);
    }

    pub fn known_online(&self) -> Vec<NodeId> {
        self.presence.known_online()
    }

    pub fn sync_guard_mut(&mut self) -> &mut SyncGuard {
        &mut self.sync_guard
    }

    pub fn dropped_message_count(&self) -> u64 {
        self.rate_limiter.dropped_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::parse(format!("node_{:016x}", n)).unwrap()
    }

    #[test]
    fn hello_with_matching_epoch_becomes_compatible() {
        let mut mgr = PeerManager::new(1);
        mgr.on_peer_joined(node(1));
        let state = mgr.on_hello(&node(1), 1, 5, "hash5".into());
        assert_eq!(state, ConnectionState::Compatible);
        assert_eq!(mgr.compatible_peers(), vec![node(1)]);
    }

    #[test]
    fn hello_with_mismatched_epoch_is_rejected() {
        let mut mgr = PeerManager::new(1);
        mgr.on_peer_joined(node(1));
        let state = mgr.on_hello(&node(1), 2, 5, "hash5".into());
        assert_eq!(state, ConnectionState::Rejected);
        assert!(mgr.compatible_peers().is_empty());
    }

    #[test]
    fn peer_leaving_drops_connection_state() {
        let mut mgr = PeerManager::new(1);
        mgr.on_peer_joined(node(1));
        mgr.on_hello(&node(1), 1, 5, "hash5".into());
        mgr.on_peer_left(&node(1));
        assert!(mgr.peer_state(&node(1)).is_none());
    }

    #[test]
    fn rate_limiting_is_keyed_per_connection() {
        let mut mgr = PeerManager::new(1);
        mgr.on_peer_joined(node(1));
        for i in 0..20 {
            assert!(mgr.admit(&node(1), MessageKind::Sync, None, i * 10));
        }
        assert!(!mgr.admit(&node(1), MessageKind::Sync, None, 200));
    }
}
