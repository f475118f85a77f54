//! Bounded-fanout epidemic dissemination: message-id derivation,
//! a sliding dedup window, TTL bookkeeping, and random fanout peer
//! selection.
//!
//! A small struct tracking per-id state with an explicit record/prune
//! cycle, the same shape as the dedup/eviction state elsewhere in this
//! crate, and uses `rand` for peer sampling.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use srishti_core::{NodeId, Timestamp};

const DEDUP_WINDOW_MS: u64 = srishti_core::constants::GOSSIP_DEDUP_WINDOW_MS;

/// Message-id for a freshly-proposed block (`"block_" ||
/// blockHash`).
pub fn block_message_id(block_hash: &str) -> String {
    format!("block_{block_hash}")
}

/// Message-id for any other gossiped message: `type || timestamp ||
/// prefix(serialised, 50)`.
pub fn generic_message_id(message_type: &str, timestamp: Timestamp, serialized: &str) -> String {
    let prefix: String = serialized.chars().take(50).collect();
    format!("{message_type}{timestamp}{prefix}")
}

/// `true` if a message with this TTL should be forwarded after being applied
/// locally; `false` at the TTL floor (applied, not re-forwarded).
pub fn should_reforward(ttl: u8) -> bool {
    ttl > 0
}

/// Decrement a hop counter, floored at zero.
pub fn decrement_ttl(ttl: u8) -> u8 {
    ttl.saturating_sub(1)
}

/// Sliding window of message ids this node has already seen, for duplicate
/// suppression. Entries older than [`DEDUP_WINDOW_MS`] are pruned lazily on
/// each call.
#[derive(Default)]
pub struct GossipDedup {
    seen: VecDeque<(String, u64)>,
}

impl GossipDedup {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(&mut self, now_ms: u64) {
        while let Some(&(_, ts)) = self.seen.front() {
            if now_ms.saturating_sub(ts) > DEDUP_WINDOW_MS {
                self.seen.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record `message_id` as seen at `now_ms`. Returns `true` if this is the
    /// first sighting within the dedup window (message should be processed);
    /// `false` if it is a duplicate (drop silently, per ).
    pub fn observe(&mut self, message_id: &str, now_ms: u64) -> bool {
        self.prune(now_ms);
        if self.seen.iter().any(|(id, _)| id == message_id) {
            return false;
        }
        self.seen.push_back((message_id.to_string(), now_ms));
        true
    }
}

/// Select up to `min(GOSSIP_FANOUT, available peers)` peers to forward a
/// message to, excluding `exclude_sender`, chosen uniformly at random.
pub fn select_fanout_peers<'a>(peers: &'a [NodeId], exclude_sender: &NodeId) -> Vec<&'a NodeId> {
    let fanout = srishti_core::constants::GOSSIP_FANOUT;
    let mut candidates: Vec<&NodeId> = peers.iter().filter(|p| *p != exclude_sender).collect();
    let mut rng = rand::thread_rng();
    candidates.shuffle(&mut rng);
    candidates.truncate(fanout);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::parse(format!("node_{:016x}", n)).unwrap()
    }

    #[test]
    fn block_message_id_is_prefixed() {
        assert_eq!(block_message_id("abcd"), "block_abcd");
    }

    #[test]
    fn generic_message_id_truncates_to_fifty_chars() {
        let long = "x".repeat(200);
        let id = generic_message_id("HEARTBEAT", 10, &long);
        assert_eq!(id, format!("HEARTBEAT10{}", "x".repeat(50)));
    }

    #[test]
    fn duplicate_within_window_is_dropped() {
        let mut dedup = GossipDedup::new();
        assert!(dedup.observe("id1", 0));
        assert!(!dedup.observe("id1", 1_000));
    }

    #[test]
    fn duplicate_after_window_expiry_is_fresh() {
        let mut dedup = GossipDedup::new();
        assert!(dedup.observe("id1", 0));
        assert!(dedup.observe("id1", DEDUP_WINDOW_MS + 1));
    }

    #[test]
    fn ttl_floor_stops_reforwarding() {
        let mut ttl = srishti_core::constants::GOSSIP_TTL;
        while should_reforward(ttl) {
            ttl = decrement_ttl(ttl);
        }
        assert_eq!(ttl, 0);
    }

    #[test]
    fn fanout_excludes_sender_and_caps_at_limit() {
        let peers: Vec<NodeId> = (0..10).map(node).collect();
        let sender = peers[0].clone();
        let chosen = select_fanout_peers(&peers, &sender);
        assert_eq!(chosen.len(), srishti_core::constants::GOSSIP_FANOUT);
        assert!(!chosen.iter().any(|p| **p == sender));
    }

    #[test]
    fn fanout_shrinks_when_fewer_peers_available() {
        let peers: Vec<NodeId> = (0..2).map(node).collect();
        let sender = peers[0].clone();
        let chosen = select_fanout_peers(&peers, &sender);
        assert_eq!(chosen.len(), 1);
    }
}
