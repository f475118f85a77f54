//! Sliding-window rate limiting: one token-bucket-style window
//! per `(nodeId, messageKind)`, plus a second window per connection id so a
//! peer can't dodge the per-node limit by rotating its advertised node id
//! over the same transport connection.
//!
//! A `HashMap`-keyed registry per window, the same shape used elsewhere in
//! this crate for per-peer state, generalised into a family of windows.

use std::collections::HashMap;
use std::collections::VecDeque;

use srishti_core::NodeId;

use crate::ConnectionId;

const WINDOW_MS: u64 = 60_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Block,
    Sync,
    Heartbeat,
}

impl MessageKind {
    /// Messages accepted per minute from a single sender for this kind.
    /// `node_age_ms` thins `BLOCK` down to the new-node rate: new nodes
    /// (<1h old) are capped at 1/min.
    fn limit(self, node_age_ms: Option<u64>) -> u32 {
        match self {
            MessageKind::Block => {
                let base = srishti_core::constants::RATE_LIMIT_BLOCKS_PER_MINUTE;
                match node_age_ms {
                    Some(age) if age < 3_600_000 => {
                        ((base as f64) * srishti_core::constants::RATE_LIMIT_NEW_NODE_MULTIPLIER)
                            .max(1.0) as u32
                    }
                    _ => base,
                }
            }
            MessageKind::Sync => srishti_core::constants::RATE_LIMIT_SYNC_PER_MINUTE,
            MessageKind::Heartbeat => srishti_core::constants::RATE_LIMIT_HEARTBEAT_PER_MINUTE,
        }
    }
}

/// A single sliding window of hit timestamps (milliseconds).
#[derive(Default)]
struct Window {
    hits: VecDeque<u64>,
}

impl Window {
    fn prune(&mut self, now_ms: u64) {
        while let Some(&oldest) = self.hits.front() {
            if now_ms.saturating_sub(oldest) > WINDOW_MS {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// `true` and records the hit if under `limit`; `false` (no record) if at
    /// or over `limit`.
    fn try_admit(&mut self, now_ms: u64, limit: u32) -> bool {
        self.prune(now_ms);
        if self.hits.len() >= limit as usize {
            return false;
        }
        self.hits.push_back(now_ms);
        true
    }
}

/// Tracks both the per-`(nodeId, messageKind)` windows and the per-connection
/// windows, and counts how many messages each has dropped.
#[derive(Default)]
pub struct RateLimiter {
    by_node: HashMap<(NodeId, MessageKind), Window>,
    by_connection: HashMap<(ConnectionId, MessageKind), Window>,
    dropped: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or drop a message. Returns `true` if both the node-keyed and
    /// connection-keyed windows have capacity (and records the hit in both);
    /// `false` if either is exhausted, in which case neither window is
    /// charged and `dropped_count` is incremented.
    pub fn admit(
        &mut self,
        node_id: &NodeId,
        connection_id: ConnectionId,
        kind: MessageKind,
        node_age_ms: Option<u64>,
        now_ms: u64,
    ) -> bool {
        let limit = kind.limit(node_age_ms);

        let node_window = self.by_node.entry((node_id.clone(), kind)).or_default();
        node_window.prune(now_ms);
        let node_has_room = node_window.hits.len() < limit as usize;

        let connection_window = self.by_connection.entry((connection_id, kind)).or_default();
        connection_window.prune(now_ms);
        let connection_has_room = connection_window.hits.len() < limit as usize;

        if !node_has_room || !connection_has_room {
            self.dropped += 1;
            tracing::debug!(
                node_id = %node_id,
                connection_id,
                ?kind,
                "rate limit: window exhausted"
            );
            return false;
        }

        self.by_node
            .get_mut(&(node_id.clone(), kind))
            .expect("just inserted above")
            .hits
            .push_back(now_ms);
        self.by_connection
            .get_mut(&(connection_id, kind))
            .expect("just inserted above")
            .hits
            .push_back(now_ms);
        true
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeId {
        NodeId::parse("node_aaaaaaaaaaaaaaaa").unwrap()
    }

    #[test]
    fn admits_up_to_limit_then_drops() {
        let mut rl = RateLimiter::new();
        for i in 0..20 {
            assert!(rl.admit(&node(), 1, MessageKind::Sync, None, i * 100));
        }
        assert!(!rl.admit(&node(), 1, MessageKind::Sync, None, 2_000));
        assert_eq!(rl.dropped_count(), 1);
    }

    #[test]
    fn window_slides_after_60_seconds() {
        let mut rl = RateLimiter::new();
        for i in 0..10 {
            assert!(rl.admit(&node(), 1, MessageKind::Block, None, i));
        }
        assert!(!rl.admit(&node(), 1, MessageKind::Block, None, 10));
        assert!(rl.admit(&node(), 1, MessageKind::Block, None, 61_000));
    }

    #[test]
    fn new_node_gets_throttled_block_rate() {
        let mut rl = RateLimiter::new();
        assert!(rl.admit(&node(), 1, MessageKind::Block, Some(1_000), 0));
        assert!(!rl.admit(&node(), 1, MessageKind::Block, Some(1_000), 100));
    }

    #[test]
    fn connection_window_limits_regardless_of_rotating_node_id() {
        let mut rl = RateLimiter::new();
        for i in 0..20 {
            let rotating = NodeId::parse(format!("node_{:016x}", i)).unwrap();
            let now = i * 100;
            let admitted = rl.admit(&rotating, 9, MessageKind::Sync, None, now);
            if i < 20 {
                assert!(admitted, "connection window should admit up to the shared limit");
            }
        }
        let overflow = NodeId::parse("node_ffffffffffffffff").unwrap();
        assert!(!rl.admit(&overflow, 9, MessageKind::Sync, None, 2_000));
    }
}
