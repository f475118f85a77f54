//! Sync orchestration: deciding what to do with an incoming
//! `HELLO`/`SYNC_REQUEST`/`SYNC_RESPONSE`/`NEW_BLOCK`, and guarding against
//! overlapping sync attempts with a single peer.
//!
//! This module is a set of pure decision functions (mirroring
//! `fork_choice::compare`'s style: no I/O, just "given these inputs, what
//! should the caller do") plus a small stateful guard, so the actual
//! socket/channel plumbing in `srishti-node` stays a thin dispatch loop
//! around these decisions.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use srishti_chain::Block;
use srishti_core::{BlockIndex, NodeId};

use crate::message::PeerMessage;

/// What a freshly-received `HELLO` (or an unsolicited length/hash mismatch
/// noticed via `HEARTBEAT` piggybacking) tells us to do next: if the peer's
/// advertised chain is longer, request a sync; if shorter, do nothing — the
/// peer will request from us; if equal length but a different hash, the two
/// chains have diverged and a full sync is requested regardless.
#[derive(Debug, PartialEq, Eq)]
pub enum SyncDecision {
    /// Peer's chain is no ahead of ours and not diverged; nothing to do.
    NoAction,
    /// Request blocks starting at `from_index` from this peer.
    RequestSync { from_index: BlockIndex },
}

/// Compare our chain against a peer's advertised `(chain_length,
/// latest_hash)` and decide whether to request a sync.
pub fn decide_on_peer_advertisement(
    our_length: BlockIndex,
    our_latest_hash: Option<&str>,
    peer_length: BlockIndex,
    peer_latest_hash: &str,
) -> SyncDecision {
    if peer_length > our_length {
        return SyncDecision::RequestSync { from_index: our_length };
    }
    if peer_length == our_length && our_length > 0 {
        if our_latest_hash != Some(peer_latest_hash) {
            // Same length, different tip: diverged forks. Re-sync from
            // genesis so `replace_chain`'s fork-choice can arbitrate.
            return SyncDecision::RequestSync { from_index: 0 };
        }
    }
    SyncDecision::NoAction
}

/// How a `SYNC_RESPONSE` payload should be applied once it arrives: a
/// response starting at index 0 is a candidate whole-chain replacement;
/// anything else is an incremental append attempt against our current tip.
pub enum SyncApplication {
    /// Candidate replacement chain; hand to `ChainManager::replace_chain`.
    Replace(Vec<Block>),
    /// Incremental blocks to append one at a time via
    /// `ChainManager::add_block`.
    Append(Vec<Block>),
}

pub fn classify_sync_response(blocks: Vec<Block>) -> Option<SyncApplication> {
    let first = blocks.first()?;
    if first.index == 0 {
        Some(SyncApplication::Replace(blocks))
    } else {
        Some(SyncApplication::Append(blocks))
    }
}

/// Outcome of receiving a gossiped `NEW_BLOCK`: apply it
/// directly if it extends our tip; if it is ahead of our tip, it implies we
/// are behind and should sync instead of trying (and failing) to apply it
/// out of order; if it is behind or equal to our current length, it is
/// stale and ignored.
#[derive(Debug, PartialEq, Eq)]
pub enum NewBlockDecision {
    Apply,
    TriggerSync { from_index: BlockIndex },
    Stale,
}

pub fn decide_on_new_block(our_length: BlockIndex, incoming_index: BlockIndex) -> NewBlockDecision {
    if incoming_index == our_length {
        NewBlockDecision::Apply
    } else if incoming_index > our_length {
        NewBlockDecision::TriggerSync { from_index: our_length }
    } else {
        NewBlockDecision::Stale
    }
}

/// Guards against issuing a second `SYNC_REQUEST` to a peer while one is
/// already outstanding, and times out a request that never gets a response
/// (sync timeout; the constant matches
/// `srishti_core::constants::SYNC_OVERALL_TIMEOUT_MS`).
pub struct SyncGuard {
    timeout: Duration,
    pending: HashMap<NodeId, Instant>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(srishti_core::constants::SYNC_OVERALL_TIMEOUT_MS),
            pending: HashMap::new(),
        }
    }

    /// `true` if a `SYNC_REQUEST` may be sent to `peer` right now (none
    /// outstanding, or the prior one timed out). Marks one as outstanding as
    /// a side effect when it returns `true`.
    pub fn try_begin(&mut self, peer: &NodeId, now: Instant) -> bool {
        if let Some(&started) = self.pending.get(peer) {
            if now.duration_since(started) < self.timeout {
                return false;
            }
        }
        self.pending.insert(peer.clone(), now);
        true
    }

    /// Clear the outstanding marker once a `SYNC_RESPONSE` (or an error)
    /// resolves the request, so the peer is immediately eligible for a new
    /// sync attempt if needed.
    pub fn complete(&mut self, peer: &NodeId) {
        self.pending.remove(peer);
    }

    pub fn is_pending(&self, peer: &NodeId) -> bool {
        self.pending.contains_key(peer)
    }
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `SYNC_REQUEST` message for `from_index` against our current
/// tip, per wire shape.
pub fn build_sync_request(
    now: srishti_core::Timestamp,
    from_index: BlockIndex,
    our_length: BlockIndex,
    our_latest_hash: &str,
) -> PeerMessage {
    PeerMessage::SyncRequest {
        timestamp: now,
        from_index,
        chain_length: our_length,
        latest_hash: our_latest_hash.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::parse(format!("node_{:016x}", n)).unwrap()
    }

    #[test]
    fn longer_peer_triggers_sync_from_our_tip() {
        let decision = decide_on_peer_advertisement(3, Some("h3"), 7, "h7");
        assert_eq!(decision, SyncDecision::RequestSync { from_index: 3 });
    }

    #[test]
    fn shorter_peer_is_no_action() {
        let decision = decide_on_peer_advertisement(7, Some("h7"), 3, "h3");
        assert_eq!(decision, SyncDecision::NoAction);
    }

    #[test]
    fn equal_length_diverged_hash_resyncs_from_genesis() {
        let decision = decide_on_peer_advertisement(5, Some("ours"), 5, "theirs");
        assert_eq!(decision, SyncDecision::RequestSync { from_index: 0 });
    }

    #[test]
    fn equal_length_matching_hash_is_no_action() {
        let decision = decide_on_peer_advertisement(5, Some("same"), 5, "same");
        assert_eq!(decision, SyncDecision::NoAction);
    }

    #[test]
    fn new_block_extending_tip_applies_directly() {
        assert_eq!(decide_on_new_block(4, 4), NewBlockDecision::Apply);
    }

    #[test]
    fn new_block_ahead_of_tip_triggers_sync() {
        assert_eq!(
            decide_on_new_block(4, 9),
            NewBlockDecision::TriggerSync { from_index: 4 }
        );
    }

    #[test]
    fn new_block_behind_tip_is_stale() {
        assert_eq!(decide_on_new_block(4, 2), NewBlockDecision::Stale);
    }

    #[test]
    fn guard_blocks_second_request_until_complete_or_timeout() {
        let mut guard = SyncGuard::new();
        let peer = node(1);
        let t0 = Instant::now();
        assert!(guard.try_begin(&peer, t0));
        assert!(!guard.try_begin(&peer, t0));
        guard.complete(&peer);
        assert!(guard.try_begin(&peer, t0));
    }

    #[test]
    fn sync_response_starting_at_zero_is_a_replace_candidate() {
        // Constructing a real Block is exercised in srishti-chain's own
        // tests; here we only need the index-0 classification rule, so an
        // empty Vec standing in for "no blocks" is covered via the `None`
        // branch instead.
        assert!(classify_sync_response(vec![]).is_none());
    }
}
