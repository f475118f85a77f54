//! Per-peer connection lifecycle state machine.
//!
//! `DISCONNECTED -> CONNECTING -> HELLO_SENT -> COMPATIBLE | REJECTED ->
//! DISCONNECTED`. A rejected or disconnected peer is retried periodically as
//! long as its node id remains in the pending-connections set.

use srishti_core::{BlockIndex, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    HelloSent,
    Compatible,
    Rejected,
}

impl ConnectionState {
    /// Valid forward transitions in the connection lifecycle. Any other
    /// request is a no-op from the caller's perspective (callers are
    /// expected to check this before mutating their own state, not rely on
    /// it panicking).
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, HelloSent)
                | (HelloSent, Compatible)
                | (HelloSent, Rejected)
                | (Compatible, Disconnected)
                | (Rejected, Disconnected)
                | (Connecting, Disconnected)
                | (HelloSent, Disconnected)
        )
    }
}

/// Outcome of receiving a peer's `HELLO` ("if chainEpoch ≠ ours,
/// the peer is rejected; otherwise the peer's advertised length/hash is
/// recorded and a sync is initiated").
pub fn on_hello_received(local_chain_epoch: u64, remote_chain_epoch: u64) -> ConnectionState {
    if remote_chain_epoch == local_chain_epoch {
        ConnectionState::Compatible
    } else {
        ConnectionState::Rejected
    }
}

/// Tracks one peer's connection state plus the bookkeeping needed to decide
/// whether to retry and whether it is a sync candidate.
#[derive(Clone, Debug)]
pub struct PeerConnection {
    pub node_id: NodeId,
    pub state: ConnectionState,
    pub advertised_chain_length: BlockIndex,
    pub advertised_latest_hash: String,
    pub advertised_chain_epoch: u64,
    /// `true` while this peer is owed a reconnection attempt.
    pub pending: bool,
}

impl PeerConnection {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            state: ConnectionState::Disconnected,
            advertised_chain_length: 0,
            advertised_latest_hash: String::new(),
            advertised_chain_epoch: 0,
            pending: true,
        }
    }

    pub fn transition(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        match next {
            ConnectionState::Compatible => self.pending = false,
            ConnectionState::Disconnected | ConnectionState::Rejected => self.pending = true,
            _ => {}
        }
        true
    }

    pub fn record_hello(&mut self, chain_length: BlockIndex, latest_hash: String, chain_epoch: u64) {
        self.advertised_chain_length = chain_length;
        self.advertised_latest_hash = latest_hash;
        self.advertised_chain_epoch = chain_epoch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerConnection {
        PeerConnection::new(NodeId::parse("node_aaaaaaaaaaaaaaaa").unwrap())
    }

    #[test]
    fn happy_path_reaches_compatible() {
        let mut p = peer();
        assert!(p.transition(ConnectionState::Connecting));
        assert!(p.transition(ConnectionState::HelloSent));
        assert!(p.transition(ConnectionState::Compatible));
        assert_eq!(p.state, ConnectionState::Compatible);
        assert!(!p.pending);
    }

    #[test]
    fn epoch_mismatch_rejects() {
        assert_eq!(on_hello_received(1, 1), ConnectionState::Compatible);
        assert_eq!(on_hello_received(1, 2), ConnectionState::Rejected);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut p = peer();
        assert!(!p.transition(ConnectionState::Compatible));
        assert_eq!(p.state, ConnectionState::Disconnected);
    }

    #[test]
    fn rejected_peer_stays_pending_for_retry() {
        let mut p = peer();
        p.transition(ConnectionState::Connecting);
        p.transition(ConnectionState::HelloSent);
        p.transition(ConnectionState::Rejected);
        assert!(p.pending);
    }
}
