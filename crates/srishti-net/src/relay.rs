//! The relay-channel abstraction: multiple coexisting transports (WebRTC,
//! WebSocket relay, signalling server) reduce to a single `RelayChannel`
//! interface; transports are pluggable implementations chosen at startup
//! rather than baked into this crate.
//!
//! A channel-handle shape (`outbound_tx`/`inbound_rx` plus a `run()` loop)
//! keeps the concrete transport a choice made by `srishti-node` at startup.
//! `InProcessRelay` is the one concrete implementation shipped here —
//! a broker-free hub for same-process multi-node tests and local
//! development, standing in for the opaque relay server implementation,
//! which is out of scope here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use srishti_core::NodeId;
use tokio::sync::mpsc;

/// A peer connecting or disconnecting, as reported by a [`RelayChannel`]
/// (`onPeerChange({joined|left}, nodeId, advertisedLength,
/// advertisedEpoch)`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerChange {
    Joined,
    Left,
}

/// One event surfaced to the node's main loop: either a unicast/broadcast
/// payload from a peer, or a peer joining/leaving the relay.
#[derive(Clone, Debug)]
pub enum RelayEvent {
    Message { from: NodeId, payload: String },
    PeerChange { node_id: NodeId, change: PeerChange },
}

/// The core's sole view of the transport layer: unicast,
/// broadcast, and an inbound event stream. Transport (WebRTC / WebSocket /
/// in-process) is an implementation detail behind this trait.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    /// Best-effort unicast to `to`, in-order per peer, no ordering across
    /// peers.
    async fn send(&self, to: &NodeId, payload: String) -> Result<(), srishti_core::CoreError>;

    /// Deliver `payload` to every currently-connected peer except the
    /// sender.
    async fn broadcast(&self, payload: String) -> Result<(), srishti_core::CoreError>;
}

/// An in-process hub implementing [`RelayChannel`] over `tokio::mpsc`
/// channels, with no network transport at all. Every node registered
/// against the same `InProcessHub` can reach every other; used for
/// integration tests and single-machine demos where a real WebRTC/WebSocket
/// relay server is unavailable or unnecessary (the relay server is
/// out of scope, treated only as an opaque broker).
#[derive(Clone, Default)]
pub struct InProcessHub {
    inboxes: Arc<Mutex<HashMap<NodeId, mpsc::UnboundedSender<RelayEvent>>>>,
}

impl InProcessHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node_id` on the hub, returning its [`RelayChannel`] handle
    /// and the receiver for events addressed to it. Every other already-
    /// registered node is notified of the join; this node is not notified
    /// of peers that join after it unless it later calls `subscribe` again.
    pub fn join(&self, node_id: NodeId) -> (InProcessRelay, mpsc::UnboundedReceiver<RelayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inboxes = self.inboxes.lock().expect("hub mutex poisoned");
        for (peer_id, peer_tx) in inboxes.iter() {
            let _ = peer_tx.send(RelayEvent::PeerChange {
                node_id: node_id.clone(),
                change: PeerChange::Joined,
            });
            let _ = tx.send(RelayEvent::PeerChange {
                node_id: peer_id.clone(),
                change: PeerChange::Joined,
            });
        }
        inboxes.insert(node_id.clone(), tx);
        (
            InProcessRelay {
                node_id,
                hub: self.clone(),
            },
            rx,
        )
    }

    /// Deregister `node_id`, notifying every remaining peer that it left.
    pub fn leave(&self, node_id: &NodeId) {
        let mut inboxes = self.inboxes.lock().expect("hub mutex poisoned");
        inboxes.remove(node_id);
        for peer_tx in inboxes.values() {
            let _ = peer_tx.send(RelayEvent::PeerChange {
                node_id: node_id.clone(),
                change: PeerChange::Left,
            });
        }
    }
}

/// One node's handle onto an [`InProcessHub`]; implements [`RelayChannel`].
pub struct InProcessRelay {
    node_id: NodeId,
    hub: InProcessHub,
}

#[async_trait]
impl RelayChannel for InProcessRelay {
    async fn send(&self, to: &NodeId, payload: String) -> Result<(), srishti_core::CoreError> {
        let inboxes = self.hub.inboxes.lock().expect("hub mutex poisoned");
        if let Some(tx) = inboxes.get(to) {
            let _ = tx.send(RelayEvent::Message {
                from: self.node_id.clone(),
                payload,
            });
        }
        Ok(())
    }

    async fn broadcast(&self, payload: String) -> Result<(), srishti_core::CoreError> {
        let inboxes = self.hub.inboxes.lock().expect("hub mutex poisoned");
        for (peer_id, tx) in inboxes.iter() {
            if *peer_id == self.node_id {
                continue;
            }
            let _ = tx.send(RelayEvent::Message {
                from: self.node_id.clone(),
                payload: payload.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::parse(format!("node_{:016x}", n)).unwrap()
    }

    #[tokio::test]
    async fn broadcast_reaches_all_but_sender() {
        let hub = InProcessHub::new();
        let (relay_a, mut rx_a) = hub.join(node(1));
        let (_relay_b, mut rx_b) = hub.join(node(2));
        let (_relay_c, mut rx_c) = hub.join(node(3));

        // Drain join notifications.
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}
        while rx_c.try_recv().is_ok() {}

        relay_a.broadcast("hello".into()).await.unwrap();

        let msg_b = rx_b.recv().await.unwrap();
        let msg_c = rx_c.recv().await.unwrap();
        assert!(matches!(msg_b, RelayEvent::Message { payload, .. } if payload == "hello"));
        assert!(matches!(msg_c, RelayEvent::Message { payload, .. } if payload == "hello"));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn unicast_reaches_only_target() {
        let hub = InProcessHub::new();
        let (relay_a, mut rx_a) = hub.join(node(1));
        let (_relay_b, mut rx_b) = hub.join(node(2));
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        relay_a.send(&node(2), "hi".into()).await.unwrap();
        let msg = rx_b.recv().await.unwrap();
        assert!(matches!(msg, RelayEvent::Message { payload, .. } if payload == "hi"));
    }

    #[tokio::test]
    async fn join_and_leave_notify_peers() {
        let hub = InProcessHub::new();
        let (_relay_a, mut rx_a) = hub.join(node(1));
        while rx_a.try_recv().is_ok() {}

        let (_relay_b, _rx_b) = hub.join(node(2));
        let evt = rx_a.recv().await.unwrap();
        assert!(matches!(
            evt,
            RelayEvent::PeerChange {
                change: PeerChange::Joined,
                ..
            }
        ));

        hub.leave(&node(2));
        let evt = rx_a.recv().await.unwrap();
        assert!(matches!(
            evt,
            RelayEvent::PeerChange {
                change: PeerChange::Left,
                ..
            }
        ));
    }
}
