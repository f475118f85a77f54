//! The node's outbound event bus ("callback soup ... becomes a
//! single outbound event bus emitting typed variants; subscribers filter by
//! kind"). `Node::subscribe` hands out a `broadcast::Receiver<NodeEvent>`;
//! nothing outside `node.rs` ever calls back into application code
//! directly.

use srishti_core::{BlockIndex, NodeId};
use srishti_net::ConnectionState;

/// One notable thing the node observed, for any interested subscriber
/// (a CLI status line, a test harness, a future UI layer) to react to.
#[derive(Clone, Debug)]
pub enum NodeEvent {
    /// A block was appended to our local chain, either self-proposed or
    /// received and applied from a peer.
    ChainExtended { index: BlockIndex, hash: String },
    /// `replaceChain` accepted a new canonical chain; the whole
    /// world state was rebuilt from it.
    ChainReplaced {
        length: BlockIndex,
        latest_hash: Option<String>,
    },
    /// A peer's connection lifecycle state changed.
    PeerStateChanged {
        node_id: NodeId,
        state: ConnectionState,
    },
    /// A remote peer left the relay.
    PeerLeft { node_id: NodeId },
    /// An out-of-band `PARENT_REQUEST`/`PARENT_RESPONSE` advisory message
    /// arrived — these never mutate chain state by themselves.
    ParentRequestReceived {
        node_id: NodeId,
        parent_id: NodeId,
        reason: Option<String>,
    },
    ParentResponseReceived {
        request_node_id: NodeId,
        parent_id: NodeId,
        approved: bool,
    },
}
