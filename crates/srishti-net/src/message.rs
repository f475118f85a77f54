//! Peer protocol wire messages. Internally-tagged JSON so
//! every message carries `{type, timestamp, ...}` per wire-protocol
//! rule, field order matching each variant's declaration order.
//!
//! An enum with `to_bytes`/`from_bytes` helpers, UTF-8 JSON text rather
//! than a binary encoding, carrying this protocol's six message kinds.

use serde::{Deserialize, Serialize};
use srishti_chain::Block;
use srishti_core::{BlockIndex, CoreError, NodeId, Timestamp};

/// Protocol version advertised in every `HELLO`.
pub const PROTOCOL_VERSION: u32 = 2;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    Hello {
        timestamp: Timestamp,
        node_id: NodeId,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        public_key: Option<String>,
        chain_length: BlockIndex,
        latest_hash: String,
        protocol_version: u32,
        chain_epoch: u64,
    },
    SyncRequest {
        timestamp: Timestamp,
        from_index: BlockIndex,
        chain_length: BlockIndex,
        latest_hash: String,
    },
    SyncResponse {
        timestamp: Timestamp,
        blocks: Vec<Block>,
        chain_length: BlockIndex,
    },
    NewBlock {
        timestamp: Timestamp,
        block: Block,
        ttl: u8,
    },
    Heartbeat {
        timestamp: Timestamp,
        node_id: NodeId,
        is_online: bool,
        known_online: Vec<NodeId>,
    },
    ParentRequest {
        timestamp: Timestamp,
        node_id: NodeId,
        parent_id: NodeId,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        metadata: Option<serde_json::Value>,
    },
    ParentResponse {
        timestamp: Timestamp,
        request_node_id: NodeId,
        parent_id: NodeId,
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        reason: Option<String>,
    },
}

impl PeerMessage {
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(CoreError::from)
    }

    pub fn from_json(s: &str) -> Result<Self, CoreError> {
        serde_json::from_str(s).map_err(CoreError::from)
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            PeerMessage::Hello { timestamp, .. }
            | PeerMessage::SyncRequest { timestamp, .. }
            | PeerMessage::SyncResponse { timestamp, .. }
            | PeerMessage::NewBlock { timestamp, .. }
            | PeerMessage::Heartbeat { timestamp, .. }
            | PeerMessage::ParentRequest { timestamp, .. }
            | PeerMessage::ParentResponse { timestamp, .. } => *timestamp,
        }
    }

    /// The `type` discriminant as it appears on the wire, for gossip
    /// message-id derivation.
    pub fn type_name(&self) -> &'static str {
        match self {
            PeerMessage::Hello { .. } => "HELLO",
            PeerMessage::SyncRequest { .. } => "SYNC_REQUEST",
            PeerMessage::SyncResponse { .. } => "SYNC_RESPONSE",
            PeerMessage::NewBlock { .. } => "NEW_BLOCK",
            PeerMessage::Heartbeat { .. } => "HEARTBEAT",
            PeerMessage::ParentRequest { .. } => "PARENT_REQUEST",
            PeerMessage::ParentResponse { .. } => "PARENT_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips_through_json() {
        let msg = PeerMessage::Hello {
            timestamp: 1,
            node_id: NodeId::parse("node_aaaaaaaaaaaaaaaa").unwrap(),
            public_key: Some("ab".into()),
            chain_length: 3,
            latest_hash: "deadbeef".into(),
            protocol_version: PROTOCOL_VERSION,
            chain_epoch: 7,
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"HELLO\""));
        let back = PeerMessage::from_json(&json).unwrap();
        assert_eq!(back.type_name(), "HELLO");
        assert_eq!(back.timestamp(), 1);
    }
}
