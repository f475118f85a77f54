//! JSON-serialisable response shapes for the "srishti" RPC namespace.
//!
//! A dedicated `Rpc*` struct per response shape, rather than returning
//! internal state types verbatim, even where, as here, most of Srishti's
//! own state types are already `Serialize`/`Deserialize` — keeping the wire
//! shape decoupled from `srishti-state`'s internal layout.

use serde::{Deserialize, Serialize};
use srishti_core::{BlockIndex, Role, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNode {
    pub node_id: String,
    pub name: String,
    pub parent_ids: Vec<String>,
    pub public_key_hex: String,
    pub joined_at: Timestamp,
    pub recovery_phrase_hash: Option<String>,
    pub role: RpcRole,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcRole {
    User,
    Institution,
    GovernanceAdmin,
    Root,
}

impl From<Role> for RpcRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => RpcRole::User,
            Role::Institution => RpcRole::Institution,
            Role::GovernanceAdmin => RpcRole::GovernanceAdmin,
            Role::Root => RpcRole::Root,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcInstitutionState {
    Pending,
    Verified,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcInstitution {
    pub node_id: String,
    pub state: RpcInstitutionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcProposal {
    pub proposal_id: String,
    pub creator: String,
    pub description: String,
    pub voting_ends_at_block_index: BlockIndex,
    pub quorum_pct: u8,
    pub votes: std::collections::BTreeMap<String, String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcChainInfo {
    pub chain_epoch: u64,
    pub length: BlockIndex,
    pub latest_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcParentRequest {
    pub node_id: String,
    pub parent_id: String,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub requested_at: Timestamp,
}

/// Response to `submitEvent`: the event's content hash, used as a client-
/// facing handle for looking the event up later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSubmitReceipt {
    pub event_hash: String,
    /// `true` if the event was accepted into the node's local proposal
    /// queue; it is not yet known to have been included in a block.
    pub accepted: bool,
}
