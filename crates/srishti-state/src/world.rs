//! The derived world state: a mapping built up by folding events in
//! order. Never the source of truth on disk — `srishti-chain`'s chain manager
//! rebuilds it from the block sequence on every `replaceChain` and at startup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use srishti_core::{
    AccountRecoveryState, BlockIndex, NodeId, NodeRecord, ParentRequest, Proposal, Role,
    SoulboundCredential, Timestamp,
};

/// An institution's lifecycle bucket (`institutions.{verified,pending,revoked}`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Institutions {
    pub verified: std::collections::BTreeSet<NodeId>,
    pub pending: std::collections::BTreeSet<NodeId>,
    pub revoked: std::collections::BTreeSet<NodeId>,
}

/// One `APP_EVENT` record kept in the secondary index, enough to answer
/// `(appId, action, ref, target)`-shaped queries without re-scanning the chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppEventRecord {
    pub block_index: BlockIndex,
    pub sender: String,
    pub timestamp: Timestamp,
    pub app_id: String,
    pub action: String,
    pub reference: Option<String>,
    pub target: Option<String>,
    pub data: Option<serde_json::Value>,
}

/// The full derived state, as enumerated in .
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Set once by the `GENESIS` event; `0` until then.
    pub chain_epoch: u64,
    pub nodes: BTreeMap<NodeId, NodeRecord>,
    pub node_roles: BTreeMap<NodeId, Role>,
    pub institutions: Institutions,
    pub soulbound_tokens: BTreeMap<NodeId, Vec<SoulboundCredential>>,
    pub karma_balances: BTreeMap<NodeId, u64>,
    pub proposals: BTreeMap<String, Proposal>,
    pub account_state: BTreeMap<NodeId, AccountRecoveryState>,
    /// `parentId -> childId -> request`.
    pub pending_parent_requests: BTreeMap<NodeId, BTreeMap<NodeId, ParentRequest>>,
    pub app_event_index: Vec<AppEventRecord>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role_of(&self, node_id: &NodeId) -> Option<Role> {
        self.node_roles.get(node_id).copied()
    }

    pub fn karma_of(&self, node_id: &NodeId) -> u64 {
        self.karma_balances.get(node_id).copied().unwrap_or(0)
    }

    pub fn is_institution_verified(&self, node_id: &NodeId) -> bool {
        self.institutions.verified.contains(node_id)
    }
}
