use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Block height / index.
pub type BlockIndex = u64;

/// The reserved sender value used by system-issued events (currently only
/// `KARMA_EARN`).
pub const SYSTEM_SENDER: &str = "SYSTEM";

// ── NodeId ───────────────────────────────────────────────────────────────────

/// A node identifier: `"node_" || hex(SHA-256(publicKeyRaw))[..16]`.
///
/// Kept as a validated newtype around `String` rather than a fixed-size byte
/// array because the id is also a wire/storage key (hex text, not raw bytes).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub const PREFIX: &'static str = "node_";

    /// Build a `NodeId` from raw Ed25519 public key bytes.
    pub fn from_public_key_hash(pubkey_hash_hex16: &str) -> Self {
        Self(format!("{}{}", Self::PREFIX, pubkey_hash_hex16))
    }

    /// Wrap an already-formatted node id string, validating its shape.
    pub fn parse(s: impl Into<String>) -> Result<Self, crate::error::CoreError> {
        let s = s.into();
        if !s.starts_with(Self::PREFIX) || s.len() != Self::PREFIX.len() + 16 {
            return Err(crate::error::CoreError::Malformed(format!(
                "invalid node id: {s}"
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SENDER
    }

    /// The reserved `SYSTEM` sender, used for `KARMA_EARN` events.
    pub fn system() -> Self {
        Self(SYSTEM_SENDER.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Role ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Institution,
    GovernanceAdmin,
    Root,
}

impl Role {
    pub fn can_verify_institutions(self) -> bool {
        matches!(self, Role::Root | Role::GovernanceAdmin)
    }

    pub fn can_revoke_institutions(self) -> bool {
        matches!(self, Role::Root)
    }
}

// ── Parent-update action ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParentUpdateAction {
    Add,
    Remove,
    Set,
}

// ── Institution lifecycle ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstitutionState {
    Pending,
    Verified,
    Revoked,
}

// ── Governance ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Voting still open (current block index <= votingEndsAtBlockIndex).
    Open,
    /// Voting window has elapsed. Tallying beyond "votes recorded" is left to
    /// callers/queries; the state machine itself only gates ballot admission.
    Closed,
}

/// A free-form vote choice string (e.g. "YES"/"NO"/"ABSTAIN"). No closed
/// set of choices is enumerated, so this is intentionally open.
pub type VoteChoice = String;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: String,
    pub creator: NodeId,
    pub description: String,
    pub voting_ends_at_block_index: BlockIndex,
    pub quorum_pct: u8,
    pub votes: std::collections::BTreeMap<NodeId, VoteChoice>,
    pub status: ProposalStatus,
}

// ── Soulbound credential ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoulboundCredential {
    pub issuer: NodeId,
    pub achievement_id: String,
    pub title: String,
    pub description: Option<String>,
    pub proof_ref: Option<String>,
    pub revocable: bool,
    pub minted_at: Timestamp,
}

// ── Account / node record ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub name: String,
    /// Ordered set: insertion order is preserved, duplicates rejected.
    pub parent_ids: Vec<NodeId>,
    pub public_key: Vec<u8>,
    pub joined_at: Timestamp,
    pub recovery_phrase_hash: Option<String>,
}

impl NodeRecord {
    pub fn has_parent(&self, candidate: &NodeId) -> bool {
        self.parent_ids.iter().any(|p| p == candidate)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountRecoveryState {
    pub guardians: Vec<NodeId>,
    pub recovery_threshold: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParentRequest {
    pub node_id: NodeId,
    pub parent_id: NodeId,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub requested_at: Timestamp,
}
