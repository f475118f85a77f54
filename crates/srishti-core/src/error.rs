use thiserror::Error;

/// Errors raised by event construction, validation, and the state machine.
///
/// Variants are grouped to match the six error kinds of the error-handling
/// design: Malformed, Stale/Ahead, Duplicate, Authorisation, Consistency,
/// Resource. Callers that need to branch on kind should match on these
/// groups rather than on message text.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Malformed ────────────────────────────────────────────────────────────
    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("invalid signature")]
    InvalidSignature,

    // ── Duplicate ────────────────────────────────────────────────────────────
    #[error("node already exists: {0}")]
    DuplicateNode(String),

    #[error("institution already pending or verified: {0}")]
    DuplicateInstitutionRegistration(String),

    // ── Authorisation ────────────────────────────────────────────────────────
    #[error("sender lacks required role: need one of {need:?}, sender is {sender_role:?}")]
    Unauthorized {
        need: Vec<crate::types::Role>,
        sender_role: Option<crate::types::Role>,
    },

    #[error("node_parent_update approver is neither the node itself nor an existing parent")]
    ParentUpdateUnauthorized,

    #[error("soulbound mint requires recipient to list sender as a parent")]
    SoulboundMintUnauthorized,

    #[error("karma_earn sender must be SYSTEM, got {0}")]
    KarmaEarnSenderMustBeSystem(String),

    // ── Consistency ──────────────────────────────────────────────────────────
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown institution: {0}")]
    UnknownInstitution(String),

    #[error("insufficient karma balance: need {need}, have {have}")]
    InsufficientKarma { need: u64, have: u64 },

    #[error("karma transfer amount must be greater than zero")]
    ZeroKarmaAmount,

    #[error("social recovery threshold {threshold} invalid for {guardians} guardians")]
    InvalidRecoveryThreshold { threshold: u32, guardians: usize },

    #[error("vote cast after voting window closed at block {voting_ends_at}")]
    VotingClosed { voting_ends_at: u64 },

    #[error("unknown proposal: {0}")]
    UnknownProposal(String),

    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    #[error("merkle root mismatch: expected {expected}, computed {computed}")]
    MerkleRootMismatch { expected: String, computed: String },

    #[error("previous hash mismatch: expected {expected}, got {got}")]
    PreviousHashMismatch { expected: String, got: String },

    #[error("chain epoch mismatch: ours {ours}, theirs {theirs}")]
    ChainEpochMismatch { ours: u64, theirs: u64 },

    #[error("block index mismatch: expected {expected}, got {got}")]
    BlockIndexMismatch { expected: u64, got: u64 },

    // ── Resource ─────────────────────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("sync timed out")]
    SyncTimeout,

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
