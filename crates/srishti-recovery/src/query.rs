//! Read-only recovery helpers over `WorldState`, mirroring the
//! `SOCIAL_RECOVERY_UPDATE` handler and the `accountState` projection it
//! maintains.
//!
//! A borrowed-handle struct wrapping the state store with one method per
//! question a caller asks about an account's recovery configuration.
//! Srishti's state machine has no on-chain recovery-execution lifecycle
//! (no `active`/`votesApprove`/`challengeActive` fields; only
//! ever replaces the guardian set and threshold wholesale). Recovery itself
//! — a guardian quorum vouching for a new key off-chain — is therefore a
//! local, stateless computation over a caller-supplied set of approvals,
//! not a query against persisted state; see [`crate::quorum`].

use srishti_core::{CoreError, NodeId};
use srishti_state::WorldState;

/// Borrowed view over one node's recovery configuration.
pub struct RecoveryQuery<'a> {
    state: &'a WorldState,
}

impl<'a> RecoveryQuery<'a> {
    pub fn new(state: &'a WorldState) -> Self {
        Self { state }
    }

    /// `true` if `account` has ever published a `SOCIAL_RECOVERY_UPDATE`
    /// (i.e. has a non-default entry in `accountState`).
    pub fn has_recovery_configured(&self, account: &NodeId) -> bool {
        self.state.account_state.contains_key(account)
    }

    /// The account's current guardian set, empty if none configured.
    pub fn guardians(&self, account: &NodeId) -> &[NodeId] {
        self.state
            .account_state
            .get(account)
            .map(|s| s.guardians.as_slice())
            .unwrap_or(&[])
    }

    /// The number of guardian approvals required to recover `account`, or
    /// `None` if no recovery configuration exists yet.
    pub fn threshold(&self, account: &NodeId) -> Option<u32> {
        self.state
            .account_state
            .get(account)
            .map(|s| s.recovery_threshold)
    }

    pub fn is_guardian(&self, account: &NodeId, candidate: &NodeId) -> bool {
        self.guardians(account).iter().any(|g| g == candidate)
    }

    /// A human-readable status line.
    pub fn describe(&self, account: &NodeId) -> Result<String, CoreError> {
        match self.state.account_state.get(account) {
            None => Ok(format!("{account} — no recovery configuration")),
            Some(cfg) => Ok(format!(
                "{account} — {}/{} guardians required",
                cfg.recovery_threshold,
                cfg.guardians.len()
            )),
        }
    }

    /// The `recoveryPhraseHash` an account committed to at `NODE_JOIN`
    /// time, if any ("recovery phrase" on-chain commitment).
    pub fn recovery_phrase_hash(&self, account: &NodeId) -> Option<&str> {
        self.state
            .nodes
            .get(account)
            .and_then(|n| n.recovery_phrase_hash.as_deref())
    }
}
