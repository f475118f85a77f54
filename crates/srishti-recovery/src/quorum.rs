//! Local guardian-quorum evaluation: deciding whether a
//! set of guardian approvals gathered off-chain meets an account's
//! configured `recoveryThreshold`, and verifying a recovered mnemonic
//! against the phrase hash committed at `NODE_JOIN` time.
//!
//! Approval counting is caller-supplied rather than backed by a persisted
//! `votesApprove` set, since Srishti's state machine keeps no on-chain
//! recovery-session state (see [`crate::query`]'s module doc).

use std::collections::BTreeSet;

use srishti_core::NodeId;

use crate::query::RecoveryQuery;

/// `true` if `approvals` (deduplicated) contains at least `threshold`
/// distinct members of `account`'s guardian set.
pub fn quorum_reached(query: &RecoveryQuery<'_>, account: &NodeId, approvals: &[NodeId]) -> bool {
    let Some(threshold) = query.threshold(account) else {
        return false;
    };
    let guardians: BTreeSet<&NodeId> = query.guardians(account).iter().collect();
    let distinct_valid: BTreeSet<&NodeId> = approvals.iter().filter(|a| guardians.contains(a)).collect();
    distinct_valid.len() as u32 >= threshold
}

/// `true` if `candidate_phrase` hashes to the recovery-phrase commitment
/// published when `account` joined.
pub fn verify_recovery_phrase(
    query: &RecoveryQuery<'_>,
    account: &NodeId,
    candidate_phrase: &str,
) -> bool {
    let Some(committed) = query.recovery_phrase_hash(account) else {
        return false;
    };
    committed == srishti_crypto::mnemonic::recovery_phrase_hash(candidate_phrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use srishti_core::AccountRecoveryState;
    use srishti_state::WorldState;

    fn node(n: u8) -> NodeId {
        NodeId::parse(format!("node_{:016x}", n)).unwrap()
    }

    fn state_with_guardians(threshold: u32) -> WorldState {
        let mut state = WorldState::default();
        state.account_state.insert(
            node(1),
            AccountRecoveryState {
                guardians: vec![node(2), node(3), node(4)],
                recovery_threshold: threshold,
            },
        );
        state
    }

    #[test]
    fn quorum_reached_at_threshold() {
        let state = state_with_guardians(2);
        let query = RecoveryQuery::new(&state);
        assert!(quorum_reached(&query, &node(1), &[node(2), node(3)]));
    }

    #[test]
    fn quorum_not_reached_below_threshold() {
        let state = state_with_guardians(2);
        let query = RecoveryQuery::new(&state);
        assert!(!quorum_reached(&query, &node(1), &[node(2)]));
    }

    #[test]
    fn non_guardian_approvals_do_not_count() {
        let state = state_with_guardians(2);
        let query = RecoveryQuery::new(&state);
        assert!(!quorum_reached(&query, &node(1), &[node(2), node(9)]));
    }

    #[test]
    fn duplicate_approvals_do_not_inflate_quorum() {
        let state = state_with_guardians(2);
        let query = RecoveryQuery::new(&state);
        assert!(!quorum_reached(&query, &node(1), &[node(2), node(2)]));
    }

    #[test]
    fn unconfigured_account_never_reaches_quorum() {
        let state = WorldState::default();
        let query = RecoveryQuery::new(&state);
        assert!(!quorum_reached(&query, &node(1), &[node(2), node(3)]));
    }
}
