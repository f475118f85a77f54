//! The deterministic state-transition function: `apply` folds one
//! event into a clone of the world state, returning the successor state or an
//! error that leaves the caller's original state untouched; `rebuild` folds
//! every event of every block from empty state. No wall-clock reads, random
//! numbers, or I/O happen here — ordering is block index then event position,
//! exactly as the caller presents them.
//!
//! Rather than staging a side list of pending writes and committing at
//! the end, every event clones the whole incoming state up front and mutates
//! only the clone, which is simpler to keep correct for this crate's map-of-
//! maps state shape and gives the same all-or-nothing guarantee (a failing
//! event never touches the caller's `state`).

use srishti_core::event::{
    AppEventPayload, GenesisPayload, GovProposalPayload, InstitutionRegisterPayload,
    InstitutionRevokePayload, InstitutionVerifyPayload, KarmaEarnPayload, KarmaTransferPayload,
    NodeJoinPayload, NodeParentRequestPayload, NodeParentUpdatePayload,
    SocialRecoveryUpdatePayload, SoulboundMintPayload, VoteCastPayload,
};
use srishti_core::types::SYSTEM_SENDER;
use srishti_core::{
    constants::karma_rewards, AccountRecoveryState, BlockIndex, CoreError, Event, EventType,
    NodeId, ParentRequest, ParentUpdateAction, Proposal, ProposalStatus, Role,
    SoulboundCredential,
};

use crate::world::{AppEventRecord, WorldState};

/// Apply a single event to `state`, returning the successor state. `state` is
/// left untouched on error — this function never mutates its argument.
pub fn apply(state: &WorldState, event: &Event, block_index: BlockIndex) -> Result<WorldState, CoreError> {
    let mut next = state.clone();
    match event.event_type {
        EventType::Genesis => apply_genesis(&mut next, event)?,
        EventType::NodeJoin => apply_node_join(&mut next, event)?,
        EventType::NodeParentUpdate => apply_node_parent_update(&mut next, event)?,
        EventType::InstitutionRegister => apply_institution_register(&mut next, event)?,
        EventType::InstitutionVerify => apply_institution_verify(&mut next, event)?,
        EventType::InstitutionRevoke => apply_institution_revoke(&mut next, event)?,
        EventType::SoulboundMint => apply_soulbound_mint(&mut next, event)?,
        EventType::KarmaEarn => apply_karma_earn(&mut next, event)?,
        EventType::KarmaTransfer => apply_karma_transfer(&mut next, event)?,
        EventType::GovProposal => apply_gov_proposal(&mut next, event, block_index)?,
        EventType::VoteCast => apply_vote_cast(&mut next, event, block_index)?,
        EventType::SocialRecoveryUpdate => apply_social_recovery_update(&mut next, event)?,
        EventType::AppEvent => apply_app_event(&mut next, event, block_index)?,
        EventType::NodeParentRequest => apply_node_parent_request(&mut next, event)?,
    }
    Ok(next)
}

/// Fold every event of every block, in block-index then in-body order, from
/// empty state. Equivalent to `fold(apply, WorldState::default(), events)`.
pub fn rebuild<'a>(
    blocks: impl IntoIterator<Item = (BlockIndex, &'a [Event])>,
) -> Result<WorldState, CoreError> {
    let mut state = WorldState::new();
    for (index, events) in blocks {
        for event in events {
            state = apply(&state, event, index)?;
        }
    }
    Ok(state)
}

fn node_id(s: &str) -> Result<NodeId, CoreError> {
    NodeId::parse(s)
}

fn require_node<'s>(state: &'s WorldState, id: &NodeId) -> Result<&'s srishti_core::NodeRecord, CoreError> {
    state
        .nodes
        .get(id)
        .ok_or_else(|| CoreError::UnknownNode(id.to_string()))
}

fn apply_genesis(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: GenesisPayload = event.typed_payload()?;
    *state = WorldState::new();
    state.chain_epoch = payload.chain_epoch;
    Ok(())
}

fn apply_node_join(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: NodeJoinPayload = event.typed_payload()?;
    let id = node_id(&payload.node_id)?;
    if state.nodes.contains_key(&id) {
        return Err(CoreError::DuplicateNode(id.to_string()));
    }

    let is_first_node = state.nodes.is_empty();
    let public_key =
        hex::decode(&payload.public_key).map_err(|e| CoreError::Malformed(format!("public_key: {e}")))?;

    let mut parent_ids = Vec::new();
    if let Some(parent) = &payload.parent_id {
        let parent_id = node_id(parent)?;
        if state.nodes.contains_key(&parent_id) {
            parent_ids.push(parent_id);
        }
    }

    let record = srishti_core::NodeRecord {
        node_id: id.clone(),
        name: payload.name,
        parent_ids,
        public_key,
        joined_at: event.timestamp,
        recovery_phrase_hash: payload.recovery_phrase_hash,
    };
    state.nodes.insert(id.clone(), record);
    let role = if is_first_node { Role::Root } else { Role::User };
    state.node_roles.insert(id.clone(), role);

    *state.karma_balances.entry(id).or_insert(0) += karma_rewards::NODE_JOIN;
    Ok(())
}

fn apply_node_parent_update(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: NodeParentUpdatePayload = event.typed_payload()?;
    let approver_id = node_id(&event.sender)?;
    let target_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("node_parent_update missing recipient".into()))?,
    )?;

    {
        let target = require_node(state, &target_id)?;
        let authorized = approver_id == target_id || target.has_parent(&approver_id);
        if !authorized {
            return Err(CoreError::ParentUpdateUnauthorized);
        }
    }

    let target = state.nodes.get_mut(&target_id).expect("checked above");
    match payload.action {
        ParentUpdateAction::Add => {
            if let Some(parent) = &payload.parent_id {
                let parent_id = node_id(parent)?;
                if !target.parent_ids.contains(&parent_id) {
                    if !state.nodes.contains_key(&parent_id) {
                        return Err(CoreError::UnknownNode(parent_id.to_string()));
                    }
                    target.parent_ids.push(parent_id);
                }
            }
        }
        ParentUpdateAction::Remove => {
            if let Some(parent) = &payload.parent_id {
                let parent_id = node_id(parent)?;
                target.parent_ids.retain(|p| p != &parent_id);
            }
        }
        ParentUpdateAction::Set => {
            // `newParentIds == None` means "become independent" (DESIGN.md Open
            // Question 2), treated identically to an explicit empty list.
            let requested = payload.new_parent_ids.unwrap_or_default();
            let mut resolved = Vec::with_capacity(requested.len());
            for p in &requested {
                let parent_id = node_id(p)?;
                if !state.nodes.contains_key(&parent_id) {
                    return Err(CoreError::UnknownNode(parent_id.to_string()));
                }
                if !resolved.contains(&parent_id) {
                    resolved.push(parent_id);
                }
            }
            state.nodes.get_mut(&target_id).expect("checked above").parent_ids = resolved;
        }
    }
    Ok(())
}

fn apply_institution_register(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let _payload: InstitutionRegisterPayload = event.typed_payload()?;
    let sender_id = node_id(&event.sender)?;
    require_node(state, &sender_id)?;
    if state.institutions.verified.contains(&sender_id) || state.institutions.pending.contains(&sender_id) {
        return Err(CoreError::DuplicateInstitutionRegistration(sender_id.to_string()));
    }
    state.institutions.pending.insert(sender_id);
    Ok(())
}

fn apply_institution_verify(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: InstitutionVerifyPayload = event.typed_payload()?;
    let sender_id = node_id(&event.sender)?;
    let target_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("institution_verify missing recipient".into()))?,
    )?;

    let sender_role = state.role_of(&sender_id);
    if !matches!(sender_role, Some(Role::Root) | Some(Role::GovernanceAdmin)) {
        return Err(CoreError::Unauthorized {
            need: vec![Role::Root, Role::GovernanceAdmin],
            sender_role,
        });
    }
    if !state.institutions.pending.contains(&target_id) {
        return Err(CoreError::UnknownInstitution(target_id.to_string()));
    }

    state.institutions.pending.remove(&target_id);
    if payload.approved {
        state.institutions.verified.insert(target_id.clone());
        state.node_roles.insert(target_id.clone(), Role::Institution);
        *state.karma_balances.entry(target_id).or_insert(0) += karma_rewards::INSTITUTION_VERIFY;
    }
    Ok(())
}

fn apply_institution_revoke(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let _payload: InstitutionRevokePayload = event.typed_payload()?;
    let sender_id = node_id(&event.sender)?;
    let target_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("institution_revoke missing recipient".into()))?,
    )?;

    let sender_role = state.role_of(&sender_id);
    if sender_role != Some(Role::Root) {
        return Err(CoreError::Unauthorized {
            need: vec![Role::Root],
            sender_role,
        });
    }
    if !state.institutions.verified.contains(&target_id) {
        return Err(CoreError::UnknownInstitution(target_id.to_string()));
    }
    state.institutions.verified.remove(&target_id);
    state.institutions.revoked.insert(target_id.clone());
    state.node_roles.insert(target_id, Role::User);
    Ok(())
}

fn apply_soulbound_mint(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: SoulboundMintPayload = event.typed_payload()?;
    let sender_id = node_id(&event.sender)?;
    let recipient_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("soulbound_mint missing recipient".into()))?,
    )?;

    if !state.is_institution_verified(&sender_id) {
        return Err(CoreError::SoulboundMintUnauthorized);
    }
    let recipient = require_node(state, &recipient_id)?;
    if !recipient.has_parent(&sender_id) {
        return Err(CoreError::SoulboundMintUnauthorized);
    }

    let credential = SoulboundCredential {
        issuer: sender_id,
        achievement_id: payload.achievement_id,
        title: payload.title,
        description: payload.description,
        proof_ref: payload.proof_ref,
        revocable: payload.revocable,
        minted_at: event.timestamp,
    };
    state
        .soulbound_tokens
        .entry(recipient_id.clone())
        .or_default()
        .push(credential);
    *state.karma_balances.entry(recipient_id).or_insert(0) += karma_rewards::SOULBOUND_MINT_RECIPIENT;
    Ok(())
}

fn apply_karma_earn(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: KarmaEarnPayload = event.typed_payload()?;
    if event.sender != SYSTEM_SENDER {
        return Err(CoreError::KarmaEarnSenderMustBeSystem(event.sender.clone()));
    }
    let recipient_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("karma_earn missing recipient".into()))?,
    )?;
    *state.karma_balances.entry(recipient_id).or_insert(0) += payload.amount;
    Ok(())
}

fn apply_karma_transfer(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: KarmaTransferPayload = event.typed_payload()?;
    if payload.amount == 0 {
        return Err(CoreError::ZeroKarmaAmount);
    }
    let sender_id = node_id(&event.sender)?;
    let recipient_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("karma_transfer missing recipient".into()))?,
    )?;

    let have = state.karma_of(&sender_id);
    if have < payload.amount {
        return Err(CoreError::InsufficientKarma {
            need: payload.amount,
            have,
        });
    }
    *state.karma_balances.entry(sender_id).or_insert(0) -= payload.amount;
    *state.karma_balances.entry(recipient_id).or_insert(0) += payload.amount;
    Ok(())
}

fn apply_gov_proposal(state: &mut WorldState, event: &Event, block_index: BlockIndex) -> Result<(), CoreError> {
    let payload: GovProposalPayload = event.typed_payload()?;
    let creator = node_id(&event.sender)?;
    if state.proposals.contains_key(&payload.proposal_id) {
        tracing::warn!(proposal_id = %payload.proposal_id, "overwriting existing proposal id");
    }
    let proposal = Proposal {
        proposal_id: payload.proposal_id.clone(),
        creator,
        description: payload.description,
        voting_ends_at_block_index: block_index + payload.voting_period_blocks,
        quorum_pct: payload.quorum_pct,
        votes: Default::default(),
        status: ProposalStatus::Open,
    };
    state.proposals.insert(payload.proposal_id, proposal);
    Ok(())
}

fn apply_vote_cast(state: &mut WorldState, event: &Event, block_index: BlockIndex) -> Result<(), CoreError> {
    let payload: VoteCastPayload = event.typed_payload()?;
    let voter = node_id(&event.sender)?;
    let proposal = state
        .proposals
        .get_mut(&payload.proposal_id)
        .ok_or_else(|| CoreError::UnknownProposal(payload.proposal_id.clone()))?;
    if block_index > proposal.voting_ends_at_block_index {
        return Err(CoreError::VotingClosed {
            voting_ends_at: proposal.voting_ends_at_block_index,
        });
    }
    proposal.votes.insert(voter, payload.choice);
    Ok(())
}

fn apply_social_recovery_update(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: SocialRecoveryUpdatePayload = event.typed_payload()?;
    if payload.threshold < 1 || payload.threshold as usize > payload.guardians.len() {
        return Err(CoreError::InvalidRecoveryThreshold {
            threshold: payload.threshold,
            guardians: payload.guardians.len(),
        });
    }
    let sender_id = node_id(&event.sender)?;
    let mut guardians = Vec::with_capacity(payload.guardians.len());
    for g in &payload.guardians {
        guardians.push(node_id(g)?);
    }
    state.account_state.insert(
        sender_id,
        AccountRecoveryState {
            guardians,
            recovery_threshold: payload.threshold,
        },
    );
    Ok(())
}

fn apply_app_event(state: &mut WorldState, event: &Event, block_index: BlockIndex) -> Result<(), CoreError> {
    let payload: AppEventPayload = event.typed_payload()?;
    state.app_event_index.push(AppEventRecord {
        block_index,
        sender: event.sender.clone(),
        timestamp: event.timestamp,
        app_id: payload.app_id,
        action: payload.action,
        reference: payload.reference,
        target: payload.target,
        data: payload.data,
    });
    Ok(())
}

fn apply_node_parent_request(state: &mut WorldState, event: &Event) -> Result<(), CoreError> {
    let payload: NodeParentRequestPayload = event.typed_payload()?;
    let sender_id = node_id(&event.sender)?;
    let parent_id = node_id(
        event
            .recipient
            .as_deref()
            .ok_or_else(|| CoreError::Malformed("node_parent_request missing recipient".into()))?,
    )?;
    state
        .pending_parent_requests
        .entry(parent_id.clone())
        .or_default()
        .insert(
            sender_id.clone(),
            ParentRequest {
                node_id: sender_id,
                parent_id,
                reason: payload.reason,
                metadata: payload.metadata,
                requested_at: event.timestamp,
            },
        );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::parse(id).unwrap()
    }

    #[test]
    fn genesis_then_first_join_promotes_root() {
        let state = WorldState::new();
        let genesis = Event::genesis(1, 1, "T");
        let state = apply(&state, &genesis, 0).unwrap();
        assert_eq!(state.chain_epoch, 1);

        let join = Event::node_join(2, "node_aaaaaaaaaaaaaaaa", "Alice", None, "ab", None).unwrap();
        let state = apply(&state, &join, 1).unwrap();
        assert_eq!(state.role_of(&node("node_aaaaaaaaaaaaaaaa")), Some(Role::Root));
        assert!(state.nodes[&node("node_aaaaaaaaaaaaaaaa")].parent_ids.is_empty());
    }

    #[test]
    fn duplicate_node_join_is_rejected() {
        let state = WorldState::new();
        let join = Event::node_join(1, "node_aaaaaaaaaaaaaaaa", "Alice", None, "ab", None).unwrap();
        let state = apply(&state, &join, 0).unwrap();
        let dup = Event::node_join(2, "node_aaaaaaaaaaaaaaaa", "Alice2", None, "ab", None).unwrap();
        assert!(matches!(apply(&state, &dup, 1), Err(CoreError::DuplicateNode(_))));
    }

    #[test]
    fn karma_transfer_conserves_total() {
        let state = WorldState::new();
        let join = Event::node_join(1, "node_aaaaaaaaaaaaaaaa", "A", None, "ab", None).unwrap();
        let state = apply(&state, &join, 0).unwrap();
        let join2 = Event::node_join(1, "node_bbbbbbbbbbbbbbbb", "B", None, "cd", None).unwrap();
        let state = apply(&state, &join2, 0).unwrap();

        let earn = Event::karma_earn(2, "node_aaaaaaaaaaaaaaaa", 100, None).unwrap();
        let state = apply(&state, &earn, 1).unwrap();
        let total_before: u64 = state.karma_balances.values().sum();

        let transfer =
            Event::karma_transfer(3, "node_aaaaaaaaaaaaaaaa", "node_bbbbbbbbbbbbbbbb", 30).unwrap();
        let state = apply(&state, &transfer, 2).unwrap();
        let total_after: u64 = state.karma_balances.values().sum();

        assert_eq!(total_before, total_after);
        // A: 10 (join) + 100 (earn) - 30 (transfer) = 80; B: 10 (join) + 30 (transfer) = 40.
        assert_eq!(state.karma_of(&node("node_aaaaaaaaaaaaaaaa")), 80);
        assert_eq!(state.karma_of(&node("node_bbbbbbbbbbbbbbbb")), 40);
    }

    #[test]
    fn insufficient_karma_transfer_leaves_state_unchanged() {
        let state = WorldState::new();
        let join = Event::node_join(1, "node_aaaaaaaaaaaaaaaa", "A", None, "ab", None).unwrap();
        let state = apply(&state, &join, 0).unwrap();
        let join2 = Event::node_join(1, "node_bbbbbbbbbbbbbbbb", "B", None, "cd", None).unwrap();
        let state = apply(&state, &join2, 0).unwrap();

        let transfer =
            Event::karma_transfer(2, "node_aaaaaaaaaaaaaaaa", "node_bbbbbbbbbbbbbbbb", 80).unwrap();
        let err = apply(&state, &transfer, 1).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientKarma { .. }));
        // Original `state` must remain usable/unchanged (pure function): only
        // the NODE_JOIN karma award (10) is present, the failed transfer never applied.
        assert_eq!(state.karma_of(&node("node_aaaaaaaaaaaaaaaa")), 10);
    }

    #[test]
    fn soulbound_mint_requires_parent_relationship() {
        let state = WorldState::new();
        let a = Event::node_join(1, "node_aaaaaaaaaaaaaaaa", "A", None, "ab", None).unwrap();
        let state = apply(&state, &a, 0).unwrap();
        let b = Event::node_join(2, "node_bbbbbbbbbbbbbbbb", "B", None, "cd", None).unwrap();
        let state = apply(&state, &b, 0).unwrap();

        let register =
            Event::institution_register(3, "node_bbbbbbbbbbbbbbbb", "EDUCATION").unwrap();
        let state = apply(&state, &register, 0).unwrap();
        let verify = Event::institution_verify(
            4,
            "node_aaaaaaaaaaaaaaaa",
            "node_bbbbbbbbbbbbbbbb",
            true,
            None,
        )
        .unwrap();
        let state = apply(&state, &verify, 0).unwrap();

        // A is not a child of B: must fail.
        let bad_mint = Event::soulbound_mint(
            5,
            "node_bbbbbbbbbbbbbbbb",
            "node_aaaaaaaaaaaaaaaa",
            "X",
            "Achiever",
            None,
            None,
            false,
        )
        .unwrap();
        assert!(matches!(
            apply(&state, &bad_mint, 0),
            Err(CoreError::SoulboundMintUnauthorized)
        ));

        // A child of B mints fine.
        let c = Event::node_join(
            6,
            "node_cccccccccccccccc",
            "C",
            Some("node_bbbbbbbbbbbbbbbb".into()),
            "ef",
            None,
        )
        .unwrap();
        let state = apply(&state, &c, 0).unwrap();
        let good_mint = Event::soulbound_mint(
            7,
            "node_bbbbbbbbbbbbbbbb",
            "node_cccccccccccccccc",
            "X",
            "Achiever",
            None,
            None,
            false,
        )
        .unwrap();
        let state = apply(&state, &good_mint, 0).unwrap();
        assert_eq!(state.soulbound_tokens[&node("node_cccccccccccccccc")].len(), 1);
    }

    #[test]
    fn vote_cast_rejected_after_voting_window() {
        let state = WorldState::new();
        let a = Event::node_join(1, "node_aaaaaaaaaaaaaaaa", "A", None, "ab", None).unwrap();
        let state = apply(&state, &a, 0).unwrap();
        let proposal = Event::gov_proposal(2, "node_aaaaaaaaaaaaaaaa", "P1", "desc", 5, 50).unwrap();
        let state = apply(&state, &proposal, 0).unwrap();
        assert_eq!(state.proposals["P1"].voting_ends_at_block_index, 5);

        let vote = Event::vote_cast(3, "node_aaaaaaaaaaaaaaaa", "P1", "YES").unwrap();
        let state = apply(&state, &vote, 5).unwrap();
        assert_eq!(state.proposals["P1"].votes[&node("node_aaaaaaaaaaaaaaaa")], "YES");

        let late_vote = Event::vote_cast(4, "node_aaaaaaaaaaaaaaaa", "P1", "NO").unwrap();
        assert!(matches!(
            apply(&state, &late_vote, 6),
            Err(CoreError::VotingClosed { .. })
        ));
    }
}
