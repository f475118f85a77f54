//! Event schema: the closed sum type of records that make up a block body.
//!
//! Each event type has a typed payload struct; `Event::payload` stores it as
//! an opaque `serde_json::Value` so the envelope's canonical field order
//! (`type, timestamp, sender, recipient, payload, signature`) is a single
//! flat struct rather than an internally-tagged enum, matching the wire
//! canonicalisation rules exactly. Per-type constructors build the payload
//! from a typed struct (rejecting nothing at that layer — typed fields are
//! always present by construction); deserializing an untrusted payload back
//! into its typed struct is how "missing required fields" becomes a
//! `Malformed` error for free, a closed enum shape built around this
//! protocol's fourteen event variants.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ParentUpdateAction, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Genesis,
    NodeJoin,
    NodeParentUpdate,
    InstitutionRegister,
    InstitutionVerify,
    InstitutionRevoke,
    SoulboundMint,
    KarmaEarn,
    KarmaTransfer,
    GovProposal,
    VoteCast,
    SocialRecoveryUpdate,
    AppEvent,
    NodeParentRequest,
}

/// A signed (or unsigned, for the idempotent/pre-identity cases) record
/// appended to a block body. Field order matches the wire/hash canonical
/// order required by `type, timestamp, sender, recipient, payload,
/// signature`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: Timestamp,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
}

impl Event {
    /// Canonical-JSON bytes of this event, with `signature` stripped — the
    /// bytes a signer signs and a verifier checks against.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        crate::canonical_json::to_canonical_bytes(&unsigned)
    }

    /// Deserialize `payload` into the typed struct `T`, mapping a missing or
    /// ill-typed field to `CoreError::Malformed`.
    pub fn typed_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, CoreError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| CoreError::Malformed(format!("{:?} missing payload", self.event_type)))?;
        serde_json::from_value(payload.clone())
            .map_err(|e| CoreError::Malformed(format!("{:?} payload: {e}", self.event_type)))
    }

    fn with_payload<T: Serialize>(
        event_type: EventType,
        timestamp: Timestamp,
        sender: impl Into<String>,
        recipient: Option<String>,
        payload: &T,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            event_type,
            timestamp,
            sender: sender.into(),
            recipient,
            payload: Some(serde_json::to_value(payload)?),
            signature: None,
        })
    }

    pub fn genesis(timestamp: Timestamp, chain_epoch: u64, token: impl Into<String>) -> Self {
        Self::with_payload(
            EventType::Genesis,
            timestamp,
            "SYSTEM",
            None,
            &GenesisPayload {
                chain_epoch,
                token: token.into(),
            },
        )
        .expect("genesis payload is infallible")
    }

    pub fn node_join(
        timestamp: Timestamp,
        node_id: impl Into<String>,
        name: impl Into<String>,
        parent_id: Option<String>,
        public_key_hex: impl Into<String>,
        recovery_phrase_hash: Option<String>,
    ) -> Result<Self, CoreError> {
        let node_id = node_id.into();
        Self::with_payload(
            EventType::NodeJoin,
            timestamp,
            node_id.clone(),
            None,
            &NodeJoinPayload {
                node_id,
                name: name.into(),
                parent_id,
                public_key: public_key_hex.into(),
                recovery_phrase_hash,
            },
        )
    }

    pub fn node_parent_update(
        timestamp: Timestamp,
        approver_id: impl Into<String>,
        target_node_id: impl Into<String>,
        action: ParentUpdateAction,
        parent_id: Option<String>,
        new_parent_ids: Option<Vec<String>>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::NodeParentUpdate,
            timestamp,
            approver_id,
            Some(target_node_id.into()),
            &NodeParentUpdatePayload {
                action,
                parent_id,
                new_parent_ids,
            },
        )
    }

    pub fn institution_register(
        timestamp: Timestamp,
        sender: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::InstitutionRegister,
            timestamp,
            sender,
            None,
            &InstitutionRegisterPayload {
                category: category.into(),
            },
        )
    }

    pub fn institution_verify(
        timestamp: Timestamp,
        sender: impl Into<String>,
        target: impl Into<String>,
        approved: bool,
        reason: Option<String>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::InstitutionVerify,
            timestamp,
            sender,
            Some(target.into()),
            &InstitutionVerifyPayload { approved, reason },
        )
    }

    pub fn institution_revoke(
        timestamp: Timestamp,
        sender: impl Into<String>,
        target: impl Into<String>,
        reason: Option<String>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::InstitutionRevoke,
            timestamp,
            sender,
            Some(target.into()),
            &InstitutionRevokePayload { reason },
        )
    }

    pub fn soulbound_mint(
        timestamp: Timestamp,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        achievement_id: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        proof_ref: Option<String>,
        revocable: bool,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::SoulboundMint,
            timestamp,
            sender,
            Some(recipient.into()),
            &SoulboundMintPayload {
                achievement_id: achievement_id.into(),
                title: title.into(),
                description,
                proof_ref,
                revocable,
            },
        )
    }

    pub fn karma_earn(
        timestamp: Timestamp,
        recipient: impl Into<String>,
        amount: u64,
        reason: Option<String>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::KarmaEarn,
            timestamp,
            "SYSTEM",
            Some(recipient.into()),
            &KarmaEarnPayload { amount, reason },
        )
    }

    pub fn karma_transfer(
        timestamp: Timestamp,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::KarmaTransfer,
            timestamp,
            sender,
            Some(recipient.into()),
            &KarmaTransferPayload { amount },
        )
    }

    pub fn gov_proposal(
        timestamp: Timestamp,
        sender: impl Into<String>,
        proposal_id: impl Into<String>,
        description: impl Into<String>,
        voting_period_blocks: u64,
        quorum_pct: u8,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::GovProposal,
            timestamp,
            sender,
            None,
            &GovProposalPayload {
                proposal_id: proposal_id.into(),
                description: description.into(),
                voting_period_blocks,
                quorum_pct,
            },
        )
    }

    pub fn vote_cast(
        timestamp: Timestamp,
        sender: impl Into<String>,
        proposal_id: impl Into<String>,
        choice: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::VoteCast,
            timestamp,
            sender,
            None,
            &VoteCastPayload {
                proposal_id: proposal_id.into(),
                choice: choice.into(),
            },
        )
    }

    pub fn social_recovery_update(
        timestamp: Timestamp,
        sender: impl Into<String>,
        guardians: Vec<String>,
        threshold: u32,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::SocialRecoveryUpdate,
            timestamp,
            sender,
            None,
            &SocialRecoveryUpdatePayload {
                guardians,
                threshold,
            },
        )
    }

    pub fn app_event(
        timestamp: Timestamp,
        sender: impl Into<String>,
        app_id: impl Into<String>,
        action: impl Into<String>,
        reference: Option<String>,
        target: Option<String>,
        data: Option<serde_json::Value>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::AppEvent,
            timestamp,
            sender,
            None,
            &AppEventPayload {
                app_id: app_id.into(),
                action: action.into(),
                reference,
                target,
                data,
            },
        )
    }

    pub fn node_parent_request(
        timestamp: Timestamp,
        sender: impl Into<String>,
        parent_id: impl Into<String>,
        reason: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, CoreError> {
        Self::with_payload(
            EventType::NodeParentRequest,
            timestamp,
            sender,
            Some(parent_id.into()),
            &NodeParentRequestPayload { reason, metadata },
        )
    }
}

// ── Typed payloads ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisPayload {
    pub chain_epoch: u64,
    pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeJoinPayload {
    pub node_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recovery_phrase_hash: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeParentUpdatePayload {
    pub action: ParentUpdateAction,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<String>,
    /// `None` under `SET` means "become independent" (Open
    /// Questions, resolved as empty-list equivalent — see DESIGN.md).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_parent_ids: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstitutionRegisterPayload {
    pub category: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstitutionVerifyPayload {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstitutionRevokePayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SoulboundMintPayload {
    pub achievement_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub proof_ref: Option<String>,
    pub revocable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KarmaEarnPayload {
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KarmaTransferPayload {
    pub amount: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GovProposalPayload {
    pub proposal_id: String,
    pub description: String,
    pub voting_period_blocks: u64,
    pub quorum_pct: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoteCastPayload {
    pub proposal_id: String,
    pub choice: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocialRecoveryUpdatePayload {
    pub guardians: Vec<String>,
    pub threshold: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppEventPayload {
    pub app_id: String,
    pub action: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none", default)]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeParentRequestPayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_field_order_is_canonical() {
        let ev = Event::karma_earn(10, "node_aaaaaaaaaaaaaaaa", 5, None).unwrap();
        let s = crate::canonical_json::to_canonical_string(&ev).unwrap();
        let type_pos = s.find("\"type\"").unwrap();
        let ts_pos = s.find("\"timestamp\"").unwrap();
        let sender_pos = s.find("\"sender\"").unwrap();
        let recipient_pos = s.find("\"recipient\"").unwrap();
        let payload_pos = s.find("\"payload\"").unwrap();
        assert!(type_pos < ts_pos);
        assert!(ts_pos < sender_pos);
        assert!(sender_pos < recipient_pos);
        assert!(recipient_pos < payload_pos);
    }

    #[test]
    fn missing_required_payload_field_is_malformed() {
        let mut ev = Event::node_join(1, "node_aaaaaaaaaaaaaaaa", "Alice", None, "ab", None)
            .unwrap();
        ev.payload = Some(serde_json::json!({"node_id": "node_aaaaaaaaaaaaaaaa"}));
        let result: Result<NodeJoinPayload, _> = ev.typed_payload();
        assert!(result.is_err());
    }
}
