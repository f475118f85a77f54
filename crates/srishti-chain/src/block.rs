use serde::{Deserialize, Serialize};
use srishti_core::{BlockIndex, CoreError, Event, NodeId, Timestamp};
use srishti_crypto::hash::sha256_hex;

use crate::merkle::merkle_root;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous_hash: String,
    pub timestamp: Timestamp,
    pub nonce: u64,
    pub merkle_root: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipationProof {
    pub node_id: NodeId,
    /// Normalised participation score in `[0, 1]`.
    pub score: f64,
    pub timestamp: Timestamp,
}

/// The fields that go into a block's content hash, in their canonical
/// declaration order: `{index, header, proposer, participationProof}`.
#[derive(Serialize)]
struct HashInput<'a> {
    index: BlockIndex,
    header: &'a BlockHeader,
    proposer: &'a NodeId,
    participation_proof: &'a ParticipationProof,
}

/// A block: header + body + envelope metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub index: BlockIndex,
    pub header: BlockHeader,
    pub body: Vec<Event>,
    pub proposer: NodeId,
    pub participation_proof: ParticipationProof,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
}

impl Block {
    /// Build an unsigned, unhashed block shell; call [`Block::compute_hash`]
    /// before using it anywhere a hash is required.
    pub fn new(
        index: BlockIndex,
        previous_hash: String,
        timestamp: Timestamp,
        body: Vec<Event>,
        proposer: NodeId,
        participation_proof: ParticipationProof,
    ) -> Self {
        let mut block = Self {
            index,
            header: BlockHeader {
                previous_hash,
                timestamp,
                nonce: 0,
                merkle_root: String::new(),
            },
            body,
            proposer,
            participation_proof,
            hash: String::new(),
            signature: None,
        };
        block
            .compute_hash()
            .expect("freshly built block body must canonicalise");
        block
    }

    /// Recompute `header.merkleRoot` from `body`, then recompute `hash` from
    /// `{index, header, proposer, participationProof}`. Idempotent: calling
    /// this twice on an otherwise-unchanged block yields the same hash.
    pub fn compute_hash(&mut self) -> Result<(), CoreError> {
        self.header.merkle_root = merkle_root(&self.body)?;
        let input = HashInput {
            index: self.index,
            header: &self.header,
            proposer: &self.proposer,
            participation_proof: &self.participation_proof,
        };
        let canonical = srishti_core::canonical_json::to_canonical_string(&input)?;
        self.hash = sha256_hex(canonical.as_bytes());
        Ok(())
    }

    /// Recompute what `hash` and `header.merkleRoot` *should* be without
    /// mutating `self`, for validation.
    fn recompute(&self) -> Result<(String, String), CoreError> {
        let merkle = merkle_root(&self.body)?;
        let mut header = self.header.clone();
        header.merkle_root = merkle.clone();
        let input = HashInput {
            index: self.index,
            header: &header,
            proposer: &self.proposer,
            participation_proof: &self.participation_proof,
        };
        let canonical = srishti_core::canonical_json::to_canonical_string(&input)?;
        Ok((sha256_hex(canonical.as_bytes()), merkle))
    }

    /// Structural check: the hash and Merkle root stored on the
    /// block actually match what its contents recompute to, and (for
    /// non-genesis blocks) a previous hash is present.
    pub fn is_valid(&self) -> bool {
        if self.index > 0 && self.header.previous_hash.is_empty() {
            return false;
        }
        match self.recompute() {
            Ok((hash, merkle)) => hash == self.hash && merkle == self.header.merkle_root,
            Err(_) => false,
        }
    }

    pub fn event_bytes_to_sign(&self) -> Result<Vec<u8>, CoreError> {
        let input = HashInput {
            index: self.index,
            header: &self.header,
            proposer: &self.proposer,
            participation_proof: &self.participation_proof,
        };
        srishti_core::canonical_json::to_canonical_bytes(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srishti_core::Event;

    fn proposer() -> NodeId {
        NodeId::parse("node_aaaaaaaaaaaaaaaa").unwrap()
    }

    fn proof(ts: Timestamp) -> ParticipationProof {
        ParticipationProof {
            node_id: proposer(),
            score: 1.0,
            timestamp: ts,
        }
    }

    #[test]
    fn compute_hash_is_idempotent() {
        let body = vec![Event::karma_earn(1, "node_aaaaaaaaaaaaaaaa", 5, None).unwrap()];
        let mut b = Block::new(1, "prevhash".into(), 10, body, proposer(), proof(10));
        let hash1 = b.hash.clone();
        b.compute_hash().unwrap();
        assert_eq!(hash1, b.hash);
    }

    #[test]
    fn is_valid_detects_tampering() {
        let body = vec![Event::karma_earn(1, "node_aaaaaaaaaaaaaaaa", 5, None).unwrap()];
        let mut b = Block::new(1, "prevhash".into(), 10, body, proposer(), proof(10));
        assert!(b.is_valid());
        b.header.nonce = 99;
        assert!(!b.is_valid());
    }

    #[test]
    fn genesis_block_allows_empty_previous_hash() {
        let b = Block::new(0, String::new(), 1, vec![], proposer(), proof(1));
        assert!(b.is_valid());
    }
}
