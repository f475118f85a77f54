//! SHA-256 Merkle tree over a block's event body.
//!
//! Leaves are `SHA-256(canonical-JSON(event))`; internal nodes are
//! `SHA-256(left || right)`; an odd-width level duplicates its last element;
//! an empty body hashes to `SHA-256("")`.

use srishti_core::{CoreError, Event};
use srishti_crypto::hash::sha256_hex;

/// Root hash of the Merkle tree over `events`, hex-encoded.
pub fn merkle_root(events: &[Event]) -> Result<String, CoreError> {
    if events.is_empty() {
        return Ok(sha256_hex(b""));
    }
    let mut level: Vec<String> = events
        .iter()
        .map(|e| srishti_core::canonical_json::to_canonical_string(e).map(|s| sha256_hex(s.as_bytes())))
        .collect::<Result<_, _>>()?;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level.last().unwrap().clone());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut concat = Vec::with_capacity(pair[0].len() + pair[1].len());
                concat.extend_from_slice(pair[0].as_bytes());
                concat.extend_from_slice(pair[1].as_bytes());
                sha256_hex(&concat)
            })
            .collect();
    }
    Ok(level.into_iter().next().unwrap())
}

/// One step of a Merkle proof: the sibling hash and which side it sits on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofStep {
    pub sibling_hash: String,
    pub sibling_is_left: bool,
}

/// Build the inclusion proof for the leaf at `index` in `events`.
pub fn merkle_proof(events: &[Event], index: usize) -> Result<Vec<ProofStep>, CoreError> {
    if index >= events.len() {
        return Err(CoreError::Malformed(format!(
            "merkle proof index {index} out of range for {} events",
            events.len()
        )));
    }
    let mut level: Vec<String> = events
        .iter()
        .map(|e| srishti_core::canonical_json::to_canonical_string(e).map(|s| sha256_hex(s.as_bytes())))
        .collect::<Result<_, _>>()?;
    let mut idx = index;
    let mut proof = Vec::new();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(level.last().unwrap().clone());
        }
        let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        proof.push(ProofStep {
            sibling_hash: level[sibling_idx].clone(),
            sibling_is_left: idx % 2 == 1,
        });
        level = level
            .chunks(2)
            .map(|pair| {
                let mut concat = Vec::with_capacity(pair[0].len() + pair[1].len());
                concat.extend_from_slice(pair[0].as_bytes());
                concat.extend_from_slice(pair[1].as_bytes());
                sha256_hex(&concat)
            })
            .collect();
        idx /= 2;
    }
    Ok(proof)
}

/// Verify `proof` reconstructs `root` starting from `leaf_hash`.
pub fn verify_proof(leaf_hash: &str, proof: &[ProofStep], root: &str) -> bool {
    let mut current = leaf_hash.to_string();
    for step in proof {
        let mut concat = Vec::new();
        if step.sibling_is_left {
            concat.extend_from_slice(step.sibling_hash.as_bytes());
            concat.extend_from_slice(current.as_bytes());
        } else {
            concat.extend_from_slice(current.as_bytes());
            concat.extend_from_slice(step.sibling_hash.as_bytes());
        }
        current = sha256_hex(&concat);
    }
    current == root
}

#[cfg(test)]
mod tests {
    use super::*;
    use srishti_core::Event;

    #[test]
    fn empty_body_hashes_to_empty_string_hash() {
        assert_eq!(merkle_root(&[]).unwrap(), sha256_hex(b""));
    }

    #[test]
    fn single_event_root_is_its_own_leaf_hash() {
        let ev = Event::karma_earn(1, "node_aaaaaaaaaaaaaaaa", 1, None).unwrap();
        let leaf = sha256_hex(
            srishti_core::canonical_json::to_canonical_string(&ev)
                .unwrap()
                .as_bytes(),
        );
        assert_eq!(merkle_root(std::slice::from_ref(&ev)).unwrap(), leaf);
    }

    #[test]
    fn proof_verifies_against_root() {
        let events: Vec<Event> = (0..5)
            .map(|i| Event::karma_earn(i, "node_aaaaaaaaaaaaaaaa", i as u64 + 1, None).unwrap())
            .collect();
        let root = merkle_root(&events).unwrap();
        for i in 0..events.len() {
            let leaf = sha256_hex(
                srishti_core::canonical_json::to_canonical_string(&events[i])
                    .unwrap()
                    .as_bytes(),
            );
            let proof = merkle_proof(&events, i).unwrap();
            assert!(verify_proof(&leaf, &proof, &root), "proof failed at leaf {i}");
        }
    }
}
