//! Fork-choice: total order over candidate chains sharing the same genesis
//! epoch. Longer chain wins; ties broken by earlier genesis timestamp,
//! then by lexicographically smaller genesis hash.

use std::cmp::Ordering;

use crate::block::Block;

/// Compare two chains under the fork-choice rule. `Ordering::Greater` means
/// `a` wins over `b`.
pub fn compare(a: &[Block], b: &[Block]) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {}
        other => return other,
    }
    let (Some(ga), Some(gb)) = (a.first(), b.first()) else {
        return Ordering::Equal;
    };
    match gb.header.timestamp.cmp(&ga.header.timestamp) {
        Ordering::Equal => gb.hash.cmp(&ga.hash),
        other => other,
    }
}

/// `true` if `candidate` beats `current` under fork-choice.
pub fn wins(candidate: &[Block], current: &[Block]) -> bool {
    compare(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ParticipationProof;
    use srishti_core::NodeId;

    fn genesis_at(ts: i64) -> Block {
        let proposer = NodeId::parse("node_aaaaaaaaaaaaaaaa").unwrap();
        Block::new(
            0,
            String::new(),
            ts,
            vec![],
            proposer.clone(),
            ParticipationProof {
                node_id: proposer,
                score: 1.0,
                timestamp: ts,
            },
        )
    }

    #[test]
    fn longer_chain_wins() {
        let short = vec![genesis_at(1)];
        let long = vec![genesis_at(1), genesis_at(2)];
        assert!(wins(&long, &short));
        assert!(!wins(&short, &long));
    }

    #[test]
    fn earlier_genesis_timestamp_wins_on_tie() {
        let earlier = vec![genesis_at(5)];
        let later = vec![genesis_at(10)];
        assert!(wins(&earlier, &later));
        assert!(!wins(&later, &earlier));
    }

    #[test]
    fn smaller_genesis_hash_wins_on_full_tie() {
        let mut a = vec![genesis_at(5)];
        let mut b = vec![genesis_at(5)];
        // Force distinct hashes while keeping timestamps equal.
        a[0].header.nonce = 1;
        a[0].compute_hash().unwrap();
        b[0].header.nonce = 2;
        b[0].compute_hash().unwrap();
        let smaller_wins = if a[0].hash < b[0].hash { &a } else { &b };
        let larger = if a[0].hash < b[0].hash { &b } else { &a };
        assert!(wins(smaller_wins, larger));
    }
}
