//! Presence table fed by `HEARTBEAT` messages.
//!
//! A direct heartbeat is authoritative: the node is telling us its own
//! status, so it always overwrites whatever we had. A piggybacked
//! `knownOnline` claim about a third node is hearsay: it only fills a gap
//! (we had no entry) or updates an existing entry if the claim is strictly
//! newer (DESIGN.md Open Question 4).

use std::collections::HashMap;

use srishti_core::NodeId;

#[derive(Clone, Debug)]
struct PresenceEntry {
    online: bool,
    updated_at_ms: u64,
}

#[derive(Default)]
pub struct PresenceTable {
    entries: HashMap<NodeId, PresenceEntry>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a direct `HEARTBEAT{nodeId, isOnline}` from its source.
    pub fn record_direct(&mut self, node_id: NodeId, is_online: bool, now_ms: u64) {
        self.entries.insert(
            node_id,
            PresenceEntry {
                online: is_online,
                updated_at_ms: now_ms,
            },
        );
    }

    /// Record a piggybacked claim (one entry of another node's
    /// `knownOnline[]`) about `node_id`, timestamped at the carrying
    /// heartbeat's `now_ms`. Only applied if we have no entry yet, or the
    /// claim is strictly newer than what we have.
    pub fn record_piggybacked(&mut self, node_id: NodeId, claimed_online: bool, now_ms: u64) {
        match self.entries.get(&node_id) {
            Some(existing) if existing.updated_at_ms >= now_ms => {}
            _ => {
                self.entries.insert(
                    node_id,
                    PresenceEntry {
                        online: claimed_online,
                        updated_at_ms: now_ms,
                    },
                );
            }
        }
    }

    pub fn is_online(&self, node_id: &NodeId) -> Option<bool> {
        self.entries.get(node_id).map(|e| e.online)
    }

    /// All node ids currently believed online, for populating an outgoing
    /// heartbeat's `knownOnline[]`.
    pub fn known_online(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.online)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u8) -> NodeId {
        NodeId::parse(format!("node_{:016x}", n)).unwrap()
    }

    #[test]
    fn direct_heartbeat_always_overwrites() {
        let mut table = PresenceTable::new();
        table.record_piggybacked(node(1), true, 100);
        table.record_direct(node(1), false, 50);
        assert_eq!(table.is_online(&node(1)), Some(false));
    }

    #[test]
    fn piggyback_fills_gap() {
        let mut table = PresenceTable::new();
        table.record_piggybacked(node(1), true, 10);
        assert_eq!(table.is_online(&node(1)), Some(true));
    }

    #[test]
    fn piggyback_does_not_overwrite_newer_entry() {
        let mut table = PresenceTable::new();
        table.record_piggybacked(node(1), true, 100);
        table.record_piggybacked(node(1), false, 50);
        assert_eq!(table.is_online(&node(1)), Some(true));
    }

    #[test]
    fn strictly_newer_piggyback_updates() {
        let mut table = PresenceTable::new();
        table.record_piggybacked(node(1), true, 100);
        table.record_piggybacked(node(1), false, 200);
        assert_eq!(table.is_online(&node(1)), Some(false));
    }
}
