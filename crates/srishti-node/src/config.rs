//! Node configuration: the `chainEpoch`, genesis token, and timing budgets
//! an operator may need to tune per deployment, loaded from an optional
//! JSON file and overridable from the CLI, as plain serde-derived structs.
//!
//! The gossip fanout/TTL/dedup-window and rate-limit bucket sizes are *not*
//! duplicated here as live overrides: `srishti-core::constants` documents
//! them as protocol-wide invariants every node must agree on, and
//! `srishti-consensus`/`srishti-net` already read them directly. This struct
//! only covers genuinely per-node operator knobs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Genesis parameters for a fresh network, loaded from `--genesis-params`
/// ("Configuration: CHAIN_EPOCH"). Only meaningful on the node
/// that bootstraps a brand-new chain; a node joining an existing network via
/// `--bootstrap` never calls `create_genesis` and ignores this file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisFileParams {
    pub chain_epoch: u64,
    pub token: String,
}

/// Per-node operator configuration (timing budgets): loaded from
/// an optional JSON file, then selectively overridden by CLI flags in
/// `main.rs`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SrishtiConfig {
    pub heartbeat_interval_ms: u64,
    pub resync_tick_interval_ms: u64,
    pub sync_overall_timeout_ms: u64,
}

impl Default for SrishtiConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: srishti_core::constants::HEARTBEAT_INTERVAL_MS,
            resync_tick_interval_ms: srishti_core::constants::RESYNC_TICK_INTERVAL_MS,
            sync_overall_timeout_ms: srishti_core::constants::SYNC_OVERALL_TIMEOUT_MS,
        }
    }
}

impl SrishtiConfig {
    /// Load from `path` if given, falling back to protocol defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        match path {
            Some(p) => {
                let json = std::fs::read_to_string(p)?;
                Ok(serde_json::from_str(&json)?)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_protocol_constants() {
        let cfg = SrishtiConfig::default();
        assert_eq!(cfg.heartbeat_interval_ms, srishti_core::constants::HEARTBEAT_INTERVAL_MS);
    }

    #[test]
    fn missing_path_falls_back_to_default() {
        let cfg = SrishtiConfig::load(None).unwrap();
        assert_eq!(cfg.resync_tick_interval_ms, srishti_core::constants::RESYNC_TICK_INTERVAL_MS);
    }

    #[test]
    fn loads_overrides_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"heartbeat_interval_ms": 1234}"#).unwrap();
        let cfg = SrishtiConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.heartbeat_interval_ms, 1234);
        assert_eq!(cfg.resync_tick_interval_ms, srishti_core::constants::RESYNC_TICK_INTERVAL_MS);
    }
}
