//! Node identity file ("Identity file: {nodeId, name, publicKey,
//! privateKey, recoveryPhraseHash}"). Loaded once at startup; generated on
//! first run and written to disk, run automatically as part of node
//! startup rather than a separate keygen step.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use srishti_core::NodeId;
use srishti_crypto::KeyPair;

use crate::error::NodeError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityFile {
    pub node_id: String,
    pub name: String,
    pub public_key: String,
    pub private_key: String,
    pub recovery_phrase_hash: Option<String>,
}

/// A loaded or freshly-generated identity: the keypair plus the display
/// name and recovery-phrase commitment that go into a `NODE_JOIN` event.
pub struct NodeIdentity {
    pub keypair: KeyPair,
    pub name: String,
    pub recovery_phrase_hash: Option<String>,
}

impl NodeIdentity {
    pub fn node_id(&self) -> &NodeId {
        self.keypair.node_id()
    }

    fn to_file(&self) -> IdentityFile {
        IdentityFile {
            node_id: self.keypair.node_id().as_str().to_string(),
            name: self.name.clone(),
            public_key: self.keypair.public_key_hex(),
            private_key: hex::encode(self.keypair.seed_bytes()),
            recovery_phrase_hash: self.recovery_phrase_hash.clone(),
        }
    }

    /// Load the identity file at `path` if present; otherwise generate a
    /// fresh keypair and recovery phrase, print the phrase once (it is
    /// never stored in plaintext), and write the file.
    ///
    /// This glue both generates *and* loads from the same file location,
    /// since a node process needs its identity on every start.
    pub fn load_or_generate(path: &Path, name: &str) -> Result<Self, NodeError> {
        if path.exists() {
            let json = std::fs::read_to_string(path)?;
            let file: IdentityFile = serde_json::from_str(&json)?;
            let seed = hex::decode(&file.private_key).map_err(|e| NodeError::Hex(e.to_string()))?;
            let keypair = KeyPair::from_seed_bytes(&seed)?;
            return Ok(Self {
                keypair,
                name: file.name,
                recovery_phrase_hash: file.recovery_phrase_hash,
            });
        }

        let keypair = KeyPair::generate();
        let mnemonic = srishti_crypto::mnemonic::mnemonic_from_seed(keypair.seed_bytes())?;
        let phrase = srishti_crypto::mnemonic::mnemonic_phrase(&mnemonic);
        let recovery_phrase_hash = srishti_crypto::mnemonic::recovery_phrase_hash(&phrase);

        warn!(
            node_id = %keypair.node_id(),
            recovery_phrase = %phrase,
            "generated a new node identity — write down the recovery phrase now, it is shown only once"
        );

        let identity = Self {
            keypair,
            name: name.to_string(),
            recovery_phrase_hash: Some(recovery_phrase_hash),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&identity.to_file())?;
        std::fs::write(path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_reloads_identity_stably() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");

        let first = NodeIdentity::load_or_generate(&path, "Alice").unwrap();
        let node_id = first.node_id().clone();

        let second = NodeIdentity::load_or_generate(&path, "ignored on reload").unwrap();
        assert_eq!(second.node_id(), &node_id);
        assert_eq!(second.name, "Alice");
        assert_eq!(second.recovery_phrase_hash, first.recovery_phrase_hash);
    }

    #[test]
    fn fresh_identity_has_a_recovery_phrase_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        let identity = NodeIdentity::load_or_generate(&path, "Bob").unwrap();
        assert!(identity.recovery_phrase_hash.is_some());
    }
}
