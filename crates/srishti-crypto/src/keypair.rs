use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use srishti_core::NodeId;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::node_id_suffix_from_public_key;

/// An Ed25519 keypair with its derived `nodeId`.
///
/// The signing key is held in a `Zeroizing<[u8; 32]>` so its bytes are
/// wiped on drop rather than left in freed memory.
pub struct KeyPair {
    node_id: NodeId,
    verifying_key: VerifyingKey,
    signing_key: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    /// Generate a fresh keypair from the system CSPRNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Self::from_signing_key(signing_key)
    }

    /// Restore a keypair from a raw 32-byte Ed25519 seed.
    pub fn from_seed_bytes(seed: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = seed
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(seed.len()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&arr)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let node_id = NodeId::from_public_key_hash(&node_id_suffix_from_public_key(
            verifying_key.as_bytes(),
        ));
        Self {
            node_id,
            verifying_key,
            signing_key: Zeroizing::new(signing_key.to_bytes()),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Raw 32-byte seed, for persisting to a keystore file. Callers must
    /// write it with restrictive permissions and never log it.
    pub fn seed_bytes(&self) -> &[u8; 32] {
        &self.signing_key
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.signing_key);
        signing_key.sign(message).to_bytes().to_vec()
    }

    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ node_id: {:?} }}", self.node_id)
    }
}

/// Verify a signature over `message` against a raw public key.
pub fn verify(public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8]) -> bool {
    let Ok(pk_arr): Result<[u8; 32], _> = public_key_bytes.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&pk_arr) else {
        return false;
    };
    let Ok(sig_arr): Result<[u8; 64], _> = signature_bytes.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_arr);
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trips() {
        let kp = KeyPair::generate();
        let msg = b"hello srishti";
        let sig = kp.sign(msg);
        assert!(verify(&kp.public_key_bytes(), msg, &sig));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"original");
        assert!(!verify(&kp.public_key_bytes(), b"tampered", &sig));
    }

    #[test]
    fn node_id_is_deterministic_from_seed() {
        let seed = [7u8; 32];
        let a = KeyPair::from_seed_bytes(&seed).unwrap();
        let b = KeyPair::from_seed_bytes(&seed).unwrap();
        assert_eq!(a.node_id(), b.node_id());
    }
}
