use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data`, hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive a `nodeId` suffix (first 16 hex chars of `SHA-256(publicKeyRaw)`)
/// from a raw Ed25519 public key.
pub fn node_id_suffix_from_public_key(pubkey_bytes: &[u8]) -> String {
    sha256_hex(pubkey_bytes)[..16].to_string()
}
