use bip39::Mnemonic;

use crate::error::CryptoError;
use crate::hash::sha256_hex;

/// Derive a 12-word BIP-39 mnemonic deterministically from a private key's
/// raw bytes. The mnemonic is a recovery aid only — the entropy it encodes
/// is never itself used to re-derive the signing key. 32 bytes of entropy
/// yields 24 words under BIP-39; only the first 16 bytes of the seed go into
/// the mnemonic so it stays a 12-word recovery phrase.
pub fn mnemonic_from_seed(seed: &[u8; 32]) -> Result<Mnemonic, CryptoError> {
    Mnemonic::from_entropy(&seed[..16]).map_err(|e| CryptoError::Mnemonic(e.to_string()))
}

/// The phrase a node shows its operator, space-joined.
pub fn mnemonic_phrase(mnemonic: &Mnemonic) -> String {
    mnemonic.to_string()
}

/// Hash of the recovery phrase as stored on-chain (`NODE_JOIN.recoveryPhraseHash`):
/// the node publishes only this hash, never the phrase itself.
pub fn recovery_phrase_hash(phrase: &str) -> String {
    sha256_hex(phrase.as_bytes())
}

/// Parse and validate a mnemonic phrase an operator has typed back in during
/// account recovery.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, CryptoError> {
    Mnemonic::parse_normalized(phrase).map_err(|e| CryptoError::Mnemonic(e.to_string()))
}
