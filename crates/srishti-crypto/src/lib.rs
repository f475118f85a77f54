//! Cryptographic primitives: Ed25519 keypairs, SHA-256 hashing, and BIP-39
//! recovery phrases — the classical, PoW-free primitives this protocol
//! calls for (see DESIGN.md for the dependency rationale).

pub mod error;
pub mod hash;
pub mod keypair;
pub mod mnemonic;

pub use error::CryptoError;
pub use hash::{node_id_suffix_from_public_key, sha256, sha256_hex};
pub use keypair::{verify, KeyPair};
