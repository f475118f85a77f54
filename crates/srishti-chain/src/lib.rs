//! Blocks, the Merkle commitment over their event bodies, fork-choice
//! between competing chains, and the chain manager that ties all three to
//! `srishti-state`'s state machine and persistence.

pub mod block;
pub mod chain;
pub mod fork_choice;
pub mod merkle;

pub use block::{Block, BlockHeader, ParticipationProof};
pub use chain::{create_genesis, ChainManager, GenesisParams};
pub use merkle::{merkle_proof, merkle_root, verify_proof, ProofStep};
