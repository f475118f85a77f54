//! srishti-recovery
//!
//! Query helpers over an account's social-recovery configuration and local
//! guardian-quorum evaluation. The state transitions themselves live in
//! `srishti-state`'s `apply_social_recovery_update`; this crate only reads.

pub mod query;
pub mod quorum;

pub use query::RecoveryQuery;
pub use quorum::{quorum_reached, verify_recovery_phrase};
