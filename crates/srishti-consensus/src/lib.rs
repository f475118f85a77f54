//! Gossip dissemination and rate limiting — the two
//! pieces of consensus-adjacent bookkeeping that sit in front of the chain
//! manager but never touch `WorldState` directly.

pub mod gossip;
pub mod rate_limit;

pub use gossip::{
    block_message_id, decrement_ttl, generic_message_id, select_fanout_peers, should_reforward,
    GossipDedup,
};
pub use rate_limit::{MessageKind, RateLimiter};

/// Identifies a transport-level connection, independent of the node id the
/// peer on the other end advertises in `HELLO` ("second window
/// ... keyed by connection id").
pub type ConnectionId = u64;
