//! Protocol-wide defaults: gossip shape, rate-limit buckets, karma rewards,
//! and timing budgets. Plain `const`s rather than a config struct, since
//! these are protocol invariants every node must agree on, not per-node
//! operator settings (those live in `srishti-node`'s CLI/config layer).

/// Number of peers a node gossips a message to on first receipt.
pub const GOSSIP_FANOUT: usize = 3;

/// Hop budget a gossiped message starts with; decremented on each forward,
/// dropped at zero.
pub const GOSSIP_TTL: u8 = 10;

/// Sliding window over which a message id is remembered for de-duplication.
pub const GOSSIP_DEDUP_WINDOW_MS: u64 = 60_000;

/// Blocks accepted per minute from a single peer under normal rate limiting.
pub const RATE_LIMIT_BLOCKS_PER_MINUTE: u32 = 10;

/// Multiplier applied to `RATE_LIMIT_BLOCKS_PER_MINUTE` for a peer whose node
/// joined within the last rate-limit window (new nodes are throttled harder
/// to blunt churn-driven flooding during bootstrap).
pub const RATE_LIMIT_NEW_NODE_MULTIPLIER: f64 = 0.1;

/// SYNC_REQUEST/SYNC_RESPONSE messages accepted per minute per peer.
pub const RATE_LIMIT_SYNC_PER_MINUTE: u32 = 20;

/// HEARTBEAT messages accepted per minute per peer.
pub const RATE_LIMIT_HEARTBEAT_PER_MINUTE: u32 = 100;

/// Karma awarded for each event type that earns karma automatically
/// (via a system-issued `KARMA_EARN`, applied by the node producing the
/// triggering event rather than encoded redundantly on the wire).
pub mod karma_rewards {
    pub const NODE_JOIN: u64 = 10;
    pub const INSTITUTION_VERIFY: u64 = 25;
    pub const SOULBOUND_MINT_RECIPIENT: u64 = 15;
    pub const GOV_PROPOSAL: u64 = 5;
    pub const VOTE_CAST: u64 = 1;
}

/// Timeout for a single SYNC_REQUEST/SYNC_RESPONSE round-trip.
pub const SYNC_SHORT_TIMEOUT_MS: u64 = 3_000;

/// Timeout allotted for a sync that spans multiple round-trips (e.g. an
/// initial full-chain catch-up).
pub const SYNC_LONG_TIMEOUT_MS: u64 = 8_000;

/// Upper bound on an entire sync session before it is abandoned and the
/// sync guard is released.
pub const SYNC_OVERALL_TIMEOUT_MS: u64 = 30_000;

/// Interval between outgoing HEARTBEAT messages to each connected peer.
pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Interval on which a node re-evaluates whether it should initiate a sync
/// with a peer (fork-choice check against known peer chain tips).
pub const RESYNC_TICK_INTERVAL_MS: u64 = 15_000;
