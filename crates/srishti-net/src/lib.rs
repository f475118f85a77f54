//! Everything a node needs to talk to its peers: the
//! wire protocol, the pluggable transport seam, per-peer connection
//! lifecycle, presence tracking, and the decision logic that drives
//! synchronisation. `srishti-node` owns the actual event loop; this crate
//! only supplies the pieces that loop dispatches to.

pub mod connection;
pub mod message;
pub mod peer_manager;
pub mod presence;
pub mod relay;
pub mod sync;

pub use connection::{on_hello_received, ConnectionState, PeerConnection};
pub use message::{PeerMessage, PROTOCOL_VERSION};
pub use peer_manager::PeerManager;
pub use presence::PresenceTable;
pub use relay::{InProcessHub, InProcessRelay, PeerChange, RelayChannel, RelayEvent};
pub use sync::{
    build_sync_request, classify_sync_response, decide_on_new_block, decide_on_peer_advertisement,
    NewBlockDecision, SyncApplication, SyncDecision, SyncGuard,
};
