pub mod canonical_json;
pub mod constants;
pub mod error;
pub mod event;
pub mod types;

pub use error::CoreError;
pub use event::{Event, EventType};
pub use types::{
    AccountRecoveryState, BlockIndex, NodeId, NodeRecord, ParentRequest, ParentUpdateAction,
    Proposal, ProposalStatus, Role, SoulboundCredential, Timestamp, VoteChoice,
};
