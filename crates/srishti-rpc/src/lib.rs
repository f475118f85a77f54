//! srishti-rpc
//!
//! JSON-RPC 2.0 server for Srishti nodes — an ambient local query surface
//! layered on top of a node, not part of the peer-to-peer wire protocol.
//!
//! Namespace: "srishti"
//! Methods:
//!   srishti_getNode                  — node identity record
//!   srishti_getNodeRole               — node's current role
//!   srishti_getInstitution             — institution lifecycle state
//!   srishti_getSoulboundTokens          — credentials minted to a node
//!   srishti_getKarmaBalance              — karma balance
//!   srishti_getProposal                   — governance proposal
//!   srishti_getChainInfo                   — chain epoch/length/latest hash
//!   srishti_getBlock                         — block by index
//!   srishti_getPendingParentRequests           — pending NODE_PARENT_REQUESTs
//!   srishti_submitEvent                         — submit a hex-encoded event

pub mod api;
pub mod server;
pub mod types;

pub use api::SrishtiApiServer;
pub use server::{RpcServer, RpcServerState};
pub use types::{
    RpcChainInfo, RpcInstitution, RpcInstitutionState, RpcNode, RpcParentRequest, RpcProposal,
    RpcRole, RpcSubmitReceipt,
};
