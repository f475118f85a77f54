use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use srishti_chain::Block;
use srishti_core::SoulboundCredential;

use crate::types::{
    RpcChainInfo, RpcInstitution, RpcNode, RpcParentRequest, RpcProposal, RpcRole,
    RpcSubmitReceipt,
};

/// Srishti JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "srishti_" via `namespace = "srishti"`.
#[rpc(server, namespace = "srishti")]
pub trait SrishtiApi {
    /// Get a node's identity record by node id.
    #[method(name = "getNode")]
    async fn get_node(&self, node_id: String) -> RpcResult<Option<RpcNode>>;

    /// Get a node's current role (User/Institution/GovernanceAdmin/Root).
    #[method(name = "getNodeRole")]
    async fn get_node_role(&self, node_id: String) -> RpcResult<Option<RpcRole>>;

    /// Get an institution's lifecycle state (Pending/Verified/Revoked), or
    /// `null` if `node_id` has never registered as an institution.
    #[method(name = "getInstitution")]
    async fn get_institution(&self, node_id: String) -> RpcResult<Option<RpcInstitution>>;

    /// List the soulbound credentials minted to a node.
    #[method(name = "getSoulboundTokens")]
    async fn get_soulbound_tokens(&self, node_id: String) -> RpcResult<Vec<SoulboundCredential>>;

    /// Get a node's karma balance (0 if unknown).
    #[method(name = "getKarmaBalance")]
    async fn get_karma_balance(&self, node_id: String) -> RpcResult<u64>;

    /// Get a governance proposal by id.
    #[method(name = "getProposal")]
    async fn get_proposal(&self, proposal_id: String) -> RpcResult<Option<RpcProposal>>;

    /// Get chain-level summary info: chain epoch, length, latest hash.
    #[method(name = "getChainInfo")]
    async fn get_chain_info(&self) -> RpcResult<RpcChainInfo>;

    /// Get a block by index.
    #[method(name = "getBlock")]
    async fn get_block(&self, index: u64) -> RpcResult<Option<Block>>;

    /// List pending `NODE_PARENT_REQUEST`s addressed to `parent_id`.
    #[method(name = "getPendingParentRequests")]
    async fn get_pending_parent_requests(
        &self,
        parent_id: String,
    ) -> RpcResult<Vec<RpcParentRequest>>;

    /// Submit a hex-encoded canonical-JSON event for local proposal into
    /// the next block. The event's own declared fields (type, timestamp,
    /// sender, ...) must already be fully formed and, where required,
    /// signed by the caller.
    #[method(name = "submitEvent")]
    async fn submit_event(&self, event_hex: String) -> RpcResult<RpcSubmitReceipt>;
}
