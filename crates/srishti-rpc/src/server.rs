use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use srishti_chain::{Block, ChainManager};
use srishti_core::{Event, NodeId};

use crate::api::SrishtiApiServer;
use crate::types::{
    RpcChainInfo, RpcInstitution, RpcInstitutionState, RpcNode, RpcParentRequest, RpcProposal,
    RpcSubmitReceipt,
};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn bad_node_id(e: srishti_core::CoreError) -> ErrorObject<'static> {
    rpc_err(-32602, format!("invalid node id: {e}"))
}

/// Shared state passed to the RPC server ("chain + state is the
/// only contended resource"): reads take a shared lock directly against
/// the chain manager; writes are handed off to the node's single logical
/// executor via `event_sender` rather than mutating the chain from the RPC
/// task.
pub struct RpcServerState {
    pub chain: Arc<RwLock<ChainManager>>,
    pub event_sender: Option<mpsc::Sender<Event>>,
}

pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl SrishtiApiServer for RpcServer {
    async fn get_node(&self, node_id: String) -> RpcResult<Option<RpcNode>> {
        let id = NodeId::parse(node_id).map_err(bad_node_id)?;
        let chain = self.state.chain.read().await;
        let state = chain.state();
        let Some(record) = state.nodes.get(&id) else {
            return Ok(None);
        };
        let role = state.role_of(&id).unwrap_or(srishti_core::Role::User);
        Ok(Some(RpcNode {
            node_id: record.node_id.as_str().to_string(),
            name: record.name.clone(),
            parent_ids: record.parent_ids.iter().map(|p| p.as_str().to_string()).collect(),
            public_key_hex: hex::encode(&record.public_key),
            joined_at: record.joined_at,
            recovery_phrase_hash: record.recovery_phrase_hash.clone(),
            role: role.into(),
        }))
    }

    async fn get_node_role(&self, node_id: String) -> RpcResult<Option<crate::types::RpcRole>> {
        let id = NodeId::parse(node_id).map_err(bad_node_id)?;
        let chain = self.state.chain.read().await;
        Ok(chain.state().role_of(&id).map(Into::into))
    }

    async fn get_institution(&self, node_id: String) -> RpcResult<Option<RpcInstitution>> {
        let id = NodeId::parse(node_id).map_err(bad_node_id)?;
        let chain = self.state.chain.read().await;
        let institutions = &chain.state().institutions;
        let state = if institutions.verified.contains(&id) {
            Some(RpcInstitutionState::Verified)
        } else if institutions.pending.contains(&id) {
            Some(RpcInstitutionState::Pending)
        } else if institutions.revoked.contains(&id) {
            Some(RpcInstitutionState::Revoked)
        } else {
            None
        };
        Ok(state.map(|state| RpcInstitution {
            node_id: id.as_str().to_string(),
            state,
        }))
    }

    async fn get_soulbound_tokens(
        &self,
        node_id: String,
    ) -> RpcResult<Vec<srishti_core::SoulboundCredential>> {
        let id = NodeId::parse(node_id).map_err(bad_node_id)?;
        let chain = self.state.chain.read().await;
        Ok(chain
            .state()
            .soulbound_tokens
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_karma_balance(&self, node_id: String) -> RpcResult<u64> {
        let id = NodeId::parse(node_id).map_err(bad_node_id)?;
        let chain = self.state.chain.read().await;
        Ok(chain.state().karma_of(&id))
    }

    async fn get_proposal(&self, proposal_id: String) -> RpcResult<Option<RpcProposal>> {
        let chain = self.state.chain.read().await;
        let Some(p) = chain.state().proposals.get(&proposal_id) else {
            return Ok(None);
        };
        Ok(Some(RpcProposal {
            proposal_id: p.proposal_id.clone(),
            creator: p.creator.as_str().to_string(),
            description: p.description.clone(),
            voting_ends_at_block_index: p.voting_ends_at_block_index,
            quorum_pct: p.quorum_pct,
            votes: p
                .votes
                .iter()
                .map(|(voter, choice)| (voter.as_str().to_string(), choice.clone()))
                .collect(),
            status: format!("{:?}", p.status).to_uppercase(),
        }))
    }

    async fn get_chain_info(&self) -> RpcResult<RpcChainInfo> {
        let chain = self.state.chain.read().await;
        Ok(RpcChainInfo {
            chain_epoch: chain.chain_epoch(),
            length: chain.length(),
            latest_hash: chain.latest_hash().map(|h| h.to_string()),
        })
    }

    async fn get_block(&self, index: u64) -> RpcResult<Option<Block>> {
        let chain = self.state.chain.read().await;
        Ok(chain.get_block(index).cloned())
    }

    async fn get_pending_parent_requests(
        &self,
        parent_id: String,
    ) -> RpcResult<Vec<RpcParentRequest>> {
        let id = NodeId::parse(parent_id).map_err(bad_node_id)?;
        let chain = self.state.chain.read().await;
        Ok(chain
            .state()
            .pending_parent_requests
            .get(&id)
            .map(|children| {
                children
                    .values()
                    .map(|req| RpcParentRequest {
                        node_id: req.node_id.as_str().to_string(),
                        parent_id: req.parent_id.as_str().to_string(),
                        reason: req.reason.clone(),
                        metadata: req.metadata.clone(),
                        requested_at: req.requested_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn submit_event(&self, event_hex: String) -> RpcResult<RpcSubmitReceipt> {
        let bytes = hex::decode(&event_hex).map_err(|e| rpc_err(-32602, format!("invalid hex: {e}")))?;
        let event: Event =
            serde_json::from_slice(&bytes).map_err(|e| rpc_err(-32602, format!("invalid event encoding: {e}")))?;
        let event_hash = {
            let signing_bytes = event
                .signing_bytes()
                .map_err(|e| rpc_err(-32602, format!("malformed event: {e}")))?;
            srishti_crypto::hash::sha256_hex(&signing_bytes)
        };

        let Some(sender) = &self.state.event_sender else {
            return Err(rpc_err(-32603, "node event pipeline not connected").into());
        };
        let accepted = sender.send(event).await.is_ok();
        if !accepted {
            tracing::warn!("submitEvent: node event pipeline closed");
        }
        Ok(RpcSubmitReceipt { event_hash, accepted })
    }
}
