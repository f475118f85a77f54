//! Node lifecycle glue: owns the chain manager, the
//! peer bookkeeping, and the single cooperative event loop that funnels
//! relay messages, locally-authored events, and timers into the chain
//! manager's serialised API.
//!
//! A single `tokio::select!` loop fed by channels: no global singletons,
//! just a per-process `Node` value passed explicitly through dependency
//! injection, with no hidden module state. Concurrent tasks funnel work
//! into this loop through message channels so no two tasks concurrently
//! mutate the chain or state. `RelayChannel`'s receiver stands in for
//! whatever the underlying transport happens to be.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use srishti_chain::{create_genesis, Block, ChainManager, GenesisParams as ChainGenesisParams};
use srishti_consensus::{select_fanout_peers, MessageKind};
use srishti_core::{BlockIndex, Event, EventType, NodeId, Timestamp};
use srishti_net::{
    build_sync_request, classify_sync_response, decide_on_new_block, decide_on_peer_advertisement,
    ConnectionState, NewBlockDecision, PeerChange, PeerManager, PeerMessage, RelayChannel,
    RelayEvent, SyncApplication, SyncDecision, PROTOCOL_VERSION,
};
use srishti_state::StateDb;

use crate::config::SrishtiConfig;
use crate::error::NodeError;
use crate::events::NodeEvent;
use crate::identity::NodeIdentity;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn now_secs() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as Timestamp
}

/// A running node: the chain + state pair (shared with `srishti-rpc` behind
/// a `RwLock`, since it is the only contended resource), the peer
/// bookkeeping the event loop alone mutates, and the relay handle used to
/// reach other nodes.
pub struct Node {
    pub identity: NodeIdentity,
    pub chain: Arc<RwLock<ChainManager>>,
    config: SrishtiConfig,
    relay: Arc<dyn RelayChannel>,
    peers: PeerManager,
    events_tx: broadcast::Sender<NodeEvent>,
}

/// Parameters for bootstrapping a brand-new network's genesis block, as
/// opposed to opening a store that may already hold one.
pub struct GenesisToken {
    pub chain_epoch: u64,
    pub token: String,
}

impl Node {
    /// Open (or create) the persistent store at `data_dir`, load or
    /// generate `identity`, and build an empty-peer-table node ready to
    /// `run`. If the store is fresh and `genesis` is given, a genesis block
    /// (and an immediate self-`NODE_JOIN`, promoting this node to `ROOT`) is
    /// authored; otherwise the node starts with whatever chain the store
    /// already held — including, for a brand-new store with no `genesis`
    /// argument, an empty chain that waits to be populated by a sync from a
    /// peer.
    pub fn bootstrap(
        data_dir: &std::path::Path,
        identity: NodeIdentity,
        chain_epoch: u64,
        genesis: Option<GenesisToken>,
        config: SrishtiConfig,
        relay: Arc<dyn RelayChannel>,
    ) -> Result<Self, NodeError> {
        let db = StateDb::open(data_dir, chain_epoch)?;
        db.put_key(identity.node_id().as_str(), identity.keypair.seed_bytes())?;
        let mut chain = ChainManager::open(db, chain_epoch)?;

        if chain.length() == 0 {
            if let Some(genesis) = genesis {
                let ts = now_secs();
                let genesis_block = create_genesis(&ChainGenesisParams {
                    chain_epoch: genesis.chain_epoch,
                    token: genesis.token,
                    timestamp: ts,
                    proposer: identity.node_id().clone(),
                });
                chain.add_block(genesis_block)?;

                let join = Event::node_join(
                    ts,
                    identity.node_id().as_str(),
                    identity.name.clone(),
                    None,
                    identity.keypair.public_key_hex(),
                    identity.recovery_phrase_hash.clone(),
                )?;
                let join_block = author_block(&chain, &identity, vec![join], ts);
                chain.add_block(join_block)?;
                info!(node_id = %identity.node_id(), "bootstrapped fresh genesis and self-join");
            } else {
                info!("opened empty store with no genesis params — waiting to sync from a peer");
            }
        } else {
            info!(length = chain.length(), "resumed existing chain from local store");
        }

        let (events_tx, _) = broadcast::channel(256);
        Ok(Self {
            identity,
            chain: Arc::new(RwLock::new(chain)),
            config,
            relay,
            peers: PeerManager::new(chain_epoch),
            events_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: NodeEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Run the node's single cooperative loop until `shutdown`
    /// resolves. `relay_rx` is the receiver half of whatever `RelayChannel`
    /// implementation `relay` is the sender half of (e.g. `InProcessHub`'s
    /// `join()` pair); `local_events` carries events authored locally (by
    /// `srishti-rpc`'s `submitEvent`, or by this process's own CLI) for
    /// packaging into blocks.
    pub async fn run(
        mut self,
        mut relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
        mut local_events: mpsc::Receiver<Event>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<(), NodeError> {
        let mut heartbeat_tick = interval(Duration::from_millis(self.config.heartbeat_interval_ms));
        heartbeat_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut resync_tick = interval(Duration::from_millis(self.config.resync_tick_interval_ms));
        resync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.announce_hello().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("node shutting down");
                    return Ok(());
                }
                maybe_event = relay_rx.recv() => {
                    match maybe_event {
                        Some(evt) => self.handle_relay_event(evt).await,
                        None => {
                            warn!("relay channel closed — stopping node loop");
                            return Ok(());
                        }
                    }
                }
                maybe_local = local_events.recv() => {
                    match maybe_local {
                        Some(event) => self.propose_local_event(event).await,
                        None => debug!("local event submission channel closed"),
                    }
                }
                _ = heartbeat_tick.tick() => self.send_heartbeat().await,
                _ = resync_tick.tick() => self.resync_with_known_peers().await,
            }
        }
    }

    async fn announce_hello(&self) {
        let chain = self.chain.read().await;
        let hello = PeerMessage::Hello {
            timestamp: now_secs(),
            node_id: self.identity.node_id().clone(),
            public_key: Some(self.identity.keypair.public_key_hex()),
            chain_length: chain.length(),
            latest_hash: chain.latest_hash().unwrap_or_default().to_string(),
            protocol_version: PROTOCOL_VERSION,
            chain_epoch: chain.chain_epoch(),
        };
        drop(chain);
        if let Ok(json) = hello.to_json() {
            let _ = self.relay.broadcast(json).await;
        }
    }

    async fn send_heartbeat(&mut self) {
        let known_online = self.peers.known_online();
        let msg = PeerMessage::Heartbeat {
            timestamp: now_secs(),
            node_id: self.identity.node_id().clone(),
            is_online: true,
            known_online,
        };
        if let Ok(json) = msg.to_json() {
            let _ = self.relay.broadcast(json).await;
        }
    }

    /// Re-evaluate every compatible peer's last-advertised tip and request a
    /// sync if any of them imply we're behind or diverged. This is the 15s
    /// resync tick, for peers whose advertisement arrived between `HELLO`s
    /// without a fresh `NEW_BLOCK` prompting an immediate sync.
    async fn resync_with_known_peers(&mut self) {
        let (our_length, our_hash) = {
            let chain = self.chain.read().await;
            (chain.length(), chain.latest_hash().map(|h| h.to_string()))
        };
        for peer in self.peers.compatible_peers() {
            let Some((peer_length, peer_hash)) = self.peers.advertised_tip(&peer) else {
                continue;
            };
            let decision =
                decide_on_peer_advertisement(our_length, our_hash.as_deref(), peer_length, peer_hash);
            if let SyncDecision::RequestSync { from_index } = decision {
                self.request_sync(&peer, from_index, our_length, our_hash.as_deref()).await;
            }
        }
    }

    async fn request_sync(
        &mut self,
        peer: &NodeId,
        from_index: BlockIndex,
        our_length: BlockIndex,
        our_hash: Option<&str>,
    ) {
        if !self.peers.sync_guard_mut().try_begin(peer, std::time::Instant::now()) {
            return;
        }
        let msg = build_sync_request(now_secs(), from_index, our_length, our_hash.unwrap_or_default());
        if let Ok(json) = msg.to_json() {
            let _ = self.relay.send(peer, json).await;
        }
    }

    async fn handle_relay_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::PeerChange { node_id, change: PeerChange::Joined } => {
                self.peers.on_peer_joined(node_id.clone());
                self.emit(NodeEvent::PeerStateChanged {
                    node_id,
                    state: ConnectionState::Connecting,
                });
                self.announce_hello().await;
            }
            RelayEvent::PeerChange { node_id, change: PeerChange::Left } => {
                self.peers.on_peer_left(&node_id);
                self.emit(NodeEvent::PeerLeft { node_id });
            }
            RelayEvent::Message { from, payload } => {
                let Ok(msg) = PeerMessage::from_json(&payload) else {
                    debug!(%from, "dropping malformed peer message");
                    return;
                };
                self.handle_peer_message(from, msg).await;
            }
        }
    }

    async fn node_age_ms(&self, node_id: &NodeId) -> Option<u64> {
        let chain = self.chain.read().await;
        let record = chain.state().nodes.get(node_id)?;
        let joined_at_ms = (record.joined_at.max(0) as u64).saturating_mul(1000);
        Some(now_ms().saturating_sub(joined_at_ms))
    }

    async fn handle_peer_message(&mut self, from: NodeId, msg: PeerMessage) {
        match msg {
            PeerMessage::Hello {
                node_id,
                chain_length,
                latest_hash,
                chain_epoch,
                ..
            } => {
                let state = self.peers.on_hello(&node_id, chain_epoch, chain_length, latest_hash.clone());
                self.emit(NodeEvent::PeerStateChanged { node_id: node_id.clone(), state });
                if state != ConnectionState::Compatible {
                    warn!(%node_id, "rejecting peer: chain epoch mismatch");
                    return;
                }
                let our_length = self.chain.read().await.length();
                let our_hash = self.chain.read().await.latest_hash().map(|h| h.to_string());
                let decision =
                    decide_on_peer_advertisement(our_length, our_hash.as_deref(), chain_length, &latest_hash);
                if let SyncDecision::RequestSync { from_index } = decision {
                    self.request_sync(&node_id, from_index, our_length, our_hash.as_deref()).await;
                }
            }
            PeerMessage::SyncRequest { from_index, .. } => {
                if !self.admit(&from, MessageKind::Sync).await {
                    return;
                }
                let chain = self.chain.read().await;
                let blocks: Vec<Block> = chain
                    .chain()
                    .iter()
                    .filter(|b| b.index >= from_index)
                    .cloned()
                    .collect();
                let response = PeerMessage::SyncResponse {
                    timestamp: now_secs(),
                    chain_length: chain.length(),
                    blocks,
                };
                drop(chain);
                if let Ok(json) = response.to_json() {
                    let _ = self.relay.send(&from, json).await;
                }
            }
            PeerMessage::SyncResponse { blocks, .. } => {
                self.peers.sync_guard_mut().complete(&from);
                self.apply_sync_response(&from, blocks).await;
            }
            PeerMessage::NewBlock { block, ttl } => {
                if !self.admit(&from, MessageKind::Block).await {
                    return;
                }
                self.handle_new_block(from, block, ttl).await;
            }
            PeerMessage::Heartbeat { node_id, is_online, known_online, .. } => {
                if !self.admit(&from, MessageKind::Heartbeat).await {
                    return;
                }
                let now = now_ms();
                self.peers.record_direct_heartbeat(node_id, is_online, now);
                for known in known_online {
                    self.peers.record_piggybacked_presence(known, true, now);
                }
            }
            PeerMessage::ParentRequest { node_id, parent_id, reason, .. } => {
                self.emit(NodeEvent::ParentRequestReceived { node_id, parent_id, reason });
            }
            PeerMessage::ParentResponse { request_node_id, parent_id, approved, .. } => {
                self.emit(NodeEvent::ParentResponseReceived {
                    request_node_id,
                    parent_id,
                    approved,
                });
            }
        }
    }

    async fn admit(&mut self, from: &NodeId, kind: MessageKind) -> bool {
        let age = self.node_age_ms(from).await;
        self.peers.admit(from, kind, age, now_ms())
    }

    async fn apply_sync_response(&mut self, from: &NodeId, blocks: Vec<Block>) {
        let Some(application) = classify_sync_response(blocks) else {
            return;
        };
        match application {
            SyncApplication::Replace(candidate) => {
                let discarded = self.chain.read().await.chain().to_vec();
                let replaced = {
                    let mut chain = self.chain.write().await;
                    chain.replace_chain(candidate.clone())
                };
                match replaced {
                    Ok(true) => {
                        let (length, latest_hash) = {
                            let chain = self.chain.read().await;
                            (chain.length(), chain.latest_hash().map(|h| h.to_string()))
                        };
                        self.emit(NodeEvent::ChainReplaced { length, latest_hash });
                        info!(%from, length, "replaced local chain after sync");
                        // Re-inject unique NODE_JOINs from both the chain we
                        // just discarded and the one that replaced it: always
                        // run mergeUniqueNodes against both the received and
                        // discarded chains.
                        self.merge_and_gossip(&discarded).await;
                        self.merge_and_gossip(&candidate).await;
                    }
                    Ok(false) => {
                        debug!(%from, "candidate chain did not win fork-choice");
                        self.merge_and_gossip(&candidate).await;
                    }
                    Err(e) => warn!(%from, error = %e, "rejecting candidate chain"),
                }
            }
            SyncApplication::Append(blocks) => {
                let mut chain = self.chain.write().await;
                for block in blocks {
                    let index = block.index;
                    match chain.add_block(block) {
                        Ok(true) => {
                            let hash = chain.latest_hash().unwrap_or_default().to_string();
                            self.emit(NodeEvent::ChainExtended { index, hash });
                        }
                        Ok(false) => debug!(%from, index, "incremental sync block rejected (benign)"),
                        Err(e) => {
                            warn!(%from, index, error = %e, "incremental sync block rejected");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Run `mergeUniqueNodes` against `other_blocks` and gossip any blocks
    /// it appended, so the peer who sent us the merged-against chain (and
    /// everyone downstream of our gossip) also learns about the
    /// re-injected identities.
    async fn merge_and_gossip(&mut self, other_blocks: &[Block]) {
        let appended = {
            let mut chain = self.chain.write().await;
            chain.merge_unique_nodes(other_blocks, self.identity.node_id(), now_secs())
        };
        match appended {
            Ok(blocks) => {
                for block in blocks {
                    let index = block.index;
                    let hash = block.hash.clone();
                    self.emit(NodeEvent::ChainExtended { index, hash });
                    self.broadcast_new_block(block, srishti_core::constants::GOSSIP_TTL).await;
                }
            }
            Err(e) => warn!(error = %e, "mergeUniqueNodes failed"),
        }
    }

    async fn handle_new_block(&mut self, from: NodeId, block: Block, ttl: u8) {
        let message_id = srishti_consensus::block_message_id(&block.hash);
        if !self.peers.observe_gossip(&message_id, now_ms()) {
            return; // duplicate, drop silently
        }

        let our_length = self.chain.read().await.length();
        match decide_on_new_block(our_length, block.index) {
            NewBlockDecision::Apply => {
                let index = block.index;
                let result = {
                    let mut chain = self.chain.write().await;
                    chain.add_block(block.clone())
                };
                match result {
                    Ok(true) => {
                        self.emit(NodeEvent::ChainExtended { index, hash: block.hash.clone() });
                        if srishti_consensus::should_reforward(ttl) {
                            self.reforward_new_block(&from, block, ttl).await;
                        }
                    }
                    Ok(false) => debug!(%from, index, "gossiped block rejected (benign)"),
                    Err(e) => warn!(%from, index, error = %e, "gossiped block rejected"),
                }
            }
            NewBlockDecision::TriggerSync { from_index } => {
                let our_hash = self.chain.read().await.latest_hash().map(|h| h.to_string());
                self.request_sync(&from, from_index, our_length, our_hash.as_deref()).await;
            }
            NewBlockDecision::Stale => {}
        }
    }

    async fn reforward_new_block(&mut self, sender: &NodeId, block: Block, ttl: u8) {
        let next_ttl = srishti_consensus::decrement_ttl(ttl);
        let peers = self.peers.compatible_peers();
        let fanout = select_fanout_peers(&peers, sender);
        let msg = PeerMessage::NewBlock { timestamp: now_secs(), block, ttl: next_ttl };
        let Ok(json) = msg.to_json() else { return };
        for peer in fanout {
            let _ = self.relay.send(peer, json.clone()).await;
        }
    }

    /// Broadcast a freshly-produced (not re-forwarded) block to every
    /// compatible peer, at the full TTL budget.
    async fn broadcast_new_block(&self, block: Block, ttl: u8) {
        let msg = PeerMessage::NewBlock { timestamp: now_secs(), block, ttl };
        if let Ok(json) = msg.to_json() {
            let _ = self.relay.broadcast(json).await;
        }
    }

    /// Package one locally-authored event into a new block, sign it, apply
    /// it to our own chain, and broadcast it: authored locally, packaged
    /// into a block, validated and applied locally, persisted, then
    /// broadcast via gossip.
    async fn propose_local_event(&mut self, event: Event) {
        let ts = now_secs();
        let block = {
            let chain = self.chain.read().await;
            author_block(&chain, &self.identity, vec![event], ts)
        };
        let index = block.index;
        let hash = block.hash.clone();
        let applied = {
            let mut chain = self.chain.write().await;
            chain.add_block(block.clone())
        };
        match applied {
            Ok(true) => {
                self.emit(NodeEvent::ChainExtended { index, hash });
                self.broadcast_new_block(block, srishti_core::constants::GOSSIP_TTL).await;
            }
            Ok(false) => warn!(index, "locally-authored event rejected (benign)"),
            Err(e) => warn!(index, error = %e, "locally-authored event rejected"),
        }
    }
}

/// Build and sign a one-event block extending `chain`'s current tip.
fn author_block(
    chain: &ChainManager,
    identity: &NodeIdentity,
    body: Vec<Event>,
    timestamp: Timestamp,
) -> Block {
    let index = chain.length();
    let previous_hash = chain.latest_hash().unwrap_or_default().to_string();
    let proof = srishti_chain::ParticipationProof {
        node_id: identity.node_id().clone(),
        score: 1.0,
        timestamp,
    };
    let mut block = Block::new(index, previous_hash, timestamp, body, identity.node_id().clone(), proof);
    let signing_bytes = block
        .event_bytes_to_sign()
        .expect("freshly built block always canonicalises");
    block.signature = Some(identity.keypair.sign_hex(&signing_bytes));
    block
}

/// `true` if `event_type` is ever legal to submit without a chain already
/// containing its sender (only `GENESIS`, which is sender `SYSTEM` and has
/// no prior state to check against). Kept here rather than in `srishti-core`
/// since it's a node-authoring concern, not a validation rule the state
/// machine itself enforces.
pub fn is_bootstrap_only(event_type: EventType) -> bool {
    matches!(event_type, EventType::Genesis)
}
