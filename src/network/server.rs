//! WebSocket Node Server
//!
//! Async WebSocket front for one [`StakingOrchestrator`].
//! Binds connections to accounts, applies operations serially, samples the
//! wall clock once per message and broadcasts ledger events.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::identity::AccountId;
use crate::core::time::Timestamp;
use crate::custody::bank::{Allocation, InMemoryBank};
use crate::custody::orchestrator::{StakeError, StakeLimits, StakingOrchestrator};
use crate::ledger::store::Ledger;
use crate::ledger::LedgerError;
use crate::network::auth::{validate_token_at, AuthConfig, AuthError};
use crate::network::protocol::{
    format_asset, parse_account, parse_amount, parse_asset, parse_token, AuthResult,
    ClientMessage, CommitRequest, ErrorCode, EventView, RecordView, ServerError, ServerMessage,
};

/// Service label the escrow account is derived from.
pub const ESCROW_LABEL: &str = "habit-stake-escrow";

/// Orchestrator shared by every connection.
pub type SharedOrchestrator = Arc<Mutex<StakingOrchestrator<InMemoryBank>>>;

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Where to persist state after each write.
    pub snapshot_path: Option<PathBuf>,
    /// Genesis allocations used when no snapshot exists.
    pub genesis_path: Option<PathBuf>,
    /// Text limits for commitments and proofs.
    pub limits: StakeLimits,
    /// Server version string.
    pub version: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            snapshot_path: None,
            genesis_path: None,
            limits: StakeLimits::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("HABIT_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("HABIT_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            snapshot_path: std::env::var("HABIT_SNAPSHOT_PATH").ok().map(PathBuf::from),
            genesis_path: std::env::var("HABIT_GENESIS_PATH").ok().map(PathBuf::from),
            limits: StakeLimits::from_env(),
            version: defaults.version,
        }
    }
}

/// Node errors.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Failed to bind or read/write a state file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Genesis file unreadable.
    #[error("invalid genesis file: {0}")]
    Genesis(#[from] serde_json::Error),

    /// Snapshot file unreadable.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    /// Ledger refused a restore or binding.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Orchestrator could not be built.
    #[error("orchestrator error: {0}")]
    Stake(#[from] StakeError),
}

/// Persisted node state: ledger snapshot plus bank balances.
#[derive(Serialize, Deserialize)]
struct NodeSnapshot {
    ledger: Vec<u8>,
    bank: InMemoryBank,
}

/// Per-connection state.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    /// Account bound by a successful `auth`.
    pub account: Option<AccountId>,
}

// =============================================================================
// NODE STATE
// =============================================================================

/// Everything a connection task needs to serve requests.
#[derive(Clone)]
pub struct NodeState {
    orchestrator: SharedOrchestrator,
    auth: Arc<AuthConfig>,
    events: broadcast::Sender<ServerMessage>,
    snapshot_path: Option<PathBuf>,
    version: String,
}

impl NodeState {
    /// Wrap an orchestrator.
    pub fn new(
        orchestrator: StakingOrchestrator<InMemoryBank>,
        auth: AuthConfig,
        snapshot_path: Option<PathBuf>,
        version: String,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            auth: Arc::new(auth),
            events,
            snapshot_path,
            version,
        }
    }

    /// Load state from the configured snapshot, else from genesis.
    pub async fn load(config: &NodeConfig, auth: AuthConfig) -> Result<Self, NodeError> {
        let escrow = AccountId::service(ESCROW_LABEL);
        let mut restored = None;
        if let Some(path) = &config.snapshot_path {
            if tokio::fs::try_exists(path).await? {
                let bytes = tokio::fs::read(path).await?;
                let snapshot: NodeSnapshot = bincode::deserialize(&bytes)
                    .map_err(|e| NodeError::Snapshot(e.to_string()))?;
                let ledger = Ledger::restore(&snapshot.ledger)?;
                info!("restored {} records from {}", ledger.len(), path.display());
                restored = Some((ledger, snapshot.bank));
            }
        }

        let (ledger, bank) = match restored {
            Some(state) => state,
            None => {
                let bank = match &config.genesis_path {
                    Some(path) => {
                        let text = tokio::fs::read_to_string(path).await?;
                        let allocations: Vec<Allocation> = serde_json::from_str(&text)?;
                        info!("loaded {} genesis allocations", allocations.len());
                        InMemoryBank::from_allocations(&allocations)
                    }
                    None => InMemoryBank::new(),
                };
                (Ledger::new(), bank)
            }
        };

        let orchestrator = StakingOrchestrator::new(ledger, bank, escrow, config.limits.clone())?;
        Ok(Self::new(
            orchestrator,
            auth,
            config.snapshot_path.clone(),
            config.version.clone(),
        ))
    }

    /// Subscribe to broadcast ledger events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Shared orchestrator handle.
    pub fn orchestrator(&self) -> &SharedOrchestrator {
        &self.orchestrator
    }

    /// Handle one client message at time `now`.
    #[instrument(skip(self, conn, msg), fields(account = ?conn.account.map(|a| a.short())))]
    pub async fn dispatch(
        &self,
        conn: &mut Connection,
        msg: ClientMessage,
        now: Timestamp,
    ) -> ServerMessage {
        if msg.is_write() {
            let Some(caller) = conn.account else {
                return ServerMessage::error(ErrorCode::NotAuthenticated, "must authenticate first");
            };
            return self.handle_write(caller, msg, now).await;
        }

        match msg {
            ClientMessage::Auth(req) => self.handle_auth(conn, &req.token, now),
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
            },
            ClientMessage::GetRecord { id } => {
                let orch = self.orchestrator.lock().await;
                match orch.record(id) {
                    Ok(record) => ServerMessage::Record(RecordView::from(record)),
                    Err(e) => stake_error(&e),
                }
            }
            ClientMessage::GetStatus { id } => {
                let orch = self.orchestrator.lock().await;
                match orch.status(id, now) {
                    Ok(status) => ServerMessage::Status(status),
                    Err(e) => stake_error(&e),
                }
            }
            ClientMessage::ListRecords { owner } => {
                let owner = match resolve_account(owner.as_deref(), conn) {
                    Ok(owner) => owner,
                    Err(reply) => return reply,
                };
                let orch = self.orchestrator.lock().await;
                ServerMessage::Records {
                    owner: owner.to_string(),
                    ids: orch.records_of(&owner),
                }
            }
            ClientMessage::Balance { asset, account } => {
                let account = match resolve_account(account.as_deref(), conn) {
                    Ok(account) => account,
                    Err(reply) => return reply,
                };
                let asset = match parse_asset(&asset) {
                    Ok(asset) => asset,
                    Err(e) => return ServerMessage::error(ErrorCode::InvalidInput, e),
                };
                let orch = self.orchestrator.lock().await;
                ServerMessage::Balance {
                    account: account.to_string(),
                    asset: format_asset(&asset),
                    amount: orch.vault().bank().balance(&asset, &account).to_string(),
                }
            }
            other => {
                debug!("unhandled message {:?}", other);
                ServerMessage::error(ErrorCode::InvalidInput, "unsupported message")
            }
        }
    }

    fn handle_auth(&self, conn: &mut Connection, token: &str, now: Timestamp) -> ServerMessage {
        match validate_token_at(token, &self.auth, now) {
            Ok(claims) => {
                let account = claims.account_id();
                conn.account = Some(account);
                debug!("connection authenticated as {}", account.short());
                ServerMessage::AuthResult(AuthResult {
                    success: true,
                    account: Some(account.to_string()),
                    error: None,
                    server_version: self.version.clone(),
                })
            }
            Err(e) => {
                let code = match e {
                    AuthError::Expired => ErrorCode::TokenExpired,
                    AuthError::NotConfigured => ErrorCode::AuthFailed,
                    _ => ErrorCode::InvalidToken,
                };
                warn!("authentication failed: {}", e);
                ServerMessage::Error(ServerError::new(code, e.to_string()))
            }
        }
    }

    async fn handle_write(&self, caller: AccountId, msg: ClientMessage, now: Timestamp) -> ServerMessage {
        let mut orch = self.orchestrator.lock().await;

        let reply = match msg {
            ClientMessage::CommitNative(req) => commit(&mut orch, &caller, &req, None, now),
            ClientMessage::Commit(req) => match req.token.as_deref().map(parse_token) {
                Some(Ok(token)) => commit(&mut orch, &caller, &req, Some(token), now),
                Some(Err(e)) => ServerMessage::error(ErrorCode::InvalidInput, e),
                None => ServerMessage::error(ErrorCode::InvalidInput, "token stake requires a token"),
            },
            ClientMessage::Approve { token, amount } => {
                match (parse_token(&token), parse_amount(&amount)) {
                    (Ok(token), Ok(amount)) => {
                        let escrow = *orch.vault().escrow();
                        let bank = orch.bank_mut();
                        bank.increase_allowance(token, caller, escrow, amount);
                        ServerMessage::Approved {
                            token: token.to_string(),
                            allowance: bank.allowance(&token, &caller, &escrow).to_string(),
                        }
                    }
                    (Err(e), _) | (_, Err(e)) => ServerMessage::error(ErrorCode::InvalidInput, e),
                }
            }
            ClientMessage::RegisterProgress { id, proof } => {
                match orch.register_progress(&caller, id, proof, now) {
                    Ok(out) => ServerMessage::ProgressRegistered {
                        id,
                        chain: out.chain,
                        period_times_accomplished: out.period_times_accomplished,
                        period_completed: out.period_completed,
                    },
                    Err(e) => stake_error(&e),
                }
            }
            ClientMessage::Claim { id } => match orch.claim(&caller, id, now) {
                Ok(s) => ServerMessage::Claimed {
                    id,
                    recipient: s.recipient.to_string(),
                    amount: s.amount.to_string(),
                    verdict: s.verdict,
                },
                Err(e) => stake_error(&e),
            },
            ClientMessage::TransferRecord { id, new_owner } => match parse_account(&new_owner) {
                Ok(new_owner) => match orch.transfer_record(&caller, id, new_owner, now) {
                    Ok(()) => ServerMessage::Records {
                        owner: new_owner.to_string(),
                        ids: orch.records_of(&new_owner),
                    },
                    Err(e) => stake_error(&e),
                },
                Err(e) => ServerMessage::error(ErrorCode::InvalidInput, e),
            },
            other => {
                debug!("unhandled message {:?}", other);
                ServerMessage::error(ErrorCode::InvalidInput, "unsupported message")
            }
        };

        if matches!(reply, ServerMessage::Error(_)) {
            return reply;
        }

        for event in orch.drain_events() {
            // No subscribers is not an error.
            let _ = self.events.send(ServerMessage::Event(EventView::from(&event)));
        }
        if let Err(e) = self.persist(&orch).await {
            error!("write applied but not persisted: {}", e);
            return ServerMessage::error(
                ErrorCode::InternalError,
                format!("applied in memory but not persisted: {}", e),
            );
        }
        reply
    }

    async fn persist(&self, orch: &StakingOrchestrator<InMemoryBank>) -> Result<(), NodeError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = NodeSnapshot {
            ledger: orch.ledger().snapshot()?,
            bank: orch.vault().bank().clone(),
        };
        let bytes = bincode::serialize(&snapshot).map_err(|e| NodeError::Snapshot(e.to_string()))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

fn commit(
    orch: &mut StakingOrchestrator<InMemoryBank>,
    caller: &AccountId,
    req: &CommitRequest,
    token: Option<crate::core::identity::TokenAddress>,
    now: Timestamp,
) -> ServerMessage {
    let (params, amount) = match req.to_params() {
        Ok(parsed) => parsed,
        Err(e) => return ServerMessage::error(ErrorCode::InvalidInput, e),
    };
    let result = match token {
        Some(token) => orch.commit(caller, params, req.start_time, token, amount, now),
        None => orch.commit_native(caller, params, req.start_time, amount, now),
    };
    match result {
        Ok(id) => ServerMessage::Committed { id },
        Err(e) => stake_error(&e),
    }
}

fn stake_error(err: &StakeError) -> ServerMessage {
    ServerMessage::Error(ServerError::from(err))
}

fn resolve_account(explicit: Option<&str>, conn: &Connection) -> Result<AccountId, ServerMessage> {
    match (explicit, conn.account) {
        (Some(s), _) => parse_account(s).map_err(|e| ServerMessage::error(ErrorCode::InvalidInput, e)),
        (None, Some(account)) => Ok(account),
        (None, None) => Err(ServerMessage::error(
            ErrorCode::NotAuthenticated,
            "authenticate or name an account",
        )),
    }
}

fn wall_clock() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}

/// Complete the handshake, tell the client the node is full, and close.
async fn reject_overloaded<S>(stream: S) -> Result<(), NodeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ws = accept_async(stream).await?;
    let reply = ServerMessage::error(ErrorCode::ServerOverloaded, "connection limit reached");
    if let Ok(text) = reply.to_json() {
        ws.send(Message::Text(text)).await?;
    }
    ws.close(None).await?;
    Ok(())
}

// =============================================================================
// SERVER
// =============================================================================

/// The node server.
pub struct HabitNode {
    config: NodeConfig,
    state: NodeState,
    clients: Arc<RwLock<BTreeMap<SocketAddr, Connection>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HabitNode {
    /// Create a node around loaded state.
    pub fn new(config: NodeConfig, state: NodeState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Node state handle.
    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Run the server until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), NodeError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("habit node listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.clients.read().await.len() >= self.config.max_connections {
                                warn!("connection limit reached, rejecting {}", addr);
                                tokio::spawn(async move {
                                    if let Err(e) = reject_overloaded(stream).await {
                                        debug!("rejecting {} failed: {}", addr, e);
                                    }
                                });
                                continue;
                            }
                            info!("new connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => error!("accept error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let state = self.state.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut events_rx = self.state.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            clients.write().await.insert(addr, Connection::default());

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut conn = Connection::default();

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => state.dispatch(&mut conn, client_msg, wall_clock()).await,
                                    Err(e) => {
                                        debug!("invalid message from {}: {}", addr, e);
                                        ServerMessage::error(ErrorCode::InvalidInput, "invalid message format")
                                    }
                                };

                                if let Some(client) = clients.write().await.get_mut(&addr) {
                                    client.account = conn.account;
                                }

                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    event = events_rx.recv() => {
                        match event {
                            Ok(event) => {
                                if msg_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("client {} missed {} events", addr, n);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "node shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued replies flush before tearing down.
            drop(msg_tx);
            let _ = sender_task.await;

            clients.write().await.remove(&addr);
            info!("client {} cleaned up", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Connections bound to an account.
    pub async fn authenticated_count(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.account.is_some())
            .count()
    }
}

// =============================================================================
// TESTS
// =============================================================================
