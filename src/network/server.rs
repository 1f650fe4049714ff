//! WebSocket Game Server
//!
//! Async WebSocket server for match connections.
//! Parses client messages and routes them to the match registry.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::game::hero::HeroStatsTable;
use crate::network::protocol::{ClientMessage, ServerError, ServerMessage};
use crate::network::session::{ConnectionId, MatchRegistry, SessionError};

/// Hero stat files tried when no path is configured.
pub const DEFAULT_HERO_STATS_PATHS: [&str; 2] = ["characters.json", "public/characters.json"];

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for longer than this are closed.
    pub idle_timeout: Duration,
    /// How long a finished match stays around before it is reaped.
    pub ended_room_linger: Duration,
    /// Hero stat table; `None` tries the default locations.
    pub hero_stats_path: Option<PathBuf>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            ended_room_linger: Duration::from_secs(60),
            hero_stats_path: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `BIND_ADDR`, `PORT`, `MAX_CONNECTIONS` and
    /// `HERO_STATS_PATH`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("BIND_ADDR") {
            match raw.parse() {
                Ok(addr) => config.bind_addr = addr,
                Err(e) => warn!("Ignoring BIND_ADDR={}: {}", raw, e),
            }
        }
        if let Some(raw) = lookup("PORT") {
            match raw.parse() {
                Ok(port) => config.bind_addr.set_port(port),
                Err(e) => warn!("Ignoring PORT={}: {}", raw, e),
            }
        }
        if let Some(raw) = lookup("MAX_CONNECTIONS") {
            match raw.parse() {
                Ok(max) => config.max_connections = max,
                Err(e) => warn!("Ignoring MAX_CONNECTIONS={}: {}", raw, e),
            }
        }
        if let Some(raw) = lookup("HERO_STATS_PATH") {
            config.hero_stats_path = Some(PathBuf::from(raw));
        }
        config
    }

    /// Hero stat files to try, in order.
    pub fn hero_stats_candidates(&self) -> Vec<PathBuf> {
        match &self.hero_stats_path {
            Some(path) => vec![path.clone()],
            None => DEFAULT_HERO_STATS_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Connected client state.
struct ConnectedClient {
    conn_id: ConnectionId,
    /// Last activity.
    last_activity: Instant,
    /// Fired by the cleanup loop to close an idle connection.
    close_tx: Option<oneshot::Sender<()>>,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// Frames that reset the idle timer, protocol keepalives included.
fn counts_as_activity(frame: &Message) -> bool {
    matches!(frame, Message::Text(_) | Message::Ping(_) | Message::Pong(_))
}

async fn touch(clients: &Clients, addr: SocketAddr) {
    if let Some(client) = clients.write().await.get_mut(&addr) {
        client.last_activity = Instant::now();
    }
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// All match rooms.
    registry: Arc<MatchRegistry>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig, stats: HeroStatsTable) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            registry: Arc::new(MatchRegistry::new(stats)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server v{} listening on {}", self.config.version, self.config.bind_addr);

        let cleanup_clients = self.clients.clone();
        let cleanup_registry = self.registry.clone();
        let cleanup_config = self.config.clone();

        // Spawn cleanup task
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, cleanup_registry, cleanup_config).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let registry = self.registry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

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
            let (close_tx, mut close_rx) = oneshot::channel::<()>();
            let conn_id = Uuid::new_v4();

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    conn_id,
                    last_activity: Instant::now(),
                    close_tx: Some(close_tx),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        if let Some(Ok(frame)) = &msg {
                            if counts_as_activity(frame) {
                                touch(&clients, addr).await;
                            }
                        }
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(
                                            ServerError::invalid_input("Invalid message format"),
                                        )).await;
                                        continue;
                                    }
                                };

                                Self::handle_client_message(conn_id, client_msg, &registry, &msg_tx).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(ServerMessage::Error(
                                    ServerError::invalid_input("Binary frames are not supported"),
                                )).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut close_rx => {
                        info!("Closing idle client {}", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            clients.write().await.remove(&addr);
            registry.disconnect(conn_id).await;

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        conn_id: ConnectionId,
        msg: ClientMessage,
        registry: &Arc<MatchRegistry>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::JoinMatch(request) => {
                if let Err(e) = registry.join(conn_id, request, sender.clone()).await {
                    let _ = sender
                        .send(ServerMessage::Error(ServerError::new("already_in_match", e.to_string())))
                        .await;
                }
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::pong(timestamp)).await;
            }
            other => {
                let Some(intent) = other.into_intent() else {
                    return;
                };
                // Not joined or spectating: stale intent, drop it
                if let Err(e) = registry.apply(conn_id, intent).await {
                    debug!("Dropped intent from {}: {}", conn_id, e);
                }
            }
        }
    }

    /// Close idle connections and reap finished rooms.
    async fn run_cleanup_loop(clients: Clients, registry: Arc<MatchRegistry>, config: ServerConfig) {
        let mut interval = interval(Duration::from_secs(30));

        loop {
            interval.tick().await;

            let now = Instant::now();
            let mut clients_guard = clients.write().await;
            for (addr, client) in clients_guard.iter_mut() {
                if now.duration_since(client.last_activity) > config.idle_timeout {
                    if let Some(close_tx) = client.close_tx.take() {
                        debug!("Client {} ({}) idle", addr, client.conn_id);
                        let _ = close_tx.send(());
                    }
                }
            }
            drop(clients_guard);

            registry.cleanup(config.ended_room_linger).await;
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active room count.
    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.hero_stats_candidates().len(), 2);
    }

    #[test]
    fn test_config_from_lookup() {
        let env: BTreeMap<&str, &str> = [
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("PORT", "9100"),
            ("MAX_CONNECTIONS", "lots"),
            ("HERO_STATS_PATH", "/etc/heroes.json"),
        ]
        .into_iter()
        .collect();
        let config = ServerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.bind_addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.max_connections, 1000);
        assert_eq!(
            config.hero_stats_candidates(),
            vec![PathBuf::from("/etc/heroes.json")]
        );
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config, HeroStatsTable::empty());

        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_client_messages_route_to_registry() {
        let registry = Arc::new(MatchRegistry::new(HeroStatsTable::empty()));
        let (tx, mut rx) = mpsc::channel(64);
        let conn = Uuid::new_v4();

        GameServer::handle_client_message(conn, ClientMessage::Ping { timestamp: Some(7) }, &registry, &tx).await;
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Pong { timestamp: Some(7), .. })));

        // Intent before joining is dropped without a reply
        GameServer::handle_client_message(conn, ClientMessage::EndTurn, &registry, &tx).await;
        assert!(rx.try_recv().is_err());

        let join = ClientMessage::from_json(r#"{"type":"join_match","match_id":"m1"}"#).unwrap();
        GameServer::handle_client_message(conn, join, &registry, &tx).await;
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::RoleAssigned { seat: None })));
        assert_eq!(registry.room_count().await, 1);

        let elsewhere = ClientMessage::from_json(r#"{"type":"join_match","match_id":"m2"}"#).unwrap();
        GameServer::handle_client_message(conn, elsewhere, &registry, &tx).await;
        let _snapshot = rx.try_recv();
        match rx.try_recv() {
            Ok(ServerMessage::Error(err)) => assert_eq!(err.code, "already_in_match"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_keepalive_frames_refresh_activity() {
        assert!(counts_as_activity(&Message::Text("{}".to_string())));
        assert!(counts_as_activity(&Message::Ping(vec![1])));
        assert!(counts_as_activity(&Message::Pong(Vec::new())));
        assert!(!counts_as_activity(&Message::Binary(vec![0])));

        let clients: Clients = Arc::new(RwLock::new(BTreeMap::new()));
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let stale = Instant::now() - Duration::from_secs(1);
        clients.write().await.insert(addr, ConnectedClient {
            conn_id: Uuid::new_v4(),
            last_activity: stale,
            close_tx: None,
        });

        touch(&clients, addr).await;
        assert!(clients.read().await[&addr].last_activity > stale);

        // Unknown address is ignored
        touch(&clients, "127.0.0.1:4001".parse().unwrap()).await;
        assert_eq!(clients.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GameServer::new(config, HeroStatsTable::empty());
        server.shutdown();
        // Should not panic
    }
}
