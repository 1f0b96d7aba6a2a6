//! WebSocket Game Server
//!
//! Async WebSocket front for a single [`GameSession`](crate::network::session::GameSession).
//! Each connection gets a fresh player id; commands are relayed to the
//! session and every engine event, phase change and emote is relayed to every
//! connection, joined or not, so projection screens can watch without playing.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::core::grid::GridPoint;
use crate::game::engine::EngineError;
use crate::game::player::PlayerId;
use crate::network::protocol::{
    server_time_ms, ClientMessage, ErrorCode, MoveInput, ServerError, ServerMessage,
    MAX_EMOJI_CHARS,
};
use crate::network::session::{SessionError, SessionEvent, SessionHandle};

// =============================================================================
// CONFIG & ERRORS
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Maximum players on the grid.
    pub max_players: usize,
    /// Directory holding `questions.json`, `state.json` and `laureates.json`.
    pub data_dir: PathBuf,
    /// Fixed RNG seed; derived per session when unset.
    pub seed: Option<u64>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            max_players: 64,
            data_dir: PathBuf::from("data"),
            seed: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from environment, falling back to defaults for unset values.
    pub fn from_env() -> Result<Self, GameServerError> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: env_parse("BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            max_connections: env_parse("MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            max_players: env_parse("MAX_PLAYERS")?.unwrap_or(defaults.max_players),
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            seed: env_parse("GAME_SEED")?,
            version: defaults.version,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, GameServerError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GameServerError::Config(format!("{key}={raw:?} is not valid"))),
        Err(_) => Ok(None),
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

    /// Bad configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

// =============================================================================
// SERVER
// =============================================================================

/// Connected client state.
struct ConnectedClient {
    /// Id assigned at connect.
    player_id: PlayerId,
    /// On the grid?
    joined: bool,
    /// Connection time.
    connected_at: Instant,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session every connection talks to.
    session: SessionHandle,
    /// Avatar catalogue sent in welcomes.
    laureates: Arc<Vec<serde_json::Value>>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// One permit per connection, held from accept to cleanup.
    connection_slots: Arc<Semaphore>,
    /// Client-to-client messages (emotes).
    relay_tx: broadcast::Sender<ServerMessage>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(
        config: ServerConfig,
        session: SessionHandle,
        laureates: Vec<serde_json::Value>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (relay_tx, _) = broadcast::channel(256);

        Self {
            connection_slots: Arc::new(Semaphore::new(config.max_connections.min(Semaphore::MAX_PERMITS))),
            config,
            session,
            laureates: Arc::new(laureates),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            relay_tx,
            shutdown_tx,
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GameServerError> {
        Ok(TcpListener::bind(&self.config.bind_addr).await?)
    }

    /// Bind and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let permit = match self.connection_slots.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!("Connection limit reached, rejecting {}", addr);
                                    continue;
                                }
                            };

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr, permit);
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

        Ok(())
    }

    /// Handle a new WebSocket connection. `permit` is released when the
    /// connection is cleaned up.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, permit: OwnedSemaphorePermit) {
        let clients = self.clients.clone();
        let session = self.session.clone();
        let laureates = self.laureates.clone();
        let relay_tx = self.relay_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _permit = permit;
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let mut events = session.subscribe();
            let mut relay = relay_tx.subscribe();

            let player_id = PlayerId::generate();
            clients.write().await.insert(addr, ConnectedClient {
                player_id,
                joined: false,
                connected_at: Instant::now(),
            });
            debug!("Client {} assigned player {}", addr, player_id.short());

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

            // Handle incoming messages and relay events
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(
                                            addr, client_msg, &clients, &session, &laureates, &msg_tx, &relay_tx,
                                        ).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        ))).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                // Binary frames carry moves only
                                match MoveInput::from_bytes(&data) {
                                    Ok(input) => {
                                        Self::handle_client_message(
                                            addr, input.into(), &clients, &session, &laureates, &msg_tx, &relay_tx,
                                        ).await;
                                    }
                                    Err(e) => debug!("Invalid binary frame from {}: {}", addr, e),
                                }
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
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                if msg_tx.send(session_message(event)).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("Client {} lagged, {} events dropped", addr, skipped);
                            }
                            Err(RecvError::Closed) => {
                                let _ = msg_tx.send(ServerMessage::Shutdown {
                                    reason: "Session closed".to_string(),
                                }).await;
                                break;
                            }
                        }
                    }
                    relayed = relay.recv() => {
                        match relayed {
                            Ok(msg) => {
                                if msg_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!("Client {} lagged, {} relayed messages dropped", addr, skipped);
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued messages drain before closing
            drop(msg_tx);
            let _ = sender_task.await;

            // Remove client; a joined player leaves the grid with the socket
            let removed = clients.write().await.remove(&addr);
            if let Some(client) = removed {
                if client.joined {
                    let _ = session.leave(client.player_id).await;
                }
                debug!(
                    "Client {} was connected for {:?}",
                    addr,
                    client.connected_at.elapsed()
                );
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
        session: &SessionHandle,
        laureates: &Arc<Vec<serde_json::Value>>,
        sender: &mpsc::Sender<ServerMessage>,
        relay: &broadcast::Sender<ServerMessage>,
    ) {
        let (player_id, joined) = {
            let clients = clients.read().await;
            match clients.get(&addr) {
                Some(c) => (c.player_id, c.joined),
                None => return,
            }
        };

        match msg {
            ClientMessage::Join { avatar } => {
                if joined {
                    let _ = sender.send(ServerMessage::Error(ServerError::new(
                        ErrorCode::AlreadyJoined,
                        "Already on the grid",
                    ))).await;
                    return;
                }

                match session.join(player_id, avatar).await {
                    Ok(accepted) => {
                        if let Some(client) = clients.write().await.get_mut(&addr) {
                            client.joined = true;
                        }
                        let _ = sender.send(ServerMessage::Welcome {
                            player_id,
                            snapshot: accepted.snapshot,
                            laureates: laureates.as_ref().clone(),
                            timer: accepted.timer,
                        }).await;
                    }
                    Err(e) => {
                        debug!("Join from {} failed: {}", addr, e);
                        let _ = sender.send(ServerMessage::Error(join_error(&e))).await;
                    }
                }
            }
            ClientMessage::Move { dx, dy } => {
                if !joined {
                    let _ = sender.send(ServerMessage::Error(ServerError::new(
                        ErrorCode::NotJoined,
                        "Join before moving",
                    ))).await;
                    return;
                }
                let _ = session.move_player(player_id, GridPoint::new(dx, dy)).await;
            }
            ClientMessage::Leave => {
                if joined {
                    let _ = session.leave(player_id).await;
                    if let Some(client) = clients.write().await.get_mut(&addr) {
                        client.joined = false;
                    }
                }
            }
            ClientMessage::Emote { emoji } => {
                if !joined {
                    let _ = sender.send(ServerMessage::Error(ServerError::new(
                        ErrorCode::NotJoined,
                        "Join before emoting",
                    ))).await;
                    return;
                }
                if emoji.trim().is_empty() || emoji.chars().count() > MAX_EMOJI_CHARS {
                    let _ = sender.send(ServerMessage::Error(ServerError::new(
                        ErrorCode::InvalidInput,
                        format!("Emote must be 1 to {MAX_EMOJI_CHARS} characters"),
                    ))).await;
                    return;
                }
                debug!("Player {} emotes {}", player_id.short(), emoji);
                // No receivers is fine
                let _ = relay.send(ServerMessage::Emote { player_id, emoji });
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: server_time_ms(),
                }).await;
            }
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get joined player count.
    pub async fn player_count(&self) -> usize {
        self.clients.read().await.values().filter(|c| c.joined).count()
    }
}

fn session_message(event: SessionEvent) -> ServerMessage {
    match event {
        SessionEvent::Engine(event) => ServerMessage::Event(event),
        SessionEvent::Phase(timer) => ServerMessage::Phase(timer),
    }
}

fn join_error(e: &SessionError) -> ServerError {
    let code = match e {
        SessionError::SessionFull => ErrorCode::SessionFull,
        SessionError::Engine(EngineError::PlacementExhausted { .. }) => ErrorCode::NoFreeCell,
        SessionError::Engine(EngineError::PlayerAlreadyJoined(_)) => ErrorCode::AlreadyJoined,
        _ => ErrorCode::InternalError,
    };
    ServerError::new(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;
    use crate::core::grid::GridBox;
    use crate::game::cycle::CyclePhase;
    use crate::game::engine::{EngineConfig, GameEngine};
    use crate::game::layout::Layout;
    use crate::game::question::{Answer, Question};
    use crate::network::session::{GameSession, SessionConfig};

    fn session(max_players: usize) -> SessionHandle {
        let layout = Layout::new(8, 8, GridBox::new(3, 3, 1, 1))
            .with_answer_zones(vec![GridBox::new(0, 0, 1, 1), GridBox::new(6, 6, 1, 1)]);
        let questions = vec![
            Question::new("A", vec![Answer::new("yes", true), Answer::new("no", false)]),
            Question::new("B", vec![Answer::new("yes", true), Answer::new("no", false)]),
        ];
        let engine = GameEngine::init(questions, layout, EngineConfig::default(), 5).unwrap();
        let config = SessionConfig { max_players, ..Default::default() };
        GameSession::spawn(engine, config).0
    }

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }

    async fn start(config: ServerConfig) -> (Arc<GameServer>, SocketAddr) {
        let server = Arc::new(GameServer::new(config, session(4), vec![]));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let runner = server.clone();
        tokio::spawn(async move { runner.serve(listener).await });
        (server, addr)
    }

    /// Ping until the pong comes back, so the connection task is running.
    async fn ping<S>(ws: &mut S)
    where
        S: futures_util::Sink<Message> + futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
        <S as futures_util::Sink<Message>>::Error: std::fmt::Debug,
    {
        ws.send(Message::Text(r#"{"type":"ping","timestamp":1}"#.into())).await.unwrap();
        while !matches!(next_message(ws).await, ServerMessage::Pong { .. }) {}
    }

    /// Join and return the assigned id.
    async fn join<S>(ws: &mut S) -> PlayerId
    where
        S: futures_util::Sink<Message> + futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
        <S as futures_util::Sink<Message>>::Error: std::fmt::Debug,
    {
        ws.send(Message::Text(r#"{"type":"join"}"#.into())).await.unwrap();
        loop {
            if let ServerMessage::Welcome { player_id, .. } = next_message(ws).await {
                return player_id;
            }
        }
    }

    async fn next_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for server")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 1000);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_join_error_codes() {
        assert_eq!(join_error(&SessionError::SessionFull).code, ErrorCode::SessionFull);
        assert_eq!(
            join_error(&SessionError::Engine(EngineError::PlacementExhausted { attempts: 1 })).code,
            ErrorCode::NoFreeCell
        );
        assert_eq!(join_error(&SessionError::Closed).code, ErrorCode::InternalError);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = Arc::new(GameServer::new(local_config(), session(4), vec![]));
        let listener = server.bind().await.unwrap();

        let runner = server.clone();
        let handle = tokio::spawn(async move { runner.serve(listener).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_move_over_websocket() {
        let laureates = vec![serde_json::json!({ "surname": "Curie" })];
        let server = Arc::new(GameServer::new(local_config(), session(4), laureates));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let runner = server.clone();
        tokio::spawn(async move { runner.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();

        ws.send(Message::Text(r#"{"type":"move","dx":1,"dy":0}"#.into())).await.unwrap();
        match next_message(&mut ws).await {
            ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::NotJoined),
            other => panic!("unexpected message {other:?}"),
        }

        let now = server_time_ms();
        ws.send(Message::Text(r#"{"type":"join","avatar":{"id":1}}"#.into())).await.unwrap();
        let player_id = loop {
            match next_message(&mut ws).await {
                ServerMessage::Welcome { player_id, snapshot, laureates, timer } => {
                    assert_eq!(snapshot.players.len(), 1);
                    assert_eq!(laureates.len(), 1);
                    assert_eq!(timer.phase, CyclePhase::Collecting);
                    assert!(timer.ends_at >= now);
                    break player_id;
                }
                ServerMessage::Event(_) => continue,
                other => panic!("unexpected message {other:?}"),
            }
        };
        assert_eq!(server.player_count().await, 1);

        ws.send(Message::Binary(MoveInput::new(0, 1).to_bytes().unwrap())).await.unwrap();
        loop {
            if let ServerMessage::Event(event) = next_message(&mut ws).await {
                if event.kind() == "playerMove" {
                    assert_eq!(event.player_id(), Some(player_id));
                    break;
                }
            }
        }

        ws.send(Message::Text(r#"{"type":"ping","timestamp":7}"#.into())).await.unwrap();
        loop {
            if let ServerMessage::Pong { timestamp, .. } = next_message(&mut ws).await {
                assert_eq!(timestamp, 7);
                break;
            }
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_emote_relayed_to_every_connection() {
        let (server, addr) = start(local_config()).await;
        let url = format!("ws://{addr}");

        let (mut player, _) = connect_async(&url).await.unwrap();
        let (mut screen, _) = connect_async(&url).await.unwrap();
        ping(&mut screen).await;

        player.send(Message::Text(r#"{"type":"emote","emoji":"👋"}"#.into())).await.unwrap();
        loop {
            match next_message(&mut player).await {
                ServerMessage::Error(err) => {
                    assert_eq!(err.code, ErrorCode::NotJoined);
                    break;
                }
                ServerMessage::Emote { .. } => panic!("emote relayed before join"),
                _ => continue,
            }
        }

        let player_id = join(&mut player).await;

        player.send(Message::Text(r#"{"type":"emote","emoji":""}"#.into())).await.unwrap();
        loop {
            if let ServerMessage::Error(err) = next_message(&mut player).await {
                assert_eq!(err.code, ErrorCode::InvalidInput);
                break;
            }
        }

        player.send(Message::Text(r#"{"type":"emote","emoji":"👋"}"#.into())).await.unwrap();
        loop {
            if let ServerMessage::Emote { player_id: from, emoji } = next_message(&mut screen).await {
                assert_eq!(from, player_id);
                assert_eq!(emoji, "👋");
                break;
            }
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_connection_limit_counts_pending_handshakes() {
        let config = ServerConfig { max_connections: 1, ..local_config() };
        let (server, addr) = start(config).await;
        let url = format!("ws://{addr}");

        let (mut first, _) = connect_async(&url).await.unwrap();
        ping(&mut first).await;

        let second = tokio::time::timeout(Duration::from_secs(5), connect_async(&url))
            .await
            .unwrap();
        assert!(second.is_err());

        first.close(None).await.unwrap();
        let mut reconnected = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Ok((mut ws, _)) = connect_async(&url).await {
                ping(&mut ws).await;
                reconnected = true;
                break;
            }
        }
        assert!(reconnected);

        server.shutdown();
    }
}
