//! Trivia Grid Game Server
//!
//! Loads the data directory, starts one game session and serves it over
//! WebSocket until Ctrl-C.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trivia_grid::{
    VERSION,
    core::rng::derive_session_seed,
    data::GameData,
    game::engine::{EngineConfig, GameEngine},
    network::{GameServer, GameSession, ServerConfig, SessionConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Trivia Grid Server v{}", VERSION);

    let server_config = ServerConfig::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    info!(
        "Question interval {:?}, answer duration {:?}",
        engine_config.question_interval, engine_config.answer_duration
    );

    let data = GameData::load_dir(&server_config.data_dir)
        .with_context(|| format!("loading data from {}", server_config.data_dir.display()))?;

    let seed = server_config.seed.unwrap_or_else(|| {
        let session_id = uuid::Uuid::new_v4();
        let entropy = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        derive_session_seed(session_id.as_bytes(), entropy)
    });
    info!("RNG seed: {}", seed);

    let engine = GameEngine::init(data.questions, data.layout, engine_config, seed)?;
    let session_config = SessionConfig {
        max_players: server_config.max_players,
        ..Default::default()
    };
    let (session, session_task) = GameSession::spawn(engine, session_config);

    let server = Arc::new(GameServer::new(server_config, session.clone(), data.laureates));
    let runner = server.clone();
    let mut server_task = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        result = &mut server_task => {
            result??;
        }
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
            server_task.await??;
        }
    }

    session.shutdown().await;
    session_task.await?;
    info!("Server stopped");

    Ok(())
}
