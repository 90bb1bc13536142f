//! Talkback - a self-hosted chat companion
//!
//! Keeps conversation threads in a local SQLite store, answers with canned
//! persona replies after a short "thinking" pause, and can read replies aloud
//! or take dictated input when speech programs are configured.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod render;
mod routes;
mod speech;
mod storage;

use crate::core::{ChatController, ChatService, ConversationRegistry};
use config::Config;
use speech::SpeechCapabilities;
use storage::{InMemoryStore, KeyValueStore, SqliteStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talkback=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let db_path = config.database_path();
    let store: Arc<dyn KeyValueStore> = match SqliteStore::new(&db_path).await {
        Ok(store) => {
            tracing::info!("💾 Conversations stored in {}", db_path.display());
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Persistent storage unavailable ({}); conversations will not survive a restart",
                e
            );
            Arc::new(InMemoryStore::new())
        }
    };

    let registry =
        ConversationRegistry::load(store, config.storage_key.clone(), config.persona.clone())
            .await?;
    let speech = SpeechCapabilities::detect(&config.speech);
    tracing::info!(
        "Speech input: {}, speech output: {}",
        speech.input.is_supported(),
        speech.output.is_supported()
    );

    let controller = ChatController::new(
        registry,
        speech,
        config.reply_delay,
        config.speech.speak_replies,
    );

    let state = AppState {
        chat: ChatService::new(controller),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🗨️ Talkback running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
