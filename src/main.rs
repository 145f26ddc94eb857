//! Threadsmith - tweet and thread generation API
//!
//! Streams generated Twitter/X content from a generative-AI backend to the
//! browser as it is produced, and keeps each user's chat history.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod conversation;
mod core;
mod error;
mod providers;
mod routes;

use auth::{IdentityResolver, SessionTable};
use config::{Config, PromptTemplate};
use crate::core::{Conversations, SqliteChatStore};
use providers::GenerativeBackend;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn GenerativeBackend>,
    pub identity: Arc<dyn IdentityResolver>,
    pub conversations: Conversations,
    /// Instruction preamble placed at the top of every prompt
    pub preamble: Arc<str>,
    pub model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadsmith=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.load_settings()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let template = match &settings.prompt.template {
        Some(path) => PromptTemplate::load_from_file(path).await?,
        None => PromptTemplate::builtin(),
    };
    tracing::info!("📝 Using instruction template '{}'", template.template.name);

    let store = SqliteChatStore::new(&config.data_dir.join("threadsmith.db")).await?;
    let conversations = Conversations::new(Arc::new(store), settings.history.max_stored_messages);

    let identity = SessionTable::new(&settings.auth.sessions);
    if identity.is_empty() {
        tracing::warn!("No sessions configured; every request will be rejected as unauthorized");
    } else {
        tracing::info!("🔑 Loaded {} session(s)", identity.len());
    }

    let backend = providers::from_settings(&settings, &config)?;
    tracing::info!(
        "🤖 Backend '{}' with model '{}'",
        backend.name(),
        settings.llm.model
    );

    let state = AppState {
        backend,
        identity: Arc::new(identity),
        conversations,
        preamble: template.preamble().into(),
        model: settings.llm.model.clone(),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🧵 Threadsmith running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
