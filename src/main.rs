//! DocuBrain - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the agent API.

use std::sync::Arc;

use docubrain::agent::Agent;
use docubrain::api::{self, AppState};
use docubrain::config::Config;
use docubrain::knowledge::QdrantKnowledge;
use docubrain::llm::GeminiClient;
use docubrain::session::ToolSession;
use docubrain::tools::ToolRegistry;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docubrain=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: model={}", config.model);

    // One shared tool session for the lifetime of the process.
    let session = Arc::new(ToolSession::new(&config));
    if let Err(e) = session.connect().await {
        // Degraded mode: chat keeps working, tool calls will fail until
        // a successful connect.
        error!("Failed to connect to tool server: {}", e);
    }

    let gemini = Arc::new(GeminiClient::new(&config));
    let knowledge = Arc::new(QdrantKnowledge::new(
        &config.knowledge,
        Arc::clone(&gemini) as Arc<dyn docubrain::llm::Embedder>,
    ));

    let tools = ToolRegistry::new(
        Arc::clone(&session) as Arc<dyn docubrain::session::ToolBackend>,
        knowledge,
    );
    let agent = Arc::new(Agent::new(gemini, tools));

    let state = AppState {
        agent,
        session: Arc::clone(&session),
    };

    info!("Starting server on {}:{}", config.host, config.port);
    api::serve(&config, state).await?;

    Ok(())
}
