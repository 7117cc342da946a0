mod config;
mod errors;
mod evaluation;
mod llm_client;
mod routes;
mod state;
mod timing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, ProviderKind};
use crate::llm_client::{AnthropicClient, BedrockClient, EvaluationProvider};
use crate::routes::build_router;
use crate::state::AppState;
use crate::timing::{FileResponseTimes, InMemoryResponseTimes, ResponseTimeStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting STAR review API v{}", env!("CARGO_PKG_VERSION"));

    let provider = build_provider(&config).await?;
    info!(
        "Evaluation provider initialized ({}, model: {})",
        provider.name(),
        provider.model()
    );

    let timings: Arc<dyn ResponseTimeStore> = match &config.response_times_path {
        Some(path) => {
            info!("Response times persisted to {path}");
            Arc::new(FileResponseTimes::new(
                path,
                config.response_times_cap,
                config.default_response_time,
            ))
        }
        None => Arc::new(InMemoryResponseTimes::new(
            config.response_times_cap,
            config.default_response_time,
        )),
    };

    let state = AppState { provider, timings };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs the provider selected by MODEL_PROVIDER.
async fn build_provider(config: &Config) -> Result<Arc<dyn EvaluationProvider>> {
    let provider: Arc<dyn EvaluationProvider> = match &config.provider {
        ProviderKind::Anthropic { api_key, model } => {
            Arc::new(AnthropicClient::new(api_key.clone(), model.clone())?)
        }
        ProviderKind::Bedrock { region, model_id } => {
            let client = BedrockClient::new(region.clone(), model_id.clone()).await;
            info!("Bedrock client initialized in {}", client.region());
            Arc::new(client)
        }
    };
    Ok(provider)
}
