//! HTTP front tier: Submission Coordinator + Retrieval Service.

mod auth;
mod coordinator;
mod dto;
mod error;
mod handlers;
mod retrieval;
mod state;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use landmarks_common::Config;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = Config::from_env()?;
    let listen_addr = config.listen_addr.clone();

    info!("starting submission-api");
    let state = Arc::new(AppState::new(config).await?);

    let app = Router::new()
        .route("/webhook", post(handlers::submit_webhook))
        .route("/webhook/:id", get(handlers::get_webhook_status))
        .route("/landmarks", get(handlers::get_landmarks))
        .route("/healthz", get(handlers::healthz))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = listen_addr.parse()?;
    info!(address = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
