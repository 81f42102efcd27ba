use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::Bot;
use tracing::info;

use super::{emby, minecraft, RelayState};
use crate::config::WebhookRelayConfig;
use crate::notifier::SharedNotifier;

const EMBY_PORT: u16 = 5003;
const MINECRAFT_PORT: u16 = 5007;

pub fn emby_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(emby::receive_notification))
        .with_state(state)
}

pub fn minecraft_router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/online", get(minecraft::online))
        .route("/offline", get(minecraft::offline))
        .with_state(state)
}

fn relay_state(config: &WebhookRelayConfig) -> RelayState {
    let notifier: SharedNotifier = Arc::new(Bot::new(&config.token));
    RelayState::new(
        notifier,
        config.chat_id,
        config.server_name.clone(),
        config.player_name.clone(),
    )
}

/// Run the Emby notification relay
pub async fn run_emby() -> anyhow::Result<()> {
    let config = WebhookRelayConfig::from_env(EMBY_PORT)?;
    info!("Emby notifications go to chat {}", config.chat_id);
    serve(config.listen, emby_router(relay_state(&config))).await
}

/// Run the Minecraft status relay
pub async fn run_minecraft() -> anyhow::Result<()> {
    let config = WebhookRelayConfig::from_env(MINECRAFT_PORT)?;
    info!("Minecraft notices for {} go to chat {}", config.player_name, config.chat_id);
    serve(config.listen, minecraft_router(relay_state(&config))).await
}

async fn serve(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Webhook relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Health check endpoint
async fn health() -> &'static str {
    "Webhook relay running"
}
