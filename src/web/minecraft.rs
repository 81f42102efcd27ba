//! Minecraft server online/offline notices with uptime tracking.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Duration, Local};
use serde_json::json;
use teloxide::utils::markdown::escape;
use tracing::{error, info};

use super::RelayState;
use crate::telegram::{OutgoingMessage, ParseMode};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `Xh Ym Zs`
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.num_seconds().max(0);
    format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
}

/// MarkdownV2 text; every interpolated value is escaped
pub fn online_message(player: &str, at: DateTime<Local>) -> String {
    format!(
        "🟢 *MINECRAFT ONLINE*\n\n📱 *User*: {}\n🕒 *Time*: {}",
        escape(player),
        escape(&at.format(TIME_FORMAT).to_string())
    )
}

pub fn offline_message(player: &str, online_since: &str, offline_at: &str, uptime: &str) -> String {
    format!(
        "🔴 *MINECRAFT OFFLINE*\n\n📱 *User*: {}\n⬆️ *Online since*: {}\n⬇️ *Offline at*: {}\n⏱️ *Uptime*: {}",
        escape(player),
        escape(online_since),
        escape(offline_at),
        escape(uptime)
    )
}

/// GET /online
pub async fn online(State(state): State<RelayState>) -> impl IntoResponse {
    let now = Local::now();
    *state.online_since.write() = Some(now);

    let message = OutgoingMessage::new(state.chat_id, online_message(&state.player_name, now))
        .parse_mode(ParseMode::MarkdownV2);
    match state.notifier.send(message).await {
        Ok(_) => {
            info!("Online notification sent");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "message": "Minecraft online notification sent",
                    "timestamp": now.format(TIME_FORMAT).to_string(),
                })),
            )
        }
        Err(e) => {
            error!("Failed to send online notification: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Notification delivery failed",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

/// GET /offline
pub async fn offline(State(state): State<RelayState>) -> impl IntoResponse {
    let now = Local::now();
    let since = *state.online_since.read();

    let (online_at, uptime) = match since {
        Some(at) => (at.format(TIME_FORMAT).to_string(), format_uptime(now - at)),
        None => ("Not recorded".to_string(), "Unknown".to_string()),
    };
    let offline_at = now.format(TIME_FORMAT).to_string();

    let text = offline_message(&state.player_name, &online_at, &offline_at, &uptime);
    let message = OutgoingMessage::new(state.chat_id, text).parse_mode(ParseMode::MarkdownV2);
    match state.notifier.send(message).await {
        Ok(_) => {
            info!("Offline notification sent, uptime {}", uptime);
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "message": "System offline notification sent",
                    "online_at": online_at,
                    "offline_at": offline_at,
                    "uptime": uptime,
                })),
            )
        }
        Err(e) => {
            error!("Failed to send offline notification: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Notification delivery failed",
                    "details": e.to_string(),
                })),
            )
        }
    }
}
