//! Emby server notifications, reformatted as HTML chat messages.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Display;
use teloxide::utils::html::escape;
use tracing::{debug, error, info, warn};

use super::RelayState;
use crate::telegram::{OutgoingMessage, ParseMode};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyNotification {
    pub event: String,
    #[serde(default)]
    pub server: Option<EmbyServer>,
    #[serde(default)]
    pub user: Option<EmbyUser>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// RFC 3339 timestamp of the event
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyServer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyUser {
    #[serde(default)]
    pub name: Option<String>,
}

/// Human label for an Emby event type
pub fn event_label(event: &str) -> String {
    let label = match event {
        "playback.start" => "Playback started",
        "playback.stop" => "Playback stopped",
        "playback.pause" => "Playback paused",
        "playback.unpause" => "Playback resumed",
        "playback.progress" => "Playback progress",
        "system.webhooktest" => "Webhook test",
        "system.notificationtest" => "Notification test",
        "system.wakingup" => "Server waking up",
        "system.shuttingdown" => "Server shutting down",
        "system.resumed" => "Server resumed",
        "system.update.available" | "system.updateavailable" => "Server update available",
        "system.update.installed" => "Server update installed",
        "system.serverrestartrequired" => "Server restart required",
        "library.new" => "New media",
        "library.update" => "Library updated",
        "library.deleted" => "Media deleted",
        "library.scanning" => "Library scan running",
        "library.scancomplete" => "Library scan complete",
        "user.login" => "User logged in",
        "user.logout" => "User logged out",
        "user.new" => "User created",
        "user.delete" => "User deleted",
        "user.authenticated" | "user.authentication.success" => "User authenticated",
        "user.authenticationfailed" => "User authentication failed",
        "user.authenticationerror" => "User authentication error",
        "user.password.reset" => "User password reset",
        "session.start" => "Session started",
        "session.end" => "Session ended",
        "session.timeout" => "Session timed out",
        "device.new" => "New device connected",
        "device.delete" => "Device removed",
        "task.completed" => "Task completed",
        "task.failed" => "Task failed",
        "transcoding.start" => "Transcoding started",
        "transcoding.end" => "Transcoding finished",
        "transcoding.error" => "Transcoding error",
        "plugins.pluginupdated" => "Plugin updated",
        "plugins.plugininstalled" => "Plugin installed",
        "item.rate" => "Item rated",
        other => return format!("Unknown event ({})", other),
    };
    label.to_string()
}

/// Render a notification. Event times are shown in `tz`; `now` is the
/// notification time.
pub fn format_notification<Tz>(
    notification: &EmbyNotification,
    fallback_server: Option<&str>,
    tz: &Tz,
    now: DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let server = notification.server.as_ref();
    let server_name = server
        .and_then(|s| s.name.as_deref())
        .or(fallback_server)
        .unwrap_or("Emby");

    let mut lines = vec![
        "<b>🎬 Emby notification</b>".to_string(),
        String::new(),
    ];

    let mut server_line = format!("📺 Server: {}", escape(server_name));
    if let Some(version) = server.and_then(|s| s.version.as_deref()).filter(|v| !v.is_empty()) {
        server_line.push_str(&format!(" (v{})", escape(version)));
    }
    lines.push(server_line);
    lines.push(format!("📝 Type: {}", escape(&event_label(&notification.event))));

    if let Some(user) = notification
        .user
        .as_ref()
        .and_then(|u| u.name.as_deref())
        .filter(|n| !n.is_empty())
    {
        lines.push(format!("👤 User: {}", escape(user)));
    }
    if let Some(title) = notification.title.as_deref().filter(|t| !t.is_empty()) {
        lines.push(format!("🎵 Title: {}", escape(title)));
    }
    if let Some(description) = notification.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("📝 Description: {}", escape(description)));
    }
    if let Some(date) = notification.date.as_deref() {
        match DateTime::parse_from_rfc3339(date) {
            Ok(at) => lines.push(format!(
                "⏰ Event time: {}",
                at.with_timezone(tz).format("%Y-%m-%d %H:%M:%S")
            )),
            Err(e) => warn!("Could not parse event date '{}': {}", date, e),
        }
    }
    lines.push(format!("⌚ Notified at: {}", now.format("%Y-%m-%d %H:%M:%S %Z")));

    lines.join("\n")
}

fn reply(status: StatusCode, outcome: &str, message: &str) -> axum::response::Response {
    (status, Json(json!({ "status": outcome, "message": message }))).into_response()
}

/// POST /webhook
pub async fn receive_notification(State(state): State<RelayState>, body: Bytes) -> impl IntoResponse {
    let payload: Value = match serde_json::from_slice::<Value>(&body) {
        Ok(value) if value.as_object().is_some_and(|o| !o.is_empty()) => value,
        _ => return reply(StatusCode::BAD_REQUEST, "error", "Invalid request data"),
    };
    if payload.get("Event").is_none() {
        return reply(StatusCode::BAD_REQUEST, "error", "Missing event type");
    }

    let notification: EmbyNotification = match serde_json::from_value(payload) {
        Ok(n) => n,
        Err(e) => {
            debug!("Malformed Emby payload: {}", e);
            return reply(StatusCode::BAD_REQUEST, "error", "Invalid request data");
        }
    };
    info!("Received Emby event {}", notification.event);

    let text = format_notification(&notification, state.server_name.as_deref(), &Local, Local::now());
    let message = OutgoingMessage::new(state.chat_id, text)
        .parse_mode(ParseMode::Html)
        .without_preview();

    match state.notifier.send(message).await {
        Ok(_) => reply(StatusCode::OK, "success", "Notification sent"),
        Err(e) => {
            error!("Failed to deliver Emby notification: {}", e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "error", "Failed to send notification")
        }
    }
}
