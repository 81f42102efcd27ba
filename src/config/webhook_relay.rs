use std::net::SocketAddr;

use super::{optional, parse_or, required, Lookup};
use crate::error::{BotError, Result};
use crate::telegram::ChatId;

/// Settings for the HTTP relays that turn incoming webhooks into chat
/// notifications
#[derive(Debug, Clone)]
pub struct WebhookRelayConfig {
    pub token: String,
    pub chat_id: ChatId,
    pub listen: SocketAddr,
    /// Fallback server name when the payload carries none
    pub server_name: Option<String>,
    /// Player shown in Minecraft status notices
    pub player_name: String,
}

impl WebhookRelayConfig {
    pub fn from_env(default_port: u16) -> Result<Self> {
        Self::from_lookup(&super::env_lookup, default_port)
    }

    pub fn from_lookup(lookup: Lookup<'_>, default_port: u16) -> Result<Self> {
        let token = required(lookup, "TELEGRAM_BOT_TOKEN")?;
        let chat_id = required(lookup, "TELEGRAM_CHAT_ID")?
            .parse::<i64>()
            .map(ChatId)
            .map_err(|e| BotError::invalid("TELEGRAM_CHAT_ID", e.to_string()))?;

        let host = optional(lookup, "LISTEN_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(lookup, "LISTEN_PORT", default_port)?;
        let listen = format!("{}:{}", host, port)
            .parse()
            .map_err(|e: std::net::AddrParseError| BotError::invalid("LISTEN_HOST", e.to_string()))?;

        Ok(Self {
            token,
            chat_id,
            listen,
            server_name: optional(lookup, "SERVER_NAME"),
            player_name: optional(lookup, "MC_PLAYER_NAME").unwrap_or_else(|| "player".to_string()),
        })
    }
}
