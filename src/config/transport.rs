use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

use super::{flag, optional, parse_or, required, Lookup};
use crate::error::{BotError, Result};

/// How the bot receives updates from Telegram
#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    /// Long polling via `getUpdates`
    Polling,
    /// Telegram pushes updates to our HTTP endpoint
    Webhook(WebhookServerConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookServerConfig {
    /// Public URL registered with Telegram
    pub public_url: Url,
    /// Route the update handler is mounted on (always starts with `/`).
    /// Colons are percent-encoded so a bot token never reads as a route
    /// parameter.
    pub path: String,
    pub listen: SocketAddr,
    pub secret_token: Option<String>,
    /// Served directly when set; `None` behind a TLS-terminating proxy
    pub tls: Option<TlsFiles>,
    pub behind_proxy: bool,
}

impl TransportConfig {
    pub fn from_lookup(lookup: Lookup<'_>, token: &str) -> Result<Self> {
        let mode = optional(lookup, "MODE").unwrap_or_else(|| "poll".to_string());
        match mode.to_lowercase().as_str() {
            "poll" | "polling" => Ok(TransportConfig::Polling),
            "webhook" => Ok(TransportConfig::Webhook(WebhookServerConfig::from_lookup(
                lookup, token,
            )?)),
            other => Err(BotError::invalid(
                "MODE",
                format!("expected 'poll' or 'webhook', got '{}'", other),
            )),
        }
    }
}

impl WebhookServerConfig {
    pub fn from_lookup(lookup: Lookup<'_>, token: &str) -> Result<Self> {
        let host = required(lookup, "WEBHOOK_HOST")?;
        let host = host.trim_end_matches('/').to_string();

        let path = match optional(lookup, "WEBHOOK_PATH") {
            Some(p) if p.starts_with('/') => p,
            Some(p) => format!("/{}", p),
            None => format!("/{}", token),
        };
        let path = encode_path(&path);
        let public_url = Url::parse(&format!("{}{}", host, path))
            .map_err(|e| BotError::invalid("WEBHOOK_HOST", e.to_string()))?;

        let port: u16 = parse_or(lookup, "WEBHOOK_PORT", 8443)?;
        let listen_host = optional(lookup, "WEBHOOK_LISTEN").unwrap_or_else(|| "0.0.0.0".to_string());
        let listen: SocketAddr = format!("{}:{}", listen_host, port)
            .parse()
            .map_err(|e: std::net::AddrParseError| BotError::invalid("WEBHOOK_LISTEN", e.to_string()))?;

        let behind_proxy = flag(lookup, "BEHIND_PROXY", false);
        let tls = match (optional(lookup, "SSL_CERT"), optional(lookup, "SSL_KEY")) {
            (Some(cert), Some(key)) if !behind_proxy => Some(TlsFiles {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => None,
        };

        Ok(Self {
            public_url,
            path,
            listen,
            secret_token: optional(lookup, "WEBHOOK_SECRET_TOKEN"),
            tls,
            behind_proxy,
        })
    }
}

/// Telegram posts to the path byte for byte, so it must be a literal axum route
fn encode_path(path: &str) -> String {
    path.replace(':', "%3A")
}
