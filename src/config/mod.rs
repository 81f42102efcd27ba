//! Process configuration, read once from the environment at startup.

pub mod admins;
pub mod bot;
pub mod transport;
pub mod webhook_relay;

pub use admins::AdminIdentitySet;
pub use bot::{BotConfig, GuardSettings, RelaySettings};
pub use transport::{TlsFiles, TransportConfig, WebhookServerConfig};
pub use webhook_relay::WebhookRelayConfig;

use std::str::FromStr;

use crate::error::{BotError, Result};

/// Source of configuration values, `std::env::var` in production
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Non-empty value for `key`, if any
fn optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(lookup: Lookup<'_>, key: &str) -> Result<String> {
    optional(lookup, key).ok_or_else(|| BotError::missing(key))
}

fn parse_or<T>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| BotError::invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn flag(lookup: Lookup<'_>, key: &str, default: bool) -> bool {
    match optional(lookup, key) {
        Some(raw) => matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}

#[cfg(test)]
pub(crate) fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}
