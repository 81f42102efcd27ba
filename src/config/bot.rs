use std::path::PathBuf;
use std::time::Duration;

use super::{flag, optional, parse_or, required, AdminIdentitySet, Lookup, TransportConfig};
use crate::error::{BotError, Result};

/// Settings shared by the chat bots (`guard` and `relay`)
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub admins: AdminIdentitySet,
    pub transport: TransportConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&super::env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let token = required(lookup, "BOT_TOKEN")?;

        let admins = match optional(lookup, "ADMIN_IDS") {
            Some(raw) => AdminIdentitySet::parse("ADMIN_IDS", &raw)?,
            None => match optional(lookup, "ADMIN_ID") {
                Some(raw) => AdminIdentitySet::parse("ADMIN_ID", &raw)?,
                None => return Err(BotError::missing("ADMIN_IDS")),
            },
        };

        let transport = TransportConfig::from_lookup(lookup, &token)?;

        Ok(Self {
            token,
            admins,
            transport,
        })
    }
}

/// Timing and wording of the join-verification gate
#[derive(Debug, Clone, PartialEq)]
pub struct GuardSettings {
    /// How long a new member has to send the challenge phrase
    pub verify_timeout: Duration,
    /// Delay before transient bot replies are cleaned up
    pub delete_delay: Duration,
    /// Delay before the timeout notice is removed
    pub ban_notice_delay: Duration,
    pub challenge_phrase: String,
    /// Also revoke the user's message history when banning on timeout
    pub purge_on_timeout: bool,
    pub language_keyword: String,
    pub language_pack: String,
    /// One pattern per line; a missing file means no filtering
    pub content_filter_path: PathBuf,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            verify_timeout: Duration::from_secs(30),
            delete_delay: Duration::from_secs(3),
            ban_notice_delay: Duration::from_secs(3),
            challenge_phrase: "hi".to_string(),
            purge_on_timeout: true,
            language_keyword: "中文".to_string(),
            language_pack: "zhcncc".to_string(),
            content_filter_path: PathBuf::from("content_filter.txt"),
        }
    }
}

impl GuardSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&super::env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            verify_timeout: Duration::from_secs(parse_or(lookup, "VERIFY_TIMEOUT", 30)?),
            delete_delay: Duration::from_secs(parse_or(lookup, "DELETE_DELAY", 3)?),
            ban_notice_delay: Duration::from_secs(parse_or(lookup, "BAN_MSG_DELAY", 3)?),
            challenge_phrase: optional(lookup, "CHALLENGE_PHRASE")
                .unwrap_or(defaults.challenge_phrase),
            purge_on_timeout: flag(lookup, "PURGE_ON_TIMEOUT", defaults.purge_on_timeout),
            language_keyword: optional(lookup, "LANGUAGE_KEYWORD")
                .unwrap_or(defaults.language_keyword),
            language_pack: optional(lookup, "LANGUAGE_PACK").unwrap_or(defaults.language_pack),
            content_filter_path: optional(lookup, "CONTENT_FILTER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_filter_path),
        })
    }

    /// Whether `text` answers the challenge: case-insensitive, but otherwise
    /// the whole message, surrounding whitespace included
    pub fn is_challenge_answer(&self, text: &str) -> bool {
        text.to_lowercase() == self.challenge_phrase.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub block_list_path: PathBuf,
}

impl RelaySettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&super::env_lookup)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self> {
        Ok(Self {
            block_list_path: optional(lookup, "BLOCK_LIST_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("blocked_users.json")),
        })
    }
}
