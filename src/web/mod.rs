//! HTTP relays that turn incoming webhooks into chat notifications
//!
//! Each relay is a small axum app that formats one payload into one
//! message and sends it to a fixed chat.

pub mod emby;
pub mod minecraft;
mod server;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::notifier::SharedNotifier;
use crate::telegram::ChatId;

pub use server::{emby_router, minecraft_router, run_emby, run_minecraft};

/// Shared state for relay handlers
#[derive(Clone)]
pub struct RelayState {
    pub notifier: SharedNotifier,
    pub chat_id: ChatId,
    pub server_name: Option<String>,
    pub player_name: String,
    /// Last time the Minecraft server reported online
    pub online_since: Arc<RwLock<Option<DateTime<Local>>>>,
}

impl RelayState {
    pub fn new(
        notifier: SharedNotifier,
        chat_id: ChatId,
        server_name: Option<String>,
        player_name: String,
    ) -> Self {
        Self {
            notifier,
            chat_id,
            server_name,
            player_name,
            online_since: Arc::new(RwLock::new(None)),
        }
    }
}
