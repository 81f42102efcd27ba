use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::telegram::{ChatId, MessageId, UserId};

/// A user is pending per chat, so the key is chat-scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl PendingKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self { chat_id, user_id }
    }
}

/// Join metadata for a member who has not answered the challenge yet
#[derive(Debug, Clone)]
pub struct PendingVerification {
    pub display_name: String,
    pub username: Option<String>,
    pub verified: bool,
    pub join_time: DateTime<Utc>,
    /// Messages to purge when the entry is retired, in send order
    pub messages_to_delete: Vec<MessageId>,
    /// Handle of the scheduled timeout task
    pub timer: Option<AbortHandle>,
}

impl PendingVerification {
    pub fn new(display_name: String, username: Option<String>) -> Self {
        Self {
            display_name,
            username,
            verified: false,
            join_time: Utc::now(),
            messages_to_delete: Vec::new(),
            timer: None,
        }
    }
}

/// Owns every pending entry. Retirement (`complete` or `expire`) is a
/// single atomic remove, so exactly one of the verifying message and the
/// timeout can win.
#[derive(Default)]
pub struct VerificationRegistry {
    pending: DashMap<PendingKey, PendingVerification>,
}

impl VerificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. Returns false if the user is already pending in
    /// that chat, leaving the existing entry untouched.
    pub fn register(&self, key: PendingKey, entry: PendingVerification) -> bool {
        match self.pending.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                debug!("Registered pending verification for {:?}", key);
                true
            }
        }
    }

    /// Remember the timer for an entry; aborts the timer if the entry is
    /// already gone
    pub fn attach_timer(&self, key: PendingKey, timer: AbortHandle) {
        match self.pending.get_mut(&key) {
            Some(mut entry) => entry.timer = Some(timer),
            None => timer.abort(),
        }
    }

    pub fn is_pending(&self, key: PendingKey) -> bool {
        self.pending
            .get(&key)
            .map(|e| !e.verified)
            .unwrap_or(false)
    }

    /// Record a message for later cleanup. Returns false if the user is not
    /// pending in that chat.
    pub fn track_message(&self, key: PendingKey, message_id: MessageId) -> bool {
        match self.pending.get_mut(&key) {
            Some(mut entry) if !entry.verified => {
                entry.messages_to_delete.push(message_id);
                true
            }
            _ => false,
        }
    }

    /// Retire an entry as verified. `None` means the entry was already
    /// retired (for instance by the timeout).
    pub fn complete(&self, key: PendingKey) -> Option<PendingVerification> {
        let (_, mut entry) = self.pending.remove_if(&key, |_, e| !e.verified)?;
        entry.verified = true;
        debug!("Retired {:?} as verified", key);
        Some(entry)
    }

    /// Retire an entry on timeout. `None` means it was already retired.
    pub fn expire(&self, key: PendingKey) -> Option<PendingVerification> {
        let (_, entry) = self.pending.remove_if(&key, |_, e| !e.verified)?;
        debug!("Retired {:?} on timeout", key);
        Some(entry)
    }

    pub fn get(&self, key: PendingKey) -> Option<PendingVerification> {
        self.pending.get(&key).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Shared verification registry type
pub type SharedVerificationRegistry = Arc<VerificationRegistry>;

pub fn create_shared_verification_registry() -> SharedVerificationRegistry {
    Arc::new(VerificationRegistry::new())
}
