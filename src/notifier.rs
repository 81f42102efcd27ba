//! The messaging-platform capability the bots act through.
//!
//! Everything that touches Telegram from the state machines goes through
//! [`Notifier`], so handlers can be exercised against a recording double.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ReplyParameters};
use tracing::{debug, error};

use crate::error::{BotError, Result};
use crate::telegram::{ChatId, ChatPermissions, MessageId, OutgoingMessage, UserId};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    async fn restrict_user(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        permissions: ChatPermissions,
    ) -> Result<()>;

    async fn ban_user(&self, chat_id: ChatId, user_id: UserId, purge_history: bool) -> Result<()>;

    async fn forward_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId>;

    async fn pin_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    /// Unpin the most recently pinned message
    async fn unpin_message(&self, chat_id: ChatId) -> Result<()>;

    /// Grant or revoke the moderator rights (manage chat, delete messages,
    /// restrict members, pin)
    async fn set_moderator(&self, chat_id: ChatId, user_id: UserId, enabled: bool) -> Result<()>;

    /// Plain text without link previews
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId> {
        self.send(OutgoingMessage::new(chat_id, text).without_preview())
            .await
    }
}

pub type SharedNotifier = Arc<dyn Notifier>;

fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl Notifier for Bot {
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId> {
        let mut request = Requester::send_message(self, message.chat_id, message.text);
        if let Some(mode) = message.parse_mode {
            request = request.parse_mode(mode);
        }
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(reply_to));
        }
        if message.disable_web_page_preview {
            request = request.link_preview_options(no_preview());
        }
        request
            .await
            .map(|sent| sent.id)
            .map_err(BotError::telegram("sendMessage"))
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        Requester::delete_message(self, chat_id, message_id)
            .await
            .map(|_| ())
            .map_err(BotError::telegram("deleteMessage"))
    }

    async fn restrict_user(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        permissions: ChatPermissions,
    ) -> Result<()> {
        Requester::restrict_chat_member(self, chat_id, user_id, permissions)
            .await
            .map(|_| ())
            .map_err(BotError::telegram("restrictChatMember"))
    }

    async fn ban_user(&self, chat_id: ChatId, user_id: UserId, purge_history: bool) -> Result<()> {
        Requester::ban_chat_member(self, chat_id, user_id)
            .revoke_messages(purge_history)
            .await
            .map(|_| ())
            .map_err(BotError::telegram("banChatMember"))
    }

    async fn forward_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: MessageId,
    ) -> Result<MessageId> {
        Requester::forward_message(self, to, from, message_id)
            .await
            .map(|forwarded| forwarded.id)
            .map_err(BotError::telegram("forwardMessage"))
    }

    async fn pin_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        Requester::pin_chat_message(self, chat_id, message_id)
            .await
            .map(|_| ())
            .map_err(BotError::telegram("pinChatMessage"))
    }

    async fn unpin_message(&self, chat_id: ChatId) -> Result<()> {
        Requester::unpin_chat_message(self, chat_id)
            .await
            .map(|_| ())
            .map_err(BotError::telegram("unpinChatMessage"))
    }

    async fn set_moderator(&self, chat_id: ChatId, user_id: UserId, enabled: bool) -> Result<()> {
        Requester::promote_chat_member(self, chat_id, user_id)
            .can_manage_chat(enabled)
            .can_delete_messages(enabled)
            .can_restrict_members(enabled)
            .can_pin_messages(enabled)
            .await
            .map(|_| ())
            .map_err(BotError::telegram("promoteChatMember"))
    }
}

/// Delete every message now, logging (not raising) individual failures
pub async fn delete_all(notifier: &dyn Notifier, chat_id: ChatId, message_ids: &[MessageId]) {
    for message_id in message_ids {
        if let Err(e) = notifier.delete_message(chat_id, *message_id).await {
            error!(
                "Failed to delete message {} in chat {}: {}",
                message_id.0, chat_id, e
            );
        }
    }
}

/// Schedule deletion of messages after `delay` without blocking the caller
pub fn delete_later(
    notifier: SharedNotifier,
    chat_id: ChatId,
    message_ids: Vec<MessageId>,
    delay: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        debug!(
            "Deleting {} delayed message(s) in chat {}",
            message_ids.len(),
            chat_id
        );
        delete_all(notifier.as_ref(), chat_id, &message_ids).await;
    })
}

#[cfg(test)]
pub mod testing {
    //! Recording notifier used by the state machine tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use teloxide::{ApiError, RequestError};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Send(OutgoingMessage),
        Delete(ChatId, MessageId),
        Restrict(ChatId, UserId, ChatPermissions),
        Ban(ChatId, UserId, bool),
        Forward(ChatId, ChatId, MessageId),
        Pin(ChatId, MessageId),
        Unpin(ChatId),
        Moderator(ChatId, UserId, bool),
    }

    pub struct RecordingNotifier {
        calls: Mutex<Vec<Call>>,
        next_id: AtomicI32,
        fail_deletes: AtomicBool,
        fail_restricts: AtomicBool,
        fail_sends_to: Mutex<Vec<ChatId>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                next_id: AtomicI32::new(1000),
                fail_deletes: AtomicBool::new(false),
                fail_restricts: AtomicBool::new(false),
                fail_sends_to: Mutex::new(Vec::new()),
            })
        }

        pub fn fail_deletes(&self) {
            self.fail_deletes.store(true, Ordering::SeqCst);
        }

        pub fn fail_restricts(&self) {
            self.fail_restricts.store(true, Ordering::SeqCst);
        }

        pub fn fail_sends_to(&self, chat_id: ChatId) {
            self.fail_sends_to.lock().push(chat_id);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn sent(&self) -> Vec<OutgoingMessage> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Send(m) => Some(m),
                    _ => None,
                })
                .collect()
        }

        pub fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter(|m| m.chat_id == chat_id)
                .map(|m| m.text)
                .collect()
        }

        pub fn deleted(&self) -> Vec<MessageId> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Delete(_, id) => Some(id),
                    _ => None,
                })
                .collect()
        }

        pub fn bans(&self) -> Vec<(ChatId, UserId, bool)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Ban(chat, user, purge) => Some((chat, user, purge)),
                    _ => None,
                })
                .collect()
        }

        pub fn restrictions(&self) -> Vec<(UserId, ChatPermissions)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Restrict(_, user, permissions) => Some((user, permissions)),
                    _ => None,
                })
                .collect()
        }

        fn next_message_id(&self) -> MessageId {
            MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: OutgoingMessage) -> Result<MessageId> {
            let chat_id = message.chat_id;
            self.calls.lock().push(Call::Send(message));
            if self.fail_sends_to.lock().contains(&chat_id) {
                return Err(BotError::Telegram {
                    method: "sendMessage",
                    source: RequestError::Api(ApiError::BotBlocked),
                });
            }
            Ok(self.next_message_id())
        }

        async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
            self.calls.lock().push(Call::Delete(chat_id, message_id));
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(BotError::Telegram {
                    method: "deleteMessage",
                    source: RequestError::Api(ApiError::MessageToDeleteNotFound),
                });
            }
            Ok(())
        }

        async fn restrict_user(
            &self,
            chat_id: ChatId,
            user_id: UserId,
            permissions: ChatPermissions,
        ) -> Result<()> {
            self.calls
                .lock()
                .push(Call::Restrict(chat_id, user_id, permissions));
            if self.fail_restricts.load(Ordering::SeqCst) {
                return Err(BotError::Telegram {
                    method: "restrictChatMember",
                    source: RequestError::Api(ApiError::NotEnoughRightsToRestrict),
                });
            }
            Ok(())
        }

        async fn ban_user(
            &self,
            chat_id: ChatId,
            user_id: UserId,
            purge_history: bool,
        ) -> Result<()> {
            self.calls
                .lock()
                .push(Call::Ban(chat_id, user_id, purge_history));
            Ok(())
        }

        async fn forward_message(
            &self,
            to: ChatId,
            from: ChatId,
            message_id: MessageId,
        ) -> Result<MessageId> {
            self.calls.lock().push(Call::Forward(to, from, message_id));
            Ok(self.next_message_id())
        }

        async fn pin_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
            self.calls.lock().push(Call::Pin(chat_id, message_id));
            Ok(())
        }

        async fn unpin_message(&self, chat_id: ChatId) -> Result<()> {
            self.calls.lock().push(Call::Unpin(chat_id));
            Ok(())
        }

        async fn set_moderator(
            &self,
            chat_id: ChatId,
            user_id: UserId,
            enabled: bool,
        ) -> Result<()> {
            self.calls
                .lock()
                .push(Call::Moderator(chat_id, user_id, enabled));
            Ok(())
        }
    }
}
