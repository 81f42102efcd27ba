//! Private-message relay between end users and the administrators.
//!
//! User messages reach every admin as a header carrying the user id marker
//! followed by the forwarded original. An admin answers by replying to
//! either of those; the marker tells the relay where the answer goes.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::AdminIdentitySet;
use crate::error::Result;
use crate::events::{CommandEvent, MessageContext, TextEvent};
use crate::messages;
use crate::notifier::SharedNotifier;
use crate::state::SharedBlockStore;
use crate::telegram::{ChatId, OutgoingMessage, UserId};

pub struct MessageRelay {
    admins: AdminIdentitySet,
    block_store: SharedBlockStore,
    notifier: SharedNotifier,
}

impl MessageRelay {
    pub fn new(admins: AdminIdentitySet, block_store: SharedBlockStore, notifier: SharedNotifier) -> Self {
        Self {
            admins,
            block_store,
            notifier,
        }
    }

    /// `/start`: tell the user how the bot works
    pub async fn start(&self, command: &CommandEvent) -> Result<()> {
        self.reply(&command.context, messages::RELAY_WELCOME).await;
        Ok(())
    }

    pub async fn on_message(&self, event: &TextEvent) -> Result<()> {
        let context = &event.context;
        if !context.is_private {
            debug!("Ignoring message {} from group chat {}", context.message_id.0, context.chat_id);
            return Ok(());
        }

        if self.admins.contains(context.sender.user_id) {
            self.relay_admin_reply(event).await
        } else {
            self.relay_to_admins(context).await
        }
    }

    async fn relay_to_admins(&self, context: &MessageContext) -> Result<()> {
        let sender = &context.sender;
        if self.block_store.is_blocked(&sender.user_id.to_string()).await {
            info!("Blocked user {} tried to use the relay", sender.user_id);
            self.reply(context, messages::RELAY_BLOCKED).await;
            return Ok(());
        }

        let header = messages::relay_header(sender);
        let mut delivered = true;
        for admin in self.admins.iter() {
            let admin_chat = ChatId::from(admin);
            let result = match self.notifier.send_text(admin_chat, &header).await {
                Ok(_) => {
                    self.notifier
                        .forward_message(admin_chat, context.chat_id, context.message_id)
                        .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                error!(
                    "Failed to forward message {} from {} to admin {}: {}",
                    context.message_id.0, sender.user_id, admin, e
                );
                delivered = false;
            }
        }

        if delivered {
            debug!("Relayed message {} from {}", context.message_id.0, sender.user_id);
            self.reply(context, messages::RELAY_FORWARDED).await;
        } else {
            self.reply(context, messages::RELAY_FORWARD_FAILED).await;
        }
        Ok(())
    }

    async fn relay_admin_reply(&self, event: &TextEvent) -> Result<()> {
        let context = &event.context;
        let Some(reply_to) = &context.reply_to else {
            debug!("Admin {} sent a message that is not a reply", context.sender.user_id);
            return Ok(());
        };

        let target = reply_to
            .text
            .as_deref()
            .and_then(messages::extract_user_id)
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(UserId);
        let Some(target) = target else {
            self.reply(context, messages::RELAY_NEEDS_MARKER).await;
            return Ok(());
        };

        let target_chat = ChatId::from(target);
        let result = match &event.text {
            Some(text) => self.notifier.send_text(target_chat, text).await,
            None => {
                self.notifier
                    .forward_message(target_chat, context.chat_id, context.message_id)
                    .await
            }
        };

        match result {
            Ok(_) => {
                info!("Admin {} replied to user {}", context.sender.user_id, target);
                self.reply(context, messages::RELAY_REPLY_SENT).await;
            }
            Err(e) => {
                error!("Failed to deliver admin reply to {}: {}", target, e);
                self.reply(context, messages::RELAY_REPLY_FAILED).await;
            }
        }
        Ok(())
    }

    async fn reply(&self, context: &MessageContext, text: &str) {
        let message = OutgoingMessage::new(context.chat_id, text).reply_to(context.message_id);
        if let Err(e) = self.notifier.send(message).await {
            error!("Failed to reply in chat {}: {}", context.chat_id, e);
        }
    }
}

/// Shared message relay type
pub type SharedMessageRelay = Arc<MessageRelay>;
