use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::AdminIdentitySet;
use crate::error::{BotError, Result};
use crate::events::{CommandEvent, MemberInfo, MessageContext, ReplyTarget};
use crate::messages;
use crate::notifier::{delete_later, SharedNotifier};
use crate::state::SharedBlockStore;
use crate::telegram::{permissions, ChatId, MessageId, OutgoingMessage, UserId};

/// Administrative commands gated by the admin allow-list
pub struct AdminOps {
    admins: AdminIdentitySet,
    block_store: SharedBlockStore,
    notifier: SharedNotifier,
    delete_delay: Duration,
}

impl AdminOps {
    pub fn new(
        admins: AdminIdentitySet,
        block_store: SharedBlockStore,
        notifier: SharedNotifier,
        delete_delay: Duration,
    ) -> Self {
        Self {
            admins,
            block_store,
            notifier,
            delete_delay,
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.contains(user_id)
    }

    /// `/d`: delete the replied-to message along with the command.
    /// Non-admins have their command removed without any reply.
    pub async fn delete_message(&self, command: &CommandEvent) -> Result<()> {
        let Some(target) = self.reply_target(command, messages::REPLY_TO_DELETE).await else {
            return Ok(());
        };
        let context = &command.context;

        self.delete_quietly(context.chat_id, target.message_id).await;
        self.delete_quietly(context.chat_id, context.message_id).await;
        info!(
            "Admin {} deleted message {} in chat {}",
            context.sender.user_id, target.message_id.0, context.chat_id
        );
        Ok(())
    }

    /// `/mdel`: delete every message from the replied-to one up to and
    /// including the command. Ids that are gone already are skipped.
    pub async fn delete_range(&self, command: &CommandEvent) -> Result<()> {
        let Some(target) = self.reply_target(command, messages::REPLY_TO_MDEL).await else {
            return Ok(());
        };
        let context = &command.context;

        let mut deleted = 0;
        for id in target.message_id.0..=context.message_id.0 {
            match self.notifier.delete_message(context.chat_id, MessageId(id)).await {
                Ok(()) => deleted += 1,
                Err(e) => debug!("Skipping message {} in chat {}: {}", id, context.chat_id, e),
            }
        }
        info!(
            "Admin {} bulk deleted {} message(s) in chat {}",
            context.sender.user_id, deleted, context.chat_id
        );
        self.transient(context.chat_id, messages::MDEL_DONE).await;
        Ok(())
    }

    /// `/mute`: take every permission from the replied-to author
    pub async fn mute(&self, command: &CommandEvent) -> Result<()> {
        let Some(member) = self.target_member(command, messages::REPLY_TO_MUTE).await else {
            return Ok(());
        };
        let context = &command.context;

        match self
            .notifier
            .restrict_user(context.chat_id, member.user_id, permissions::muted())
            .await
        {
            Ok(()) => {
                info!("Admin {} muted {} in chat {}", context.sender.user_id, member.user_id, context.chat_id);
                self.confirm(context, messages::muted_confirmation(&member.display_name))
                    .await;
            }
            Err(e) => self.report_failure(context, "mute the user", e).await,
        }
        Ok(())
    }

    /// `/unmute`: give the replied-to author regular member rights back
    pub async fn unmute(&self, command: &CommandEvent) -> Result<()> {
        let Some(member) = self.target_member(command, messages::REPLY_TO_UNMUTE).await else {
            return Ok(());
        };
        let context = &command.context;

        match self
            .notifier
            .restrict_user(context.chat_id, member.user_id, permissions::member())
            .await
        {
            Ok(()) => {
                info!("Admin {} unmuted {} in chat {}", context.sender.user_id, member.user_id, context.chat_id);
                self.confirm(context, messages::unmuted_confirmation(&member.display_name))
                    .await;
            }
            Err(e) => self.report_failure(context, "unmute the user", e).await,
        }
        Ok(())
    }

    pub async fn pin(&self, command: &CommandEvent) -> Result<()> {
        let Some(target) = self.reply_target(command, messages::REPLY_TO_PIN).await else {
            return Ok(());
        };
        let context = &command.context;

        match self.notifier.pin_message(context.chat_id, target.message_id).await {
            Ok(()) => self.confirm(context, messages::PINNED).await,
            Err(e) => self.report_failure(context, "pin the message", e).await,
        }
        Ok(())
    }

    /// `/unpin`: unpin the most recent pinned message; needs no reply
    pub async fn unpin(&self, command: &CommandEvent) -> Result<()> {
        if !self.admin_gate(command).await {
            return Ok(());
        }
        let context = &command.context;

        match self.notifier.unpin_message(context.chat_id).await {
            Ok(()) => self.confirm(context, messages::UNPINNED).await,
            Err(e) => self.report_failure(context, "unpin the message", e).await,
        }
        Ok(())
    }

    /// `/admin`: make the replied-to author a chat moderator
    pub async fn promote(&self, command: &CommandEvent) -> Result<()> {
        self.set_moderator(command, true).await
    }

    /// `/unadmin`: revoke the moderator rights granted by `/admin`
    pub async fn demote(&self, command: &CommandEvent) -> Result<()> {
        self.set_moderator(command, false).await
    }

    async fn set_moderator(&self, command: &CommandEvent, enabled: bool) -> Result<()> {
        let usage = if enabled {
            messages::REPLY_TO_PROMOTE
        } else {
            messages::REPLY_TO_DEMOTE
        };
        let Some(member) = self.target_member(command, usage).await else {
            return Ok(());
        };
        let context = &command.context;

        match self
            .notifier
            .set_moderator(context.chat_id, member.user_id, enabled)
            .await
        {
            Ok(()) => {
                info!(
                    "Admin {} set moderator={} for {} in chat {}",
                    context.sender.user_id, enabled, member.user_id, context.chat_id
                );
                let text = if enabled {
                    messages::promoted_confirmation(&member.display_name)
                } else {
                    messages::demoted_confirmation(&member.display_name)
                };
                self.confirm(context, text).await;
            }
            Err(e) => {
                let action = if enabled { "promote the user" } else { "demote the user" };
                self.report_failure(context, action, e).await;
            }
        }
        Ok(())
    }

    /// `/ban`: add the target to the block list and tell them
    pub async fn ban(&self, command: &CommandEvent) -> Result<()> {
        let Some(target) = self.authorize_and_resolve(command).await else {
            return Ok(());
        };

        self.block_store.block(&target).await;
        self.reply(&command.context, messages::blocked_confirmation(&target))
            .await;
        self.notify_target(&target, messages::BLOCKED_NOTICE).await;
        Ok(())
    }

    /// `/unban`: remove the target from the block list and tell them
    pub async fn unban(&self, command: &CommandEvent) -> Result<()> {
        let Some(target) = self.authorize_and_resolve(command).await else {
            return Ok(());
        };

        if self.block_store.unblock(&target).await {
            self.reply(&command.context, messages::unblocked_confirmation(&target))
                .await;
            self.notify_target(&target, messages::UNBLOCKED_NOTICE).await;
        } else {
            self.reply(&command.context, messages::not_blocked(&target))
                .await;
        }
        Ok(())
    }

    /// Non-admins lose their moderation command without a reply
    async fn admin_gate(&self, command: &CommandEvent) -> bool {
        let context = &command.context;
        if self.is_admin(context.sender.user_id) {
            return true;
        }
        info!(
            "Non-admin {} used /{} in chat {}, removing it",
            context.sender.user_id, command.name, context.chat_id
        );
        self.delete_quietly(context.chat_id, context.message_id).await;
        false
    }

    /// The message a moderation command replies to. Without one the caller
    /// gets `usage`, and both messages are cleaned up after the delay.
    async fn reply_target<'a>(&self, command: &'a CommandEvent, usage: &str) -> Option<&'a ReplyTarget> {
        if !self.admin_gate(command).await {
            return None;
        }
        let target = command.context.reply_to.as_ref();
        if target.is_none() {
            self.usage(&command.context, usage).await;
        }
        target
    }

    /// Author of the replied-to message, for commands that act on a member
    async fn target_member<'a>(&self, command: &'a CommandEvent, usage: &str) -> Option<&'a MemberInfo> {
        let target = self.reply_target(command, usage).await?;
        match &target.sender {
            Some(sender) => Some(sender),
            None => {
                warn!(
                    "Message {} in chat {} has no author to act on",
                    target.message_id.0, command.context.chat_id
                );
                self.usage(&command.context, usage).await;
                None
            }
        }
    }

    async fn usage(&self, context: &MessageContext, text: &str) {
        let usage = OutgoingMessage::new(context.chat_id, text).reply_to(context.message_id);
        let mut cleanup = vec![context.message_id];
        match self.notifier.send(usage).await {
            Ok(message_id) => cleanup.push(message_id),
            Err(e) => error!("Failed to send usage in chat {}: {}", context.chat_id, e),
        }
        delete_later(self.notifier.clone(), context.chat_id, cleanup, self.delete_delay);
    }

    /// Post a short-lived confirmation and remove the command
    async fn confirm(&self, context: &MessageContext, text: impl Into<String>) {
        self.transient(context.chat_id, text).await;
        self.delete_quietly(context.chat_id, context.message_id).await;
    }

    async fn report_failure(&self, context: &MessageContext, action: &str, e: BotError) {
        error!("Failed to {} in chat {}: {}", action, context.chat_id, e);
        self.transient(context.chat_id, messages::action_failed(action)).await;
    }

    /// Message that removes itself after the delete delay
    async fn transient(&self, chat_id: ChatId, text: impl Into<String>) {
        match self.notifier.send(OutgoingMessage::new(chat_id, text)).await {
            Ok(message_id) => {
                delete_later(self.notifier.clone(), chat_id, vec![message_id], self.delete_delay);
            }
            Err(e) => error!("Failed to post notice in chat {}: {}", chat_id, e),
        }
    }

    /// Check the caller is an admin and find the user a ban command is
    /// about: first the marker in the replied-to message, then the first
    /// argument. Replies with the reason when either is missing.
    async fn authorize_and_resolve(&self, command: &CommandEvent) -> Option<String> {
        let context = &command.context;
        if !self.is_admin(context.sender.user_id) {
            warn!(
                "User {} tried /{} without permission",
                context.sender.user_id, command.name
            );
            self.reply(context, messages::ADMINS_ONLY).await;
            return None;
        }

        let from_reply = context
            .reply_to
            .as_ref()
            .and_then(|reply| reply.text.as_deref())
            .and_then(messages::extract_user_id);

        match from_reply.or_else(|| command.args.first().cloned()) {
            Some(target) => Some(target),
            None => {
                self.reply(context, messages::ban_usage(&command.name))
                    .await;
                None
            }
        }
    }

    /// Best-effort status notice to the affected user
    async fn notify_target(&self, target: &str, text: &str) {
        let Ok(user_id) = target.parse::<u64>().map(UserId) else {
            warn!("Cannot notify '{}': not a numeric user id", target);
            return;
        };
        if let Err(e) = self.notifier.send_text(ChatId::from(user_id), text).await {
            warn!("Failed to notify user {}: {}", user_id, e);
        }
    }

    async fn reply(&self, context: &MessageContext, text: impl Into<String>) {
        let message = OutgoingMessage::new(context.chat_id, text).reply_to(context.message_id);
        if let Err(e) = self.notifier.send(message).await {
            error!("Failed to reply in chat {}: {}", context.chat_id, e);
        }
    }

    async fn delete_quietly(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.notifier.delete_message(chat_id, message_id).await {
            error!("Failed to delete message {} in chat {}: {}", message_id.0, chat_id, e);
        }
    }
}

/// Shared admin ops type
pub type SharedAdminOps = Arc<AdminOps>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::testing::{Call, RecordingNotifier};
    use crate::state::BlockStore;

    const ADMIN: UserId = UserId(1);
    const CHAT: ChatId = ChatId(100);

    async fn setup() -> (AdminOps, Arc<RecordingNotifier>, SharedBlockStore) {
        let notifier = RecordingNotifier::new();
        let path = std::env::temp_dir().join(format!("admin-{}.json", uuid::Uuid::new_v4()));
        let block_store = Arc::new(BlockStore::load(path).await);
        let ops = AdminOps::new(
            AdminIdentitySet::new([ADMIN]),
            block_store.clone(),
            notifier.clone(),
            Duration::from_secs(3),
        );
        (ops, notifier, block_store)
    }

    fn command(sender: UserId, name: &str, args: &[&str], reply: Option<ReplyTarget>) -> CommandEvent {
        CommandEvent {
            context: MessageContext {
                chat_id: CHAT,
                chat_title: None,
                is_private: false,
                message_id: MessageId(10),
                sender: MemberInfo {
                    user_id: sender,
                    display_name: "someone".to_string(),
                    username: None,
                    is_bot: false,
                },
                reply_to: reply,
            },
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn reply_with(text: &str) -> Option<ReplyTarget> {
        Some(ReplyTarget {
            message_id: MessageId(5),
            text: Some(text.to_string()),
            sender: None,
        })
    }

    fn reply_from(user: u64, name: &str) -> Option<ReplyTarget> {
        Some(ReplyTarget {
            message_id: MessageId(5),
            text: Some("hello".to_string()),
            sender: Some(MemberInfo {
                user_id: UserId(user),
                display_name: name.to_string(),
                username: None,
                is_bot: false,
            }),
        })
    }

    #[tokio::test]
    async fn test_non_admin_delete_is_silent() {
        let (ops, notifier, _) = setup().await;

        ops.delete_message(&command(UserId(9), "d", &[], None))
            .await
            .unwrap();

        assert_eq!(notifier.calls(), vec![Call::Delete(CHAT, MessageId(10))]);
    }

    #[tokio::test]
    async fn test_admin_delete_removes_target_and_command() {
        let (ops, notifier, _) = setup().await;

        ops.delete_message(&command(ADMIN, "d", &[], reply_with("spam")))
            .await
            .unwrap();

        assert_eq!(notifier.deleted(), vec![MessageId(5), MessageId(10)]);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_delete_without_reply_shows_usage() {
        let (ops, notifier, _) = setup().await;

        ops.delete_message(&command(ADMIN, "d", &[], None))
            .await
            .unwrap();
        assert_eq!(notifier.sent_to(CHAT), vec![messages::REPLY_TO_DELETE.to_string()]);
        assert!(notifier.deleted().is_empty());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(notifier.deleted(), vec![MessageId(10), MessageId(1000)]);
    }

    #[tokio::test]
    async fn test_ban_by_argument_and_unban_by_reply() {
        let (ops, notifier, store) = setup().await;

        ops.ban(&command(ADMIN, "ban", &["77"], None)).await.unwrap();
        assert!(store.is_blocked("77").await);
        assert_eq!(
            notifier.sent_to(ChatId(77)),
            vec![messages::BLOCKED_NOTICE.to_string()]
        );

        let header = "From: Bob (none)\nUser ID: 77\n----";
        ops.unban(&command(ADMIN, "unban", &[], reply_with(header)))
            .await
            .unwrap();
        assert!(!store.is_blocked("77").await);
        assert_eq!(notifier.sent_to(ChatId(77)).len(), 2);
        assert!(notifier.sent_to(CHAT).contains(&messages::unblocked_confirmation("77")));

        tokio::fs::remove_file(store.path()).await.ok();
    }

    #[tokio::test]
    async fn test_ban_requires_admin_and_target() {
        let (ops, notifier, store) = setup().await;

        ops.ban(&command(UserId(9), "ban", &["77"], None)).await.unwrap();
        assert!(!store.is_blocked("77").await);
        assert_eq!(notifier.sent_to(CHAT), vec![messages::ADMINS_ONLY.to_string()]);

        // Reply without a marker and no argument
        ops.ban(&command(ADMIN, "ban", &[], reply_with("just text"))).await.unwrap();
        assert_eq!(notifier.sent_to(CHAT)[1], messages::ban_usage("ban"));
        assert!(store.blocked_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_unban_unknown_user_reports_it() {
        let (ops, notifier, _) = setup().await;

        ops.unban(&command(ADMIN, "unban", &["5"], None)).await.unwrap();
        assert_eq!(notifier.sent_to(CHAT), vec![messages::not_blocked("5")]);
        assert!(notifier.sent_to(ChatId(5)).is_empty());
    }

    #[tokio::test]
    async fn test_failed_notice_keeps_block() {
        let (ops, notifier, store) = setup().await;
        notifier.fail_sends_to(ChatId(77));

        ops.ban(&command(ADMIN, "ban", &["77"], None)).await.unwrap();
        assert!(store.is_blocked("77").await);
        assert!(notifier.sent_to(CHAT).contains(&messages::blocked_confirmation("77")));

        tokio::fs::remove_file(store.path()).await.ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_and_unmute_reply_author() {
        let (ops, notifier, _) = setup().await;

        ops.mute(&command(ADMIN, "mute", &[], reply_from(77, "Bob")))
            .await
            .unwrap();
        assert_eq!(notifier.restrictions(), vec![(UserId(77), permissions::muted())]);
        assert_eq!(notifier.sent_to(CHAT), vec![messages::muted_confirmation("Bob")]);
        assert_eq!(notifier.deleted(), vec![MessageId(10)]);

        // The confirmation goes away on its own
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(notifier.deleted(), vec![MessageId(10), MessageId(1000)]);

        ops.unmute(&command(ADMIN, "unmute", &[], reply_from(77, "Bob")))
            .await
            .unwrap();
        assert_eq!(
            notifier.restrictions().last(),
            Some(&(UserId(77), permissions::member()))
        );
        assert_eq!(notifier.sent_to(CHAT)[1], messages::unmuted_confirmation("Bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_moderation_commands_are_silent_for_non_admins() {
        let (ops, notifier, _) = setup().await;
        let stranger = UserId(9);

        ops.mute(&command(stranger, "mute", &[], reply_from(77, "Bob"))).await.unwrap();
        ops.pin(&command(stranger, "pin", &[], reply_from(77, "Bob"))).await.unwrap();
        ops.unpin(&command(stranger, "unpin", &[], None)).await.unwrap();
        ops.promote(&command(stranger, "admin", &[], reply_from(77, "Bob"))).await.unwrap();
        ops.delete_range(&command(stranger, "mdel", &[], reply_from(77, "Bob"))).await.unwrap();

        assert!(notifier
            .calls()
            .iter()
            .all(|call| *call == Call::Delete(CHAT, MessageId(10))));
        assert_eq!(notifier.calls().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_needs_a_reply_with_an_author() {
        let (ops, notifier, _) = setup().await;

        ops.mute(&command(ADMIN, "mute", &[], None)).await.unwrap();
        // Channel posts have no author to restrict
        ops.mute(&command(ADMIN, "mute", &[], reply_with("from a channel")))
            .await
            .unwrap();

        assert!(notifier.restrictions().is_empty());
        assert_eq!(
            notifier.sent_to(CHAT),
            vec![messages::REPLY_TO_MUTE.to_string(), messages::REPLY_TO_MUTE.to_string()]
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(notifier.deleted().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restriction_is_reported() {
        let (ops, notifier, _) = setup().await;
        notifier.fail_restricts();

        ops.mute(&command(ADMIN, "mute", &[], reply_from(77, "Bob")))
            .await
            .unwrap();

        assert_eq!(notifier.sent_to(CHAT), vec![messages::action_failed("mute the user")]);
        // The command stays so the admin can retry
        assert!(!notifier.deleted().contains(&MessageId(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_delete_covers_range_and_tolerates_failures() {
        let (ops, notifier, _) = setup().await;
        notifier.fail_deletes();

        ops.delete_range(&command(ADMIN, "mdel", &[], reply_with("start here")))
            .await
            .unwrap();

        assert_eq!(
            notifier.deleted(),
            (5..=10).map(MessageId).collect::<Vec<_>>()
        );
        assert_eq!(notifier.sent_to(CHAT), vec![messages::MDEL_DONE.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pin_and_unpin() {
        let (ops, notifier, _) = setup().await;

        ops.pin(&command(ADMIN, "pin", &[], reply_with("rules"))).await.unwrap();
        ops.unpin(&command(ADMIN, "unpin", &[], None)).await.unwrap();
        ops.pin(&command(ADMIN, "pin", &[], None)).await.unwrap();

        let calls = notifier.calls();
        assert!(calls.contains(&Call::Pin(CHAT, MessageId(5))));
        assert!(calls.contains(&Call::Unpin(CHAT)));
        assert_eq!(
            notifier.sent_to(CHAT),
            vec![
                messages::PINNED.to_string(),
                messages::UNPINNED.to_string(),
                messages::REPLY_TO_PIN.to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_promote_and_demote() {
        let (ops, notifier, _) = setup().await;

        ops.promote(&command(ADMIN, "admin", &[], reply_from(77, "Bob"))).await.unwrap();
        ops.demote(&command(ADMIN, "unadmin", &[], reply_from(77, "Bob"))).await.unwrap();

        let calls = notifier.calls();
        assert!(calls.contains(&Call::Moderator(CHAT, UserId(77), true)));
        assert!(calls.contains(&Call::Moderator(CHAT, UserId(77), false)));
        assert_eq!(
            notifier.sent_to(CHAT),
            vec![messages::promoted_confirmation("Bob"), messages::demoted_confirmation("Bob")]
        );
    }
}
