//! Join-time verification gate.
//!
//! A member who joins a group is restricted to text, challenged to send the
//! configured phrase and given a fixed window to do so. The answer lifts the
//! restriction; the timer running out bans them and cleans up the exchange.
//! Both outcomes retire the pending entry through [`VerificationRegistry`],
//! which guarantees only one of them happens.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::verification_registry::{PendingKey, PendingVerification, SharedVerificationRegistry};
use crate::config::{AdminIdentitySet, GuardSettings};
use crate::error::Result;
use crate::events::{JoinEvent, MemberInfo, MessageContext, TextEvent};
use crate::messages;
use crate::notifier::{delete_all, delete_later, SharedNotifier};
use crate::state::SharedBlockStore;
use crate::telegram::{permissions, ChatId, OutgoingMessage};

pub struct MembershipGuard {
    registry: SharedVerificationRegistry,
    block_store: SharedBlockStore,
    notifier: SharedNotifier,
    admins: AdminIdentitySet,
    settings: GuardSettings,
}

impl MembershipGuard {
    pub fn new(
        registry: SharedVerificationRegistry,
        block_store: SharedBlockStore,
        notifier: SharedNotifier,
        admins: AdminIdentitySet,
        settings: GuardSettings,
    ) -> Self {
        Self {
            registry,
            block_store,
            notifier,
            admins,
            settings,
        }
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    pub fn registry(&self) -> &SharedVerificationRegistry {
        &self.registry
    }

    /// Put every human member of a join event on probation
    pub async fn on_join(self: &Arc<Self>, event: &JoinEvent) -> Result<()> {
        for member in &event.members {
            if member.is_bot {
                debug!("Skipping bot {} joining chat {}", member.user_id, event.context.chat_id);
                continue;
            }
            self.admit(&event.context, member).await;
        }
        Ok(())
    }

    async fn admit(self: &Arc<Self>, context: &MessageContext, member: &MemberInfo) {
        let chat_id = context.chat_id;
        let key = PendingKey::new(chat_id, member.user_id);

        if self.block_store.is_blocked(&member.user_id.to_string()).await {
            info!("Blocked user {} joined chat {}, banning", member.user_id, chat_id);
            if let Err(e) = self.notifier.ban_user(chat_id, member.user_id, false).await {
                error!("Failed to ban blocked user {} in chat {}: {}", member.user_id, chat_id, e);
            }
            return;
        }

        let entry = PendingVerification::new(member.display_name.clone(), member.username.clone());
        if !self.registry.register(key, entry) {
            debug!("User {} is already pending in chat {}", member.user_id, chat_id);
            return;
        }

        if let Err(e) = self
            .notifier
            .restrict_user(chat_id, member.user_id, permissions::probation())
            .await
        {
            error!("Failed to restrict user {} in chat {}: {}", member.user_id, chat_id, e);
        }

        let welcome = messages::welcome_message(
            member,
            &self.settings.challenge_phrase,
            self.settings.verify_timeout.as_secs(),
        );
        match self.notifier.send_text(chat_id, &welcome).await {
            Ok(message_id) => {
                self.registry.track_message(key, message_id);
            }
            Err(e) => error!("Failed to send welcome to {} in chat {}: {}", member.user_id, chat_id, e),
        }

        let guard = Arc::clone(self);
        let timeout = self.settings.verify_timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            guard.expire(key).await;
        });
        self.registry.attach_timer(key, timer.abort_handle());

        info!(
            "User {} ({}) is pending verification in chat {}",
            member.user_id, member.display_name, chat_id
        );
    }

    /// Handle a plain text message. Returns true if the sender was pending
    /// in that chat.
    pub async fn on_text(&self, event: &TextEvent) -> Result<bool> {
        let context = &event.context;
        let key = PendingKey::new(context.chat_id, context.sender.user_id);

        if !self.registry.track_message(key, context.message_id) {
            return Ok(false);
        }

        let answered = event
            .text
            .as_deref()
            .map(|text| self.settings.is_challenge_answer(text))
            .unwrap_or(false);
        if !answered {
            debug!("User {} sent a wrong answer in chat {}", key.user_id, key.chat_id);
            return Ok(true);
        }

        let Some(mut entry) = self.registry.complete(key) else {
            // The timeout retired the entry first
            return Ok(true);
        };
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        if let Err(e) = self
            .notifier
            .restrict_user(key.chat_id, key.user_id, permissions::member())
            .await
        {
            error!("Failed to lift restrictions for {} in chat {}: {}", key.user_id, key.chat_id, e);
        }

        match self
            .notifier
            .send_text(key.chat_id, &messages::verified_message())
            .await
        {
            Ok(message_id) => entry.messages_to_delete.push(message_id),
            Err(e) => error!("Failed to acknowledge verification in chat {}: {}", key.chat_id, e),
        }

        self.notify_admins(context, &entry).await;

        delete_later(
            self.notifier.clone(),
            key.chat_id,
            entry.messages_to_delete,
            self.settings.delete_delay,
        );

        info!("User {} verified in chat {}", key.user_id, key.chat_id);
        Ok(true)
    }

    async fn notify_admins(&self, context: &MessageContext, entry: &PendingVerification) {
        let notice = messages::admin_verified_notice(
            &entry.display_name,
            entry.username.as_deref(),
            context.sender.user_id,
            context.chat_title.as_deref().unwrap_or("the group"),
        );
        for admin in self.admins.iter() {
            if let Err(e) = self.notifier.send_text(ChatId::from(admin), &notice).await {
                warn!("Failed to notify admin {} about {}: {}", admin, context.sender.user_id, e);
            }
        }
    }

    /// Timeout path: ban the member and purge the exchange. Returns false
    /// if the entry was already retired.
    pub async fn expire(&self, key: PendingKey) -> bool {
        let Some(entry) = self.registry.expire(key) else {
            debug!("Timeout for {:?} found nothing pending", key);
            return false;
        };

        delete_all(self.notifier.as_ref(), key.chat_id, &entry.messages_to_delete).await;

        if let Err(e) = self
            .notifier
            .ban_user(key.chat_id, key.user_id, self.settings.purge_on_timeout)
            .await
        {
            error!("Failed to ban user {} in chat {}: {}", key.user_id, key.chat_id, e);
            return true;
        }
        info!(
            "User {} ({}) did not verify in chat {} after joining at {}, banned",
            key.user_id,
            entry.display_name,
            key.chat_id,
            entry.join_time.format("%H:%M:%S")
        );

        let notice = messages::timeout_notice(key.user_id, self.settings.verify_timeout.as_secs());
        match self.notifier.send(OutgoingMessage::new(key.chat_id, notice)).await {
            Ok(message_id) => {
                delete_later(
                    self.notifier.clone(),
                    key.chat_id,
                    vec![message_id],
                    self.settings.ban_notice_delay,
                );
            }
            Err(e) => error!("Failed to post timeout notice in chat {}: {}", key.chat_id, e),
        }
        true
    }
}

/// Shared membership guard type
pub type SharedMembershipGuard = Arc<MembershipGuard>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::verification_registry::create_shared_verification_registry;
    use crate::notifier::testing::RecordingNotifier;
    use crate::state::BlockStore;
    use crate::telegram::{MessageId, UserId};
    use std::time::Duration;

    const CHAT: ChatId = ChatId(100);
    const ADMIN: UserId = UserId(1);

    async fn setup() -> (Arc<MembershipGuard>, Arc<RecordingNotifier>, SharedBlockStore) {
        let notifier = RecordingNotifier::new();
        let path = std::env::temp_dir().join(format!("guard-{}.json", uuid::Uuid::new_v4()));
        let block_store = Arc::new(BlockStore::load(path).await);
        let guard = Arc::new(MembershipGuard::new(
            create_shared_verification_registry(),
            block_store.clone(),
            notifier.clone(),
            AdminIdentitySet::new([ADMIN]),
            GuardSettings::default(),
        ));
        (guard, notifier, block_store)
    }

    fn member(id: u64) -> MemberInfo {
        MemberInfo {
            user_id: UserId(id),
            display_name: format!("user{}", id),
            username: None,
            is_bot: false,
        }
    }

    fn context(sender: MemberInfo, message_id: i32) -> MessageContext {
        MessageContext {
            chat_id: CHAT,
            chat_title: Some("Lobby".to_string()),
            is_private: false,
            message_id: MessageId(message_id),
            sender,
            reply_to: None,
        }
    }

    fn join(members: Vec<MemberInfo>) -> JoinEvent {
        JoinEvent {
            context: context(members[0].clone(), 1),
            members,
        }
    }

    fn text(user: u64, message_id: i32, body: &str) -> TextEvent {
        TextEvent {
            context: context(member(user), message_id),
            text: Some(body.to_string()),
        }
    }

    fn key(user: u64) -> PendingKey {
        PendingKey::new(CHAT, UserId(user))
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_before_timeout_verifies_once() {
        let (guard, notifier, _) = setup().await;

        guard.on_join(&join(vec![member(42)])).await.unwrap();
        assert!(guard.registry().is_pending(key(42)));
        assert_eq!(notifier.restrictions(), vec![(UserId(42), permissions::probation())]);
        assert!(notifier.sent_to(CHAT)[0].contains("User ID: 42"));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(guard.on_text(&text(42, 50, "HI")).await.unwrap());

        assert!(!guard.registry().is_pending(key(42)));
        assert!(guard.registry().is_empty());
        assert_eq!(
            notifier.restrictions().last(),
            Some(&(UserId(42), permissions::member()))
        );
        assert_eq!(notifier.sent_to(CHAT).len(), 2);
        assert_eq!(notifier.sent_to(CHAT)[1], messages::verified_message());
        let admin_notices = notifier.sent_to(ChatId::from(ADMIN));
        assert_eq!(admin_notices.len(), 1);
        assert!(admin_notices[0].contains("Lobby"));

        // Past the original deadline: nothing else happens
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(notifier.bans().is_empty());
        assert_eq!(notifier.sent_to(CHAT).len(), 2);

        // Welcome, the answer and the acknowledgement were cleaned up
        let deleted = notifier.deleted();
        assert_eq!(deleted.len(), 3);
        assert!(deleted.contains(&MessageId(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bans_exactly_once() {
        let (guard, notifier, _) = setup().await;

        guard.on_join(&join(vec![member(77)])).await.unwrap();
        guard.on_text(&text(77, 60, "hello?")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(notifier.bans(), vec![(CHAT, UserId(77), true)]);
        assert!(guard.registry().is_empty());
        // Welcome and the wrong answer are gone
        assert_eq!(notifier.deleted().len(), 2);
        assert!(notifier.deleted().contains(&MessageId(60)));
        let sent = notifier.sent_to(CHAT);
        assert!(sent.last().unwrap().contains("77"));

        // The timeout notice removes itself after the secondary delay
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(notifier.deleted().len(), 3);

        // A late answer is ignored and no second ban happens
        assert!(!guard.on_text(&text(77, 61, "hi")).await.unwrap());
        assert!(!guard.expire(key(77)).await);
        assert_eq!(notifier.bans().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_answers_keep_user_pending() {
        let (guard, notifier, _) = setup().await;
        guard.on_join(&join(vec![member(5)])).await.unwrap();

        for (i, body) in ["hello", "hi there", "h i"].iter().enumerate() {
            assert!(guard.on_text(&text(5, 10 + i as i32, body)).await.unwrap());
        }
        assert!(guard.registry().is_pending(key(5)));
        assert_eq!(guard.registry().get(key(5)).unwrap().messages_to_delete.len(), 4);

        // Padding makes the answer wrong
        assert!(guard.on_text(&text(5, 19, " Hi ")).await.unwrap());
        assert!(guard.registry().is_pending(key(5)));

        assert!(guard.on_text(&text(5, 20, "Hi")).await.unwrap());
        assert!(!guard.registry().is_pending(key(5)));
        assert!(notifier.bans().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_strangers_never_get_entries() {
        let (guard, notifier, _) = setup().await;

        assert!(!guard.on_text(&text(9, 1, "hi")).await.unwrap());
        assert!(guard.registry().is_empty());
        assert!(notifier.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bots_are_skipped_and_rejoin_is_ignored() {
        let (guard, notifier, _) = setup().await;
        let mut bot = member(8);
        bot.is_bot = true;

        guard.on_join(&join(vec![bot, member(42)])).await.unwrap();
        guard.on_join(&join(vec![member(42)])).await.unwrap();

        assert_eq!(guard.registry().len(), 1);
        assert_eq!(notifier.sent_to(CHAT).len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(notifier.bans(), vec![(CHAT, UserId(42), true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_user_is_banned_on_join() {
        let (guard, notifier, block_store) = setup().await;
        block_store.block("13").await;

        guard.on_join(&join(vec![member(13)])).await.unwrap();

        assert!(guard.registry().is_empty());
        assert_eq!(notifier.bans(), vec![(CHAT, UserId(13), false)]);
        assert!(notifier.sent().is_empty());

        tokio::fs::remove_file(block_store.path()).await.ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deletes_do_not_stop_the_ban() {
        let (guard, notifier, _) = setup().await;
        notifier.fail_deletes();

        guard.on_join(&join(vec![member(77)])).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(notifier.bans().len(), 1);
        assert!(guard.registry().is_empty());
    }
}
