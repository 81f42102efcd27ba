//! Group guard bot: join verification, a content filter and the
//! moderation commands.

use std::sync::Arc;
use teloxide::Bot;
use tracing::{error, info};

use crate::config::{BotConfig, GuardSettings, RelaySettings};
use crate::error::Result;
use crate::events::{
    CommandEvent, CommandRouter, Filter, InboundEvent, MessageContext, Priority, TextEvent,
};
use crate::managers::{
    create_shared_verification_registry, AdminOps, ContentFilter, MembershipGuard,
    SharedAdminOps, SharedContentFilter, SharedMembershipGuard,
};
use crate::messages;
use crate::notifier::{delete_later, SharedNotifier};
use crate::state::create_shared_block_store;
use crate::telegram::{OutgoingMessage, ParseMode};

/// Reply-driven moderation commands and their route names
const MODERATION_COMMANDS: [(&str, &str); 8] = [
    ("d", "delete"),
    ("mdel", "bulk_delete"),
    ("mute", "mute"),
    ("unmute", "unmute"),
    ("pin", "pin"),
    ("unpin", "unpin"),
    ("admin", "promote"),
    ("unadmin", "demote"),
];

pub struct GuardBot {
    guard: SharedMembershipGuard,
    admin_ops: SharedAdminOps,
    filter: SharedContentFilter,
    notifier: SharedNotifier,
}

impl GuardBot {
    pub fn new(
        guard: SharedMembershipGuard,
        admin_ops: SharedAdminOps,
        filter: SharedContentFilter,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            guard,
            admin_ops,
            filter,
            notifier,
        }
    }

    fn settings(&self) -> &GuardSettings {
        self.guard.settings()
    }

    /// `/start`: greet admins, turn everyone else away. Both messages are
    /// cleaned up after the delete delay.
    async fn start(&self, command: &CommandEvent) -> Result<()> {
        let context = &command.context;
        let text = if self.admin_ops.is_admin(context.sender.user_id) {
            messages::ADMIN_GREETING
        } else {
            messages::NOT_ADMIN
        };
        self.reply_and_clean(context, OutgoingMessage::new(context.chat_id, text))
            .await;
        Ok(())
    }

    async fn help(&self, command: &CommandEvent) -> Result<()> {
        let context = &command.context;
        self.reply_and_clean(context, OutgoingMessage::new(context.chat_id, messages::HELP))
            .await;
        Ok(())
    }

    async fn moderate(&self, command: &CommandEvent) -> Result<()> {
        let ops = &self.admin_ops;
        match command.name.as_str() {
            "d" => ops.delete_message(command).await,
            "mdel" => ops.delete_range(command).await,
            "mute" => ops.mute(command).await,
            "unmute" => ops.unmute(command).await,
            "pin" => ops.pin(command).await,
            "unpin" => ops.unpin(command).await,
            "admin" => ops.promote(command).await,
            "unadmin" => ops.demote(command).await,
            _ => Ok(()),
        }
    }

    /// Language keyword: reply with a link that switches the client
    /// language pack
    async fn language(&self, context: &MessageContext) -> Result<()> {
        let link = OutgoingMessage::new(
            context.chat_id,
            messages::language_link(&self.settings().language_pack),
        )
        .reply_to(context.message_id)
        .parse_mode(ParseMode::MarkdownV2);
        self.reply_and_clean(context, link).await;
        Ok(())
    }

    /// Plain text in a group: a pending member's answer goes to the
    /// verification gate, anything else through the content filter
    async fn on_text(&self, event: &TextEvent) -> Result<()> {
        if self.guard.on_text(event).await? {
            return Ok(());
        }
        self.screen(event).await;
        Ok(())
    }

    async fn screen(&self, event: &TextEvent) {
        let context = &event.context;
        if context.is_private {
            return;
        }
        let Some(text) = event.text.as_deref() else {
            return;
        };
        if !self.filter.matches(text) {
            return;
        }

        info!(
            "Removing filtered message {} from {} in chat {}",
            context.message_id.0, context.sender.user_id, context.chat_id
        );
        if let Err(e) = self
            .notifier
            .delete_message(context.chat_id, context.message_id)
            .await
        {
            error!("Failed to remove filtered message in chat {}: {}", context.chat_id, e);
            return;
        }

        match self.notifier.send_text(context.chat_id, messages::CONTENT_REMOVED).await {
            Ok(message_id) => {
                delete_later(
                    self.notifier.clone(),
                    context.chat_id,
                    vec![message_id],
                    self.settings().delete_delay,
                );
            }
            Err(e) => error!("Failed to post filter warning in chat {}: {}", context.chat_id, e),
        }
    }

    async fn reply_and_clean(&self, context: &MessageContext, reply: OutgoingMessage) {
        let mut cleanup = vec![context.message_id];
        match self.notifier.send(reply).await {
            Ok(message_id) => cleanup.push(message_id),
            Err(e) => error!("Failed to reply in chat {}: {}", context.chat_id, e),
        }
        delete_later(
            self.notifier.clone(),
            context.chat_id,
            cleanup,
            self.settings().delete_delay,
        );
    }

    pub fn router(self: Arc<Self>) -> CommandRouter {
        let keyword = self.settings().language_keyword.clone();

        let bot = self.clone();
        let router = CommandRouter::new().route(
            Priority::Membership,
            Filter::NewMembers,
            "new_members",
            move |event| {
                let bot = bot.clone();
                async move {
                    match event {
                        InboundEvent::Join(join) => bot.guard.on_join(&join).await,
                        _ => Ok(()),
                    }
                }
            },
        );

        let bot = self.clone();
        let router = router.route(Priority::Commands, Filter::Command("start"), "start", move |event| {
            let bot = bot.clone();
            async move {
                match event {
                    InboundEvent::Command(command) => bot.start(&command).await,
                    _ => Ok(()),
                }
            }
        });

        let bot = self.clone();
        let mut router = router.route(Priority::Commands, Filter::Command("help"), "help", move |event| {
            let bot = bot.clone();
            async move {
                match event {
                    InboundEvent::Command(command) => bot.help(&command).await,
                    _ => Ok(()),
                }
            }
        });

        for (name, label) in MODERATION_COMMANDS {
            let bot = self.clone();
            router = router.route(Priority::Commands, Filter::Command(name), label, move |event| {
                let bot = bot.clone();
                async move {
                    match event {
                        InboundEvent::Command(command) => bot.moderate(&command).await,
                        _ => Ok(()),
                    }
                }
            });
        }

        let bot = self.clone();
        let router = router.route(Priority::Commands, Filter::Keyword(keyword), "language", move |event| {
            let bot = bot.clone();
            async move { bot.language(event.context()).await }
        });

        let bot = self;
        router.route(Priority::Fallback, Filter::Text, "group_text", move |event| {
            let bot = bot.clone();
            async move {
                match event {
                    InboundEvent::Message(text) => bot.on_text(&text).await,
                    _ => Ok(()),
                }
            }
        })
    }
}

/// Load configuration, build the guard and run it on the configured transport
pub async fn run_guard() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let settings = GuardSettings::from_env()?;
    let relay_settings = RelaySettings::from_env()?;
    info!(
        "Starting guard bot: {} admin(s), {}s verification window",
        config.admins.len(),
        settings.verify_timeout.as_secs()
    );

    let bot = Bot::new(&config.token);
    let notifier: SharedNotifier = Arc::new(bot.clone());
    let block_store = create_shared_block_store(relay_settings.block_list_path).await;
    let filter = Arc::new(ContentFilter::load(&settings.content_filter_path).await?);

    let admin_ops = Arc::new(AdminOps::new(
        config.admins.clone(),
        block_store.clone(),
        notifier.clone(),
        settings.delete_delay,
    ));
    let guard = Arc::new(MembershipGuard::new(
        create_shared_verification_registry(),
        block_store,
        notifier.clone(),
        config.admins.clone(),
        settings,
    ));

    let router = Arc::new(GuardBot::new(guard, admin_ops, filter, notifier)).router();
    crate::transport::run(bot, config.transport, router).await
}
