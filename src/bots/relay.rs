//! Private relay bot: users write to the bot, admins answer through it.

use std::sync::Arc;
use teloxide::Bot;
use tracing::info;

use crate::config::{BotConfig, GuardSettings, RelaySettings};
use crate::events::{CommandRouter, Filter, InboundEvent, Priority};
use crate::managers::{AdminOps, MessageRelay, SharedAdminOps, SharedMessageRelay};
use crate::notifier::SharedNotifier;
use crate::state::create_shared_block_store;

pub fn relay_router(relay: SharedMessageRelay, admin_ops: SharedAdminOps) -> CommandRouter {
    let handler = relay.clone();
    let router = CommandRouter::new().route(Priority::Commands, Filter::Command("start"), "start", move |event| {
        let relay = handler.clone();
        async move {
            match event {
                InboundEvent::Command(command) => relay.start(&command).await,
                _ => Ok(()),
            }
        }
    });

    let ops = admin_ops.clone();
    let router = router.route(Priority::Commands, Filter::Command("ban"), "ban", move |event| {
        let ops = ops.clone();
        async move {
            match event {
                InboundEvent::Command(command) => ops.ban(&command).await,
                _ => Ok(()),
            }
        }
    });

    let ops = admin_ops;
    let router = router.route(Priority::Commands, Filter::Command("unban"), "unban", move |event| {
        let ops = ops.clone();
        async move {
            match event {
                InboundEvent::Command(command) => ops.unban(&command).await,
                _ => Ok(()),
            }
        }
    });

    router.route(Priority::Fallback, Filter::AnyMessage, "relay", move |event| {
        let relay = relay.clone();
        async move {
            match event {
                InboundEvent::Message(message) => relay.on_message(&message).await,
                _ => Ok(()),
            }
        }
    })
}

/// Load configuration and run the relay on the configured transport
pub async fn run_relay() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let settings = RelaySettings::from_env()?;
    let delete_delay = GuardSettings::from_env()?.delete_delay;
    info!(
        "Starting relay bot: {} admin(s), block list at {}",
        config.admins.len(),
        settings.block_list_path.display()
    );

    let bot = Bot::new(&config.token);
    let notifier: SharedNotifier = Arc::new(bot.clone());
    let block_store = create_shared_block_store(settings.block_list_path).await;

    let admin_ops = Arc::new(AdminOps::new(
        config.admins.clone(),
        block_store.clone(),
        notifier.clone(),
        delete_delay,
    ));
    let relay = Arc::new(MessageRelay::new(config.admins.clone(), block_store, notifier));

    crate::transport::run(bot, config.transport, relay_router(relay, admin_ops)).await
}
