//! Update delivery: where updates come from and how they reach the router.
//!
//! teloxide's dispatcher pulls updates from a long-polling or webhook
//! listener. Every update maps to the same distribution key, so a single
//! worker handles them one at a time and handlers never interleave.

pub mod webhook;

use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::Me;
use teloxide::update_listeners::{self, webhooks, UpdateListener};
use tracing::{debug, error, info};

use crate::config::TransportConfig;
use crate::events::{CommandRouter, InboundEvent};

/// Convert each message and hand it to the router
pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message().endpoint(
        |message: Message, me: Me, router: Arc<CommandRouter>| async move {
            match InboundEvent::from_message(&message, me.username()) {
                Some(event) => {
                    router.dispatch(event).await;
                }
                None => debug!("Skipping message {} in chat {}", message.id.0, message.chat.id),
            }
            Ok(())
        },
    )
}

/// Start the configured update source and process updates until it stops
pub async fn run(bot: Bot, transport: TransportConfig, router: CommandRouter) -> anyhow::Result<()> {
    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![Arc::new(router)])
        .distribution_function(|_| Some(()))
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
        .enable_ctrlc_handler()
        .build();

    match transport {
        TransportConfig::Polling => {
            info!("Receiving updates by long polling");
            let listener = update_listeners::polling_default(bot).await;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("Polling error"),
                )
                .await;
        }
        TransportConfig::Webhook(config) => {
            info!("Receiving updates by webhook at {}", config.public_url);
            let (mut listener, stop_flag, app) =
                webhooks::axum_to_router(bot, webhook::options(&config)).await?;
            let stop_token = listener.stop_token();

            tokio::spawn(async move {
                if let Err(e) = webhook::serve(app, &config, stop_flag).await {
                    error!("Webhook server failed: {}", e);
                    stop_token.stop();
                }
            });

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("Webhook listener error"),
                )
                .await;
        }
    }

    info!("Dispatcher stopped");
    Ok(())
}
