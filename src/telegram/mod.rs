//! Telegram types shared by the bots. Ids, permissions and parse modes are
//! teloxide's; outgoing messages are described by [`OutgoingMessage`] so the
//! handlers stay independent of the request builders.

pub mod permissions;
mod types;

pub use teloxide::types::{ChatId, ChatPermissions, MessageId, ParseMode, UserId};
pub use types::OutgoingMessage;
