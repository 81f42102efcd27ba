//! Chat bots assembled from the managers, one router per bot.

pub mod guard;
pub mod relay;

pub use guard::{run_guard, GuardBot};
pub use relay::{relay_router, run_relay};
