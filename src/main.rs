use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::{error, info};

/// Telegram relays: group join guard, private message relay and webhook
/// notifiers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify new group members and moderate the group
    Guard,
    /// Relay private messages between users and the admins
    Relay,
    /// Forward Emby server notifications
    Emby,
    /// Announce Minecraft server online/offline status
    Minecraft,
}

mod bots;
mod config;
mod error;
mod events;
mod logging;
mod managers;
mod messages;
mod notifier;
mod state;
mod telegram;
mod transport;
mod web;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    logging::init(args.debug);

    info!("Starting {:?}", args.command);
    let result = match args.command {
        Command::Guard => bots::run_guard().await,
        Command::Relay => bots::run_relay().await,
        Command::Emby => web::run_emby().await,
        Command::Minecraft => web::run_minecraft().await,
    };

    if let Err(e) = &result {
        error!("Fatal error: {}", e);
    }
    result
}
