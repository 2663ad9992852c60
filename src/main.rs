mod attendance;
mod bot;
mod config;
mod error;
mod keepalive;
mod logging;
mod messages;
mod reminder;
mod store;
mod tracker;

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands as _;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::reminder::Reminders;
use crate::store::TimeStore;
use crate::tracker::Tracker;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI args for --config-json
    let mut config_json_arg: Option<String> = None;
    for arg in std::env::args().skip(1) {
        if let Some(rest) = arg.strip_prefix("--config-json=") {
            config_json_arg = Some(rest.to_string());
            break;
        }
        if arg == "--config-json" {
            config_json_arg = std::env::args().skip_while(|a| a != "--config-json").nth(1);
            break;
        }
    }

    let config = match config_json_arg {
        Some(json) => Config::from_json_str(&json).context("failed to parse --config-json")?,
        None => Config::load().context("failed to load config")?,
    };
    logging::init_logging(config.log_level.as_deref());

    let tz = config.tz()?;
    let store = TimeStore::new(&config.data_file);
    info!(path = %store.path().display(), timezone = %tz, "Attendance store ready");
    let tracker = Arc::new(Tracker::new(store, tz));
    let reminders = Arc::new(Reminders::new());

    let http_addr = config.http_addr.clone();
    tokio::spawn(async move {
        if let Err(err) = keepalive::serve(&http_addr).await {
            error!(error = %err, "Keep-alive endpoint failed");
        }
    });

    let bot = Bot::new(&config.teloxide_token);

    match bot.get_me().await {
        Ok(me) => {
            info!(
                id = me.id.0,
                username = me.user.username.as_deref().unwrap_or(""),
                "Bot started"
            );
        }
        Err(err) => warn!(error = %err, "Failed to fetch bot info"),
    }
    if let Err(err) = bot.set_my_commands(bot::Command::bot_commands()).await {
        warn!(error = %err, "Failed to register command list");
    }

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![tracker, reminders])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
