//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "search for a track: /search <query>")]
    Search(String),
    #[command(description = "queue a track in the voice chat: /play <query or URL>")]
    Play(String),
    #[command(description = "join the voice chat")]
    Join,
    #[command(description = "leave the voice chat")]
    Leave,
    #[command(description = "stop playback and clear the queue")]
    Stop,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, network issues, etc.)
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    // The token comes through config, so the BOT_TOKEN alias works as well
    // as TELOXIDE_TOKEN. Startup validation guarantees it is non-empty.
    let bot = Bot::with_client(config::BOT_TOKEN.clone(), client);

    // Check if local Bot API server is configured
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// # Arguments
/// * `bot` - Bot instance to configure
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "show the welcome message"),
        BotCommand::new("help", "show this help"),
        BotCommand::new("search", "search for a track"),
        BotCommand::new("play", "queue a track in the voice chat"),
        BotCommand::new("join", "join the voice chat"),
        BotCommand::new("leave", "leave the voice chat"),
        BotCommand::new("stop", "stop playback and clear the queue"),
    ])
    .await?;

    Ok(())
}
