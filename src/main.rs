use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::sleep;

use melobot::core::{config, init_logger, log_startup_configuration};
use melobot::extract::ytdlp;
use melobot::playback::{PlayQueue, PlaybackDriver, ProcessVoiceClient, VoiceClient, YtDlpResolver};
use melobot::telegram::{advance_message, create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Set up global panic handler to catch panics in dispatcher
    // This allows us to log the panic and continue working instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    log::info!("Starting melobot v{}", env!("CARGO_PKG_VERSION"));

    config::validate_startup()?;
    log_startup_configuration();
    ytdlp::log_ytdlp_version().await;

    run_bot().await
}

/// Runs the bot with long polling and dispatcher retry logic.
async fn run_bot() -> Result<()> {
    let bot = create_bot()?;

    let me = bot.get_me().await?;
    log::info!("Authorized as @{}", me.username());

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let (voice_client, mut stream_end_rx) = ProcessVoiceClient::new();
    let voice: Arc<dyn VoiceClient> = Arc::new(voice_client);
    let driver = Arc::new(PlaybackDriver::new(
        Arc::new(PlayQueue::new()),
        voice,
        Arc::new(YtDlpResolver),
    ));

    // Stream-end listener: every naturally finished stream advances its
    // chat's queue and announces the transition.
    let listener_bot = bot.clone();
    let listener_driver = Arc::clone(&driver);
    tokio::spawn(async move {
        while let Some(chat_id) = stream_end_rx.recv().await {
            let outcome = listener_driver.on_stream_end(chat_id).await;
            if let Some(text) = advance_message(&outcome) {
                if let Err(e) = listener_bot.send_message(chat_id, text).await {
                    log::warn!("Failed to announce playback transition in chat {}: {}", chat_id, e);
                }
            }
        }
        log::warn!("Stream-end channel closed, playback advancement stopped");
    });

    let handler = schema(HandlerDeps::new(driver));

    log::info!("Starting bot in long polling mode");

    // Run the dispatcher with retry logic
    let max_retries = 5;
    let mut retry_count = 0;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Create a new dispatcher in a separate task to isolate panics;
        // they are caught via the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            // Create polling listener that drops pending updates on start
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    log::error!("Dispatcher panicked: {}", join_err);
                    if retry_count < max_retries {
                        retry_count += 1;
                        log::info!("Retrying dispatcher connection (attempt {}/{})...", retry_count, max_retries);
                        exponential_backoff(retry_count).await;
                    } else {
                        log::error!("Max retries reached after panic. Exiting...");
                        break;
                    }
                } else {
                    log::warn!("Dispatcher task was cancelled: {}", join_err);
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Sleeps with exponential backoff capped at one minute.
async fn exponential_backoff(attempt: u32) {
    let secs = (1u64 << attempt.min(6)).min(60);
    log::info!("Backing off for {}s", secs);
    sleep(Duration::from_secs(secs)).await;
}
