//! joinwarden: Telegram join-request approval service.
//!
//! Starts the bot connection, the chat-command trigger loop, and the HTTP
//! trigger server.
//!
//! Usage:
//!   joinwarden [--config path] [--port 8080] [--pacing-delay-ms 750]
//!
//! Environment variables:
//!   JOINWARDEN_BOT_TOKEN       - Telegram bot token
//!   JOINWARDEN_PORT            - HTTP trigger port (default: 8080)
//!   JOINWARDEN_PACING_DELAY_MS - Delay between approvals (default: 750)
//!   JOINWARDEN_PROGRESS_EVERY  - Progress snapshot interval (default: 10)
//!   JOINWARDEN_DEFAULT_LIMIT   - Default approval limit per run

use clap::Parser;
use joinwarden::config::Config;
use joinwarden::engine::ApprovalEngine;
use joinwarden::platform::telegram::TelegramPlatform;
use joinwarden::platform::PlatformClient;
use joinwarden::server::{self, ServerState};
use joinwarden::{trigger, Args};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            std::process::exit(1);
        }
    };

    // CLI overrides
    if let Some(token) = args.bot_token {
        config.bot_token = Some(token);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(delay) = args.pacing_delay_ms {
        config.pacing_delay_ms = delay;
    }
    if let Some(limit) = args.limit {
        config.default_limit = Some(limit);
    }

    let Some(token) = config.resolve_bot_token() else {
        eprintln!("Fatal error: bot token not configured (set JOINWARDEN_BOT_TOKEN)");
        std::process::exit(1);
    };

    eprintln!("joinwarden starting...");
    eprintln!("Port: {}", config.port);
    eprintln!("Pacing delay: {}ms", config.pacing_delay_ms);

    let telegram = Arc::new(TelegramPlatform::new());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    if let Err(e) = telegram.start(&token, command_tx).await {
        eprintln!("Fatal error: {}", e);
        std::process::exit(1);
    }

    let platform: Arc<dyn PlatformClient> = telegram.clone();
    let engine = ApprovalEngine::new(platform, config.pacing_policy());

    // Chat-command trigger
    tokio::spawn(trigger::run_command_loop(
        engine.clone(),
        telegram.clone(),
        config.clone(),
        command_rx,
    ));

    // HTTP trigger
    let state = Arc::new(ServerState {
        engine,
        default_limit: config.default_limit,
    });
    if let Err(e) = server::run(state, config.port).await {
        eprintln!("Fatal error: {}", e);
        std::process::exit(1);
    }
}
