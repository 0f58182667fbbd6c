//! Command-line arguments for the joinwarden service.

use clap::Parser;
use std::path::PathBuf;

/// joinwarden - Telegram join-request approval service
#[derive(Parser, Debug)]
#[command(name = "joinwarden", about = "Telegram join-request approval service")]
pub struct Args {
    #[arg(long, help = "Path to config file (default: ~/.joinwarden/config.toml)")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "JOINWARDEN_BOT_TOKEN", help = "Bot token")]
    pub bot_token: Option<String>,

    #[arg(long, help = "HTTP trigger port")]
    pub port: Option<u16>,

    #[arg(
        long = "pacing-delay-ms",
        value_name = "MS",
        help = "Delay between successive approvals"
    )]
    pub pacing_delay_ms: Option<u64>,

    #[arg(long, value_name = "N", help = "Default approval limit per run")]
    pub limit: Option<u64>,
}
