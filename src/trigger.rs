//! Chat-command trigger: `/accept` issued in a chat drives a run, with
//! progress delivered by editing a status message.

use crate::config::Config;
use crate::engine::{ApprovalEngine, ChannelSink, ProgressSink, ProgressSnapshot, RunError};
use crate::platform::telegram::TelegramPlatform;
use crate::platform::TriggerCommand;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Consume trigger commands forwarded by the Telegram dispatcher
pub async fn run_command_loop(
    engine: Arc<ApprovalEngine>,
    telegram: Arc<TelegramPlatform>,
    config: Config,
    mut commands: mpsc::UnboundedReceiver<TriggerCommand>,
) {
    while let Some(command) = commands.recv().await {
        if !config.chat_allowed(command.origin_chat) {
            eprintln!(
                "[trigger] Rejecting command from unauthorized chat {}",
                command.origin_chat
            );
            let _ = telegram
                .send_text(
                    command.origin_chat,
                    "Not authorized to trigger approval runs here.",
                )
                .await;
            continue;
        }

        // Each command runs on its own task; the engine rejects overlapping
        // runs for the same channel.
        let engine = engine.clone();
        let telegram = telegram.clone();
        let default_limit = config.default_limit;
        tokio::spawn(async move {
            handle_command(engine, telegram, command, default_limit).await;
        });
    }
}

async fn handle_command(
    engine: Arc<ApprovalEngine>,
    telegram: Arc<TelegramPlatform>,
    command: TriggerCommand,
    default_limit: Option<u64>,
) {
    let limit = command.limit.or(default_limit);

    let status_id = match telegram
        .send_text(
            command.origin_chat,
            &format!("Approving join requests for {}...", command.channel),
        )
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            eprintln!("[trigger] Failed to send status message: {}", e);
            None
        }
    };

    // Incremental updates edit the status message; all best-effort
    let (sink, mut progress_rx) = ChannelSink::new();
    let progress_task = status_id.map(|message_id| {
        let telegram = telegram.clone();
        let chat = command.origin_chat;
        tokio::spawn(async move {
            while let Some(snapshot) = progress_rx.recv().await {
                let _ = telegram
                    .edit_text(chat, message_id, &format_progress(&snapshot))
                    .await;
            }
        })
    });

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let outcome = engine
        .run(&command.channel, limit, Some(&sink as &dyn ProgressSink), cancel_rx)
        .await;

    // Closing the sink ends the progress task
    drop(sink);
    if let Some(task) = progress_task {
        let _ = task.await;
    }

    let text = match outcome {
        Ok(result) => result.summary(),
        Err(e @ RunError::AlreadyRunning(_)) => e.to_string(),
        Err(e) => format!("Run rejected: {}", e),
    };

    match status_id {
        Some(message_id) => {
            if telegram
                .edit_text(command.origin_chat, message_id, &text)
                .await
                .is_err()
            {
                let _ = telegram.send_text(command.origin_chat, &text).await;
            }
        }
        None => {
            let _ = telegram.send_text(command.origin_chat, &text).await;
        }
    }
}

fn format_progress(snapshot: &ProgressSnapshot) -> String {
    format!(
        "Working... {} approved, {} skipped ({} processed)",
        snapshot.approved, snapshot.skipped, snapshot.processed
    )
}
