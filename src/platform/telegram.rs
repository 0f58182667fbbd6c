//! Telegram platform client using teloxide.
//!
//! The Bot API exposes no call to list pending join requests, so the adapter
//! observes `ChatJoinRequest` updates from the dispatcher and keeps an
//! in-memory backlog per chat. The same dispatcher forwards `/accept` chat
//! commands to the trigger layer.

use super::{
    ChannelMeta, PendingJoinRequest, PendingPage, PlatformClient, PlatformError, Role,
    TriggerCommand,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    prelude::*,
    types::{ChatId, ChatJoinRequest, MessageId as TgMessageId, Recipient, Update, UserId},
    Bot,
};
use tokio::sync::{mpsc, RwLock};

/// Page size for backlog listing
const PAGE_SIZE: usize = 50;

/// In-memory backlog of join requests observed from the update stream
///
/// Entries carry a monotonic sequence number per chat so that paging stays
/// stable while earlier entries are removed by approvals.
#[derive(Default)]
pub struct PendingLedger {
    inner: Mutex<HashMap<i64, ChatQueue>>,
}

#[derive(Default)]
struct ChatQueue {
    next_seq: u64,
    items: Vec<(u64, PendingJoinRequest)>,
}

impl PendingLedger {
    /// Record a newly observed join request (deduplicated by user)
    pub fn record(&self, chat_id: i64, request: PendingJoinRequest) {
        let mut inner = self.inner.lock().unwrap();
        let queue = inner.entry(chat_id).or_default();
        if queue.items.iter().any(|(_, r)| r.user_id == request.user_id) {
            return;
        }
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.items.push((seq, request));
    }

    /// Fetch one page after the given cursor, oldest first
    pub fn page(&self, chat_id: i64, cursor: Option<u64>, size: usize) -> PendingPage {
        let inner = self.inner.lock().unwrap();
        let Some(queue) = inner.get(&chat_id) else {
            return PendingPage::default();
        };

        let mut items = Vec::new();
        let mut last_seq = None;
        let mut more = false;
        for (seq, request) in &queue.items {
            if let Some(c) = cursor {
                if *seq <= c {
                    continue;
                }
            }
            if items.len() == size {
                more = true;
                break;
            }
            items.push(request.clone());
            last_seq = Some(*seq);
        }

        PendingPage {
            items,
            next_cursor: if more { last_seq } else { None },
        }
    }

    /// Drop a request once the platform has resolved it
    pub fn remove(&self, chat_id: i64, user_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(queue) = inner.get_mut(&chat_id) {
            queue.items.retain(|(_, r)| r.user_id != user_id);
        }
    }

    /// Number of requests currently pending for a chat
    pub fn pending_count(&self, chat_id: i64) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.get(&chat_id).map(|q| q.items.len()).unwrap_or(0)
    }
}

/// Telegram platform client
pub struct TelegramPlatform {
    /// Bot instance (initialized on start)
    bot: RwLock<Option<Bot>>,
    /// Shutdown signal for the dispatcher
    shutdown_tx: RwLock<Option<tokio::sync::oneshot::Sender<()>>>,
    /// Observed join-request backlog
    ledger: Arc<PendingLedger>,
}

impl TelegramPlatform {
    /// Create a new, unstarted platform client
    pub fn new() -> Self {
        Self {
            bot: RwLock::new(None),
            shutdown_tx: RwLock::new(None),
            ledger: Arc::new(PendingLedger::default()),
        }
    }

    /// Get the bot instance
    async fn get_bot(&self) -> Result<Bot, PlatformError> {
        let bot = self.bot.read().await;
        bot.clone()
            .ok_or_else(|| PlatformError::Transport("Telegram bot not started".to_string()))
    }

    /// Connect the bot and start the update dispatcher.
    ///
    /// `command_tx` receives `/accept` commands observed in chats.
    pub async fn start(
        &self,
        token: &str,
        command_tx: mpsc::UnboundedSender<TriggerCommand>,
    ) -> Result<()> {
        let bot = Bot::new(token);
        *self.bot.write().await = Some(bot.clone());

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();
        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let ledger = self.ledger.clone();

        let handler = dptree::entry()
            .branch(Update::filter_chat_join_request().endpoint(handle_join_request))
            .branch(Update::filter_message().endpoint(handle_message));

        let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
            .dependencies(dptree::deps![ledger, command_tx])
            .build();

        let shutdown_token = dispatcher.shutdown_token();

        tokio::spawn(async move {
            tokio::select! {
                _ = dispatcher.dispatch() => {}
                _ = &mut shutdown_rx => {
                    shutdown_token.shutdown().ok();
                }
            }
        });

        eprintln!("[telegram] Bot started");
        Ok(())
    }

    /// Stop the dispatcher and drop the bot
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
        *self.bot.write().await = None;
        eprintln!("[telegram] Bot stopped");
        Ok(())
    }

    /// Send a plain-text message; returns the message ID for later edits
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<i32, PlatformError> {
        let bot = self.get_bot().await?;
        let sent = bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(map_request_error)?;
        Ok(sent.id.0)
    }

    /// Edit a previously sent plain-text message
    pub async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> Result<(), PlatformError> {
        let bot = self.get_bot().await?;
        bot.edit_message_text(ChatId(chat_id), TgMessageId(message_id), text)
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    /// Reconcile the observed backlog with an approval outcome.
    ///
    /// Anything other than a rate limit is terminal for the entry: the same
    /// call will not succeed later (approved by another admin, withdrawn,
    /// rights revoked), so the entry is dropped either way and future runs
    /// stop re-listing it.
    fn settle_approval(
        &self,
        channel_id: i64,
        user_id: i64,
        result: Result<(), PlatformError>,
    ) -> Result<(), PlatformError> {
        match &result {
            Err(PlatformError::RateLimited(_)) => {}
            _ => self.ledger.remove(channel_id, user_id),
        }
        result
    }
}

impl Default for TelegramPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PlatformClient for TelegramPlatform {
    async fn join_channel(&self, raw: &str) -> Result<(), PlatformError> {
        // Bot accounts cannot join a chat on their own; the association step
        // degrades to a reachability probe, which fails exactly when
        // resolution would.
        let bot = self.get_bot().await?;
        bot.get_chat(recipient(raw))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }

    async fn get_channel(&self, raw: &str) -> Result<ChannelMeta, PlatformError> {
        let bot = self.get_bot().await?;
        let chat = bot.get_chat(recipient(raw)).await.map_err(map_request_error)?;

        let title = chat
            .title()
            .map(|t| t.to_string())
            .or_else(|| chat.username().map(|u| format!("@{}", u)))
            .unwrap_or_else(|| chat.id.to_string());

        Ok(ChannelMeta {
            id: chat.id.0,
            title,
        })
    }

    async fn get_membership(&self, channel_id: i64) -> Result<Role, PlatformError> {
        let bot = self.get_bot().await?;
        let me = bot.get_me().await.map_err(map_request_error)?;
        let member = bot
            .get_chat_member(ChatId(channel_id), me.user.id)
            .await
            .map_err(map_request_error)?;

        let role = if member.is_owner() {
            Role::Owner
        } else if member.is_administrator() {
            Role::Administrator
        } else if member.is_restricted() {
            Role::Restricted
        } else if member.is_banned() {
            Role::Banned
        } else if member.is_left() {
            Role::Left
        } else {
            Role::Member
        };

        Ok(role)
    }

    async fn pending_page(
        &self,
        channel_id: i64,
        cursor: Option<u64>,
    ) -> Result<PendingPage, PlatformError> {
        Ok(self.ledger.page(channel_id, cursor, PAGE_SIZE))
    }

    async fn approve_join_request(
        &self,
        channel_id: i64,
        user_id: i64,
    ) -> Result<(), PlatformError> {
        let bot = self.get_bot().await?;
        let result = bot
            .approve_chat_join_request(ChatId(channel_id), UserId(user_id as u64))
            .await
            .map(|_| ())
            .map_err(map_request_error);
        self.settle_approval(channel_id, user_id, result)
    }

    async fn approve_all_join_requests(&self, _channel_id: i64) -> Result<bool, PlatformError> {
        // The Bot API has no bulk-approval call; reporting false routes the
        // engine to the individual loop.
        Ok(false)
    }
}

/// Build a recipient from a raw identifier (numeric ID or handle form)
fn recipient(raw: &str) -> Recipient {
    if let Ok(id) = raw.parse::<i64>() {
        Recipient::Id(ChatId(id))
    } else if let Some(stripped) = raw.strip_prefix('@') {
        Recipient::ChannelUsername(format!("@{}", stripped))
    } else {
        Recipient::ChannelUsername(format!("@{}", raw))
    }
}

/// Translate teloxide errors into the adapter taxonomy
fn map_request_error(err: teloxide::RequestError) -> PlatformError {
    match err {
        teloxide::RequestError::RetryAfter(secs) => {
            PlatformError::RateLimited(secs.seconds() as u64)
        }
        teloxide::RequestError::Api(api) => {
            let text = api.to_string();
            let lower = text.to_lowercase();
            if lower.contains("not enough rights")
                || lower.contains("chat_admin_required")
                || lower.contains("have no rights")
            {
                PlatformError::PermissionDenied
            } else if lower.contains("not found") {
                PlatformError::NotFound(text)
            } else {
                PlatformError::Transport(text)
            }
        }
        other => PlatformError::Transport(other.to_string()),
    }
}

/// Handle chat join request updates: record them in the backlog
async fn handle_join_request(
    req: ChatJoinRequest,
    ledger: Arc<PendingLedger>,
) -> ResponseResult<()> {
    let pending = PendingJoinRequest {
        user_id: req.from.id.0 as i64,
        display_name: req.from.full_name(),
        username: req.from.username.clone(),
    };
    ledger.record(req.chat.id.0, pending);
    Ok(())
}

/// Handle incoming messages: forward `/accept` commands to the trigger layer
async fn handle_message(
    bot: Bot,
    msg: Message,
    command_tx: mpsc::UnboundedSender<TriggerCommand>,
) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    if !is_accept_command(text) {
        return Ok(());
    }

    match parse_accept_command(text) {
        Some((channel, limit)) => {
            let _ = command_tx.send(TriggerCommand {
                origin_chat: msg.chat.id.0,
                channel,
                limit,
            });
        }
        None => {
            bot.send_message(msg.chat.id, "Usage: /accept <channel> [limit]")
                .await?;
        }
    }

    Ok(())
}

/// Whether the text is addressed to the accept command
fn is_accept_command(text: &str) -> bool {
    let head = text.split_whitespace().next().unwrap_or("");
    head.split('@').next().unwrap_or(head) == "/accept"
}

/// Parse "/accept <channel> [limit]" into its arguments
fn parse_accept_command(text: &str) -> Option<(String, Option<u64>)> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?;
    if head.split('@').next().unwrap_or(head) != "/accept" {
        return None;
    }
    let channel = parts.next()?.to_string();
    let limit = parts.next().and_then(|s| s.parse().ok());
    Some((channel, limit))
}
