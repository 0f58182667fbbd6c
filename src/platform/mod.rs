//! Platform client seam for the messaging API.
//!
//! The engine only talks to the platform through [`PlatformClient`]; the
//! teloxide-backed implementation lives in [`telegram`]. Errors cross this
//! boundary as the closed [`PlatformError`] enum, never as the wire
//! library's own error hierarchy.

pub mod telegram;

use serde::Serialize;

/// Canonical channel metadata returned by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMeta {
    /// Platform-native channel ID
    pub id: i64,
    /// Human-readable channel title
    pub title: String,
}

/// Membership role of the acting account in a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl Role {
    /// Whether this role may approve join requests.
    ///
    /// The platform exposes no reliable per-capability flag, so role
    /// membership stands in for "can approve joins".
    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Owner | Role::Administrator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Administrator => write!(f, "administrator"),
            Role::Member => write!(f, "member"),
            Role::Restricted => write!(f, "restricted"),
            Role::Left => write!(f, "left"),
            Role::Banned => write!(f, "banned"),
        }
    }
}

/// One entry in the pending join-request backlog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingJoinRequest {
    /// Requesting user's ID
    pub user_id: i64,
    /// Display name of the requesting user
    pub display_name: String,
    /// Username/handle, if the user has one
    pub username: Option<String>,
}

/// One page of the pending backlog
///
/// `next_cursor` is opaque to callers: pass it back unchanged to fetch the
/// following page. `None` means the sequence is exhausted.
#[derive(Debug, Clone, Default)]
pub struct PendingPage {
    pub items: Vec<PendingJoinRequest>,
    pub next_cursor: Option<u64>,
}

/// A chat-command trigger forwarded by the platform adapter
#[derive(Debug, Clone)]
pub struct TriggerCommand {
    /// Chat where the command was issued (replies go here)
    pub origin_chat: i64,
    /// Raw channel identifier argument
    pub channel: String,
    /// Optional approval limit argument
    pub limit: Option<u64>,
}

/// Errors from platform calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Platform mandated a wait of this many seconds before retrying
    RateLimited(u64),
    /// The acting account may not perform this call
    PermissionDenied,
    /// Channel or user does not exist / is not visible
    NotFound(String),
    /// Transport or unclassified platform failure
    Transport(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::RateLimited(secs) => {
                write!(f, "rate limited, retry after {}s", secs)
            }
            PlatformError::PermissionDenied => write!(f, "permission denied"),
            PlatformError::NotFound(what) => write!(f, "not found: {}", what),
            PlatformError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Trait for the messaging platform client
///
/// The only component that performs network calls. All methods are
/// per-account rate limited by the platform, so callers pace themselves.
#[async_trait::async_trait]
pub trait PlatformClient: Send + Sync {
    /// Associate the acting account with a channel (idempotent; no-op if
    /// already associated). Required before pending requests become visible.
    async fn join_channel(&self, raw: &str) -> Result<(), PlatformError>;

    /// Fetch canonical channel metadata for a raw identifier
    /// (numeric ID or handle form).
    async fn get_channel(&self, raw: &str) -> Result<ChannelMeta, PlatformError>;

    /// Get the acting account's membership role in a channel.
    async fn get_membership(&self, channel_id: i64) -> Result<Role, PlatformError>;

    /// Fetch one page of pending join requests, oldest first.
    async fn pending_page(
        &self,
        channel_id: i64,
        cursor: Option<u64>,
    ) -> Result<PendingPage, PlatformError>;

    /// Approve a single join request.
    async fn approve_join_request(&self, channel_id: i64, user_id: i64)
        -> Result<(), PlatformError>;

    /// Attempt to approve the entire backlog in one call.
    ///
    /// Returns `Ok(false)` when the platform offers no bulk shortcut for
    /// this account type. A `true` result is advisory: the platform does
    /// not report how many requests were cleared.
    async fn approve_all_join_requests(&self, channel_id: i64) -> Result<bool, PlatformError>;
}
