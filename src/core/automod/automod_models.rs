// Auto-moderation domain models - data structures for the detection engine.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts these to Discord-specific actions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What to do to the offending member once a violation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Send the user a direct message with the reason
    Warn,
    /// Apply a timed communication restriction
    Timeout,
    /// Remove the member from the guild
    Kick,
    /// Ban the member
    Ban,
    /// No member-level action; deleting the message is the whole effect
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Warn => write!(f, "warn"),
            ActionKind::Timeout => write!(f, "timeout"),
            ActionKind::Kick => write!(f, "kick"),
            ActionKind::Ban => write!(f, "ban"),
            ActionKind::Delete => write!(f, "delete"),
        }
    }
}

/// Raid responses are restricted to kick or ban - warn/timeout/delete make no
/// sense for a join burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidAction {
    Kick,
    Ban,
}

impl From<RaidAction> for ActionKind {
    fn from(action: RaidAction) -> Self {
        match action {
            RaidAction::Kick => ActionKind::Kick,
            RaidAction::Ban => ActionKind::Ban,
        }
    }
}

/// Which rule a message (or join) broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    Spam,
    DuplicateSpam,
    MassMention,
    DisallowedLink,
    Invite,
    BannedWord,
    ExcessiveCaps,
    EmojiSpam,
    Raid,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::Spam => write!(f, "Spam"),
            ViolationKind::DuplicateSpam => write!(f, "Duplicate Spam"),
            ViolationKind::MassMention => write!(f, "Mass Mention"),
            ViolationKind::DisallowedLink => write!(f, "Disallowed Link"),
            ViolationKind::Invite => write!(f, "Invite Link"),
            ViolationKind::BannedWord => write!(f, "Banned Word"),
            ViolationKind::ExcessiveCaps => write!(f, "Excessive Caps"),
            ViolationKind::EmojiSpam => write!(f, "Emoji Spam"),
            ViolationKind::Raid => write!(f, "Raid"),
        }
    }
}

/// Channel + message id pair, enough for the executor to delete a message
/// without touching the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// The output of a single detection check: what was broken and what remedy
/// to apply. Produced transiently, consumed immediately, never stored.
#[derive(Debug, Clone)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Short human-readable rule description ("Sending messages too quickly")
    pub reason: String,
    /// Specifics for the audit log ("sent 6 messages in 5 seconds")
    pub details: String,
    pub action: ActionKind,
    /// Only meaningful when `action` is `Timeout`
    pub timeout_duration_ms: Option<u64>,
    pub should_delete: bool,
    /// Message(s) to remove when `should_delete` is set. For spam and
    /// duplicate violations this is the whole offending batch.
    pub delete_targets: Vec<MessageRef>,
}

/// One recorded message in a user's sliding-window history. Ephemeral,
/// in-memory only; dropped by the sweep or when history is cleared.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub content: String,
    pub timestamp_ms: i64,
    pub channel_id: u64,
    pub message_id: u64,
}

/// One recorded guild join, for raid-burst detection.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub member_id: u64,
    pub timestamp_ms: i64,
}

/// Platform-agnostic view of an inbound message. The Discord layer extracts
/// this from serenity types before handing it to the service.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub author_id: u64,
    pub author_is_bot: bool,
    /// Whether the author holds the administrator permission (bypass)
    pub author_is_admin: bool,
    pub author_roles: Vec<u64>,
    pub content: String,
    pub mentioned_users: Vec<u64>,
    pub mentioned_roles: Vec<u64>,
    pub attachment_count: u32,
}

// ============================================================================
// CONFIGURATION
// ============================================================================
//
// One document per guild. Strongly typed with explicit defaults so the
// checks never have to guard against missing fields.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamRule {
    pub enabled: bool,
    /// Strictly more than this many messages in the window fires
    pub max_messages: u32,
    pub time_window_ms: u64,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_messages: bool,
}

impl Default for SpamRule {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: 5,          // 5 messages...
            time_window_ms: 5_000,    // ...in 5 seconds
            action: ActionKind::Timeout,
            timeout_duration_ms: 300_000, // 5 minute timeout
            delete_messages: true,
        }
    }
}

/// Duplicate detection shares the spam rule's time window - it counts within
/// the same recent-message set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateRule {
    pub enabled: bool,
    pub max_duplicates: u32,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_messages: bool,
}

impl Default for DuplicateRule {
    fn default() -> Self {
        Self {
            enabled: true,
            max_duplicates: 3,
            action: ActionKind::Timeout,
            timeout_duration_ms: 300_000,
            delete_messages: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionRule {
    pub enabled: bool,
    /// Unique mentioned users + roles above this fires
    pub max_mentions: u32,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_message: bool,
}

impl Default for MentionRule {
    fn default() -> Self {
        Self {
            enabled: true,
            max_mentions: 10,
            action: ActionKind::Warn,
            timeout_duration_ms: 300_000,
            delete_message: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRule {
    pub enabled: bool,
    /// Hostnames allowed by suffix match ("allowed.com" also admits
    /// "sub.allowed.com"). Anything else, including unparseable URLs,
    /// is disallowed.
    pub allowed_domains: Vec<String>,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_message: bool,
}

impl Default for LinkRule {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_domains: Vec::new(),
            action: ActionKind::Delete,
            timeout_duration_ms: 300_000,
            delete_message: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteRule {
    pub enabled: bool,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_message: bool,
}

impl Default for InviteRule {
    fn default() -> Self {
        Self {
            enabled: false,
            action: ActionKind::Delete,
            timeout_duration_ms: 300_000,
            delete_message: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordRule {
    pub enabled: bool,
    /// Matched case-insensitively as substrings
    pub words: Vec<String>,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_message: bool,
}

impl Default for WordRule {
    fn default() -> Self {
        Self {
            enabled: false,
            words: Vec::new(),
            action: ActionKind::Delete,
            timeout_duration_ms: 300_000,
            delete_message: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsRule {
    pub enabled: bool,
    /// Messages shorter than this (in characters) are never checked
    pub min_length: u32,
    /// Uppercase percentage at or above this fires (inclusive)
    pub percentage: u32,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_message: bool,
}

impl Default for CapsRule {
    fn default() -> Self {
        Self {
            enabled: false,
            min_length: 10,
            percentage: 70,
            action: ActionKind::Warn,
            timeout_duration_ms: 300_000,
            delete_message: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmojiRule {
    pub enabled: bool,
    /// Custom + standard emoji above this fires
    pub max_emojis: u32,
    pub action: ActionKind,
    pub timeout_duration_ms: u64,
    pub delete_message: bool,
}

impl Default for EmojiRule {
    fn default() -> Self {
        Self {
            enabled: false,
            max_emojis: 10,
            action: ActionKind::Warn,
            timeout_duration_ms: 300_000,
            delete_message: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidRule {
    pub enabled: bool,
    /// Strictly more than this many joins in the window fires
    pub join_threshold: u32,
    pub time_window_ms: u64,
    pub action: RaidAction,
}

impl Default for RaidRule {
    fn default() -> Self {
        Self {
            enabled: false,
            join_threshold: 10,
            time_window_ms: 10_000,
            action: RaidAction::Kick,
        }
    }
}

/// Per-guild auto-moderation configuration. Created lazily on the first
/// admin mutation; read-only to the detection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoModConfig {
    pub enabled: bool,
    /// Audit log destination; `None` disables audit logging entirely
    pub log_channel_id: Option<u64>,
    pub ignored_channels: HashSet<u64>,
    pub ignored_roles: HashSet<u64>,
    pub spam: SpamRule,
    pub duplicates: DuplicateRule,
    pub mentions: MentionRule,
    pub links: LinkRule,
    pub invites: InviteRule,
    pub banned_words: WordRule,
    pub caps: CapsRule,
    pub emoji: EmojiRule,
    pub raid: RaidRule,
}

impl Default for AutoModConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_channel_id: None,
            ignored_channels: HashSet::new(),
            ignored_roles: HashSet::new(),
            spam: SpamRule::default(),
            duplicates: DuplicateRule::default(),
            mentions: MentionRule::default(),
            links: LinkRule::default(),
            invites: InviteRule::default(),
            banned_words: WordRule::default(),
            caps: CapsRule::default(),
            emoji: EmojiRule::default(),
            raid: RaidRule::default(),
        }
    }
}
