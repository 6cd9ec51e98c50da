// Audit log emission - one embed per action taken, sent to the guild's
// configured log channel.
//
// No log channel configured means this is a no-op, and delivery failures are
// swallowed: audit logging must never block or fail the rest of the
// pipeline.

use crate::core::automod::{ActionKind, ViolationKind};
use poise::serenity_prelude::{self as serenity, CreateEmbed, CreateEmbedFooter};

/// How much of the offending message we reproduce in the log.
const MAX_LOGGED_CONTENT: usize = 1_000;

/// One structured record of an action the bot took.
pub struct AuditEntry {
    pub guild_id: u64,
    pub user_id: u64,
    pub kind: ViolationKind,
    pub action: ActionKind,
    pub reason: String,
    pub details: String,
    pub deleted: bool,
    /// Message-shaped fields; absent for raid (join) entries
    pub channel_id: Option<u64>,
    pub message_id: Option<u64>,
    pub attachment_count: u32,
    pub content: Option<String>,
}

fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_LOGGED_CONTENT {
        content.to_string()
    } else {
        let mut truncated: String = content.chars().take(MAX_LOGGED_CONTENT).collect();
        truncated.push_str("...");
        truncated
    }
}

fn format_audit_embed(entry: &AuditEntry) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(format!("🛡️ Auto-Moderation: {}", entry.kind))
        .description(format!(
            "<@{}> — {} ({})",
            entry.user_id, entry.reason, entry.details
        ))
        .color(serenity::Color::RED)
        .field("Action", entry.action.to_string(), true)
        .field("Message Deleted", if entry.deleted { "Yes" } else { "No" }, true)
        .footer(CreateEmbedFooter::new(format!("User ID: {}", entry.user_id)))
        .timestamp(serenity::Timestamp::now());

    if let Some(channel_id) = entry.channel_id {
        embed = embed.field("Channel", format!("<#{}>", channel_id), true);
    }
    if let Some(message_id) = entry.message_id {
        embed = embed.field("Message ID", message_id.to_string(), true);
        if let Some(channel_id) = entry.channel_id {
            embed = embed.field(
                "Jump",
                format!(
                    "https://discord.com/channels/{}/{}/{}",
                    entry.guild_id, channel_id, message_id
                ),
                true,
            );
        }
    }
    if entry.attachment_count > 0 {
        embed = embed.field("Attachments", entry.attachment_count.to_string(), true);
    }
    if let Some(content) = &entry.content {
        if !content.is_empty() {
            embed = embed.field("Content", truncate_content(content), false);
        }
    }

    embed
}

/// Deliver an audit entry, best-effort. `log_channel_id` comes from the
/// guild config; `None` disables audit logging.
pub async fn send_audit(
    ctx: &serenity::Context,
    log_channel_id: Option<u64>,
    entry: AuditEntry,
) {
    let Some(channel_id) = log_channel_id else {
        return;
    };

    let message = serenity::CreateMessage::new().embed(format_audit_embed(&entry));
    if let Err(e) = serenity::ChannelId::new(channel_id)
        .send_message(&ctx.http, message)
        .await
    {
        // Destination may have been deleted or we lost permission; the
        // pipeline carries on either way.
        tracing::debug!(channel_id, "failed to deliver audit log entry: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_content_is_truncated_with_marker() {
        let content = "x".repeat(2_000);
        let truncated = truncate_content(&content);
        assert_eq!(truncated.chars().count(), MAX_LOGGED_CONTENT + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(truncate_content("hello"), "hello");
    }
}
