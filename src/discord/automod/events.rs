// Event dispatch - wires inbound Discord events through the detection
// service, then executes and logs each violation.
//
// Nothing here propagates past the event handler: a failed action is logged
// and the remaining violations, the sweep timer and other users' events all
// carry on.

use crate::core::automod::{IncomingMessage, ViolationKind};
use crate::discord::automod::actions::{self, ActionOutcome};
use crate::discord::automod::audit::{self, AuditEntry};
use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;

/// Run the auto-moderation pipeline for an inbound guild message.
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<()> {
    // Skip bots and DMs
    if msg.author.bot {
        return Ok(());
    }
    let guild_id = match msg.guild_id {
        Some(id) => id.get(),
        None => return Ok(()),
    };

    let incoming = build_incoming(ctx, msg, guild_id);
    let now_ms = chrono::Utc::now().timestamp_millis();

    // One config snapshot per event: the detection carries the audit
    // destination it ran against, so a concurrent admin edit only affects
    // the next message.
    let detection = data.automod.process_message(&incoming, now_ms).await?;
    if detection.violations.is_empty() {
        return Ok(());
    }
    let log_channel_id = detection.log_channel_id;

    let mut deleted_in_batch = HashSet::new();
    for violation in detection.violations {
        let outcome = actions::apply_violation(
            ctx,
            guild_id,
            incoming.author_id,
            &violation,
            &mut deleted_in_batch,
        )
        .await;
        log_outcome(guild_id, incoming.author_id, &violation.kind, &outcome);

        audit::send_audit(
            ctx,
            log_channel_id,
            AuditEntry {
                guild_id,
                user_id: incoming.author_id,
                kind: violation.kind,
                action: violation.action,
                reason: violation.reason.clone(),
                details: violation.details.clone(),
                deleted: outcome.deleted,
                channel_id: Some(incoming.channel_id),
                message_id: Some(incoming.message_id),
                attachment_count: incoming.attachment_count,
                content: Some(incoming.content.clone()),
            },
        )
        .await;
    }

    Ok(())
}

/// Run the join-burst pipeline for a new guild member.
pub async fn handle_member_join(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<()> {
    if member.user.bot {
        return Ok(());
    }
    let guild_id = member.guild_id.get();
    let user_id = member.user.id.get();
    let now_ms = chrono::Utc::now().timestamp_millis();

    let detection = data.automod.process_join(guild_id, user_id, now_ms).await?;
    let violation = match detection.violations.into_iter().next() {
        Some(v) => v,
        None => return Ok(()),
    };

    let outcome =
        actions::apply_violation(ctx, guild_id, user_id, &violation, &mut HashSet::new()).await;
    log_outcome(guild_id, user_id, &violation.kind, &outcome);

    audit::send_audit(
        ctx,
        detection.log_channel_id,
        AuditEntry {
            guild_id,
            user_id,
            kind: violation.kind,
            action: violation.action,
            reason: violation.reason,
            details: violation.details,
            deleted: false,
            channel_id: None,
            message_id: None,
            attachment_count: 0,
            content: None,
        },
    )
    .await;

    Ok(())
}

/// The single place executor results get logged.
fn log_outcome(guild_id: u64, user_id: u64, kind: &ViolationKind, outcome: &ActionOutcome) {
    match &outcome.member_result {
        Ok(()) => {
            tracing::info!(
                guild_id,
                user_id,
                violation = %kind,
                action = %outcome.action,
                deleted = outcome.deleted,
                "auto-moderation action applied"
            );
        }
        Err(e) => {
            tracing::warn!(
                guild_id,
                user_id,
                violation = %kind,
                action = %outcome.action,
                "auto-moderation action failed: {e}"
            );
        }
    }
}

/// Extract the platform-agnostic message view the core works with.
fn build_incoming(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    guild_id: u64,
) -> IncomingMessage {
    let author_roles: Vec<u64> = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().map(|r| r.get()).collect())
        .unwrap_or_default();

    // Best-effort admin lookup from the cache. An unresolvable member just
    // means the bypass doesn't apply.
    let author_is_admin = ctx
        .cache
        .guild(serenity::GuildId::new(guild_id))
        .map(|guild| {
            guild
                .members
                .get(&msg.author.id)
                .map(|member| guild.member_permissions(member).administrator())
                .unwrap_or(false)
        })
        .unwrap_or(false);

    IncomingMessage {
        guild_id,
        channel_id: msg.channel_id.get(),
        message_id: msg.id.get(),
        author_id: msg.author.id.get(),
        author_is_bot: msg.author.bot,
        author_is_admin,
        author_roles,
        content: msg.content.clone(),
        mentioned_users: msg.mentions.iter().map(|u| u.id.get()).collect(),
        mentioned_roles: msg.mention_roles.iter().map(|r| r.get()).collect(),
        attachment_count: msg.attachments.len() as u32,
    }
}
