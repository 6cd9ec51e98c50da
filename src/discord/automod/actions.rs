// Discord-specific action execution - translates a Violation into platform
// calls.
//
// Every fallible member-level effect comes back as a Result so the
// dispatcher can log failures in one place; nothing here panics or
// propagates. Message deletion runs independently of the member action and
// its failures are swallowed (the message may already be gone).

use crate::core::automod::{ActionKind, MessageRef, Violation};
use poise::serenity_prelude as serenity;
use std::collections::HashSet;
use thiserror::Error;

/// Ban-time history purge lookback, in days (platform-bounded).
const BAN_DELETE_MESSAGE_DAYS: u8 = 1;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to DM warning: {0}")]
    Warn(serenity::Error),
    #[error("failed to build timeout timestamp: {0}")]
    TimeoutTimestamp(String),
    #[error("failed to time out member: {0}")]
    Timeout(serenity::Error),
    #[error("failed to kick member: {0}")]
    Kick(serenity::Error),
    #[error("failed to ban member: {0}")]
    Ban(serenity::Error),
}

/// What actually happened while executing one violation.
pub struct ActionOutcome {
    pub action: ActionKind,
    /// The member-level effect; `Err` means the user saw no visible action
    pub member_result: Result<(), ActionError>,
    /// Whether at least one targeted message was removed
    pub deleted: bool,
}

/// Execute a violation's configured action against the offender, then delete
/// the targeted message(s) if the rule asks for it.
///
/// Several violations on one message can each request deletion of the same
/// target. `deleted_in_batch` carries the ids removed so far, so a later
/// violation neither retries the call nor reports the removal as failed.
pub async fn apply_violation(
    ctx: &serenity::Context,
    guild_id: u64,
    user_id: u64,
    violation: &Violation,
    deleted_in_batch: &mut HashSet<MessageRef>,
) -> ActionOutcome {
    let reason = format!("Auto-moderation: {}", violation.reason);

    let member_result = match violation.action {
        ActionKind::Warn => warn_user(ctx, user_id, violation).await,
        ActionKind::Timeout => timeout_member(ctx, guild_id, user_id, violation, &reason).await,
        ActionKind::Kick => kick_member(ctx, guild_id, user_id, &reason).await,
        ActionKind::Ban => ban_member(ctx, guild_id, user_id, &reason).await,
        // Deleting the message below is the entire effect
        ActionKind::Delete => Ok(()),
    };

    let mut deleted = false;
    if violation.should_delete {
        let (already_removed, pending) = split_targets(violation, deleted_in_batch);
        deleted = already_removed;
        for target in pending {
            let channel = serenity::ChannelId::new(target.channel_id);
            let message = serenity::MessageId::new(target.message_id);
            match channel.delete_message(&ctx.http, message).await {
                Ok(()) => {
                    deleted = true;
                    deleted_in_batch.insert(target);
                }
                Err(e) => {
                    tracing::debug!(
                        message_id = target.message_id,
                        "could not delete flagged message: {e}"
                    );
                }
            }
        }
    }

    ActionOutcome {
        action: violation.action,
        member_result,
        deleted,
    }
}

/// Partition a violation's targets into "already removed earlier in this
/// batch" (a bool, since they count as deleted for the audit entry) and the
/// targets still pending.
fn split_targets(
    violation: &Violation,
    deleted_in_batch: &HashSet<MessageRef>,
) -> (bool, Vec<MessageRef>) {
    let already_removed = violation
        .delete_targets
        .iter()
        .any(|t| deleted_in_batch.contains(t));
    let pending = violation
        .delete_targets
        .iter()
        .filter(|t| !deleted_in_batch.contains(t))
        .copied()
        .collect();
    (already_removed, pending)
}

/// Direct-message the offender with reason and details.
async fn warn_user(
    ctx: &serenity::Context,
    user_id: u64,
    violation: &Violation,
) -> Result<(), ActionError> {
    let text = format!(
        "⚠️ **Auto-moderation warning**: {} ({})",
        violation.reason, violation.details
    );
    let dm = serenity::UserId::new(user_id)
        .create_dm_channel(&ctx.http)
        .await
        .map_err(ActionError::Warn)?;
    dm.id.say(&ctx.http, text).await.map_err(ActionError::Warn)?;
    Ok(())
}

async fn timeout_member(
    ctx: &serenity::Context,
    guild_id: u64,
    user_id: u64,
    violation: &Violation,
    reason: &str,
) -> Result<(), ActionError> {
    let duration_ms = violation.timeout_duration_ms.unwrap_or(300_000);
    let until = serenity::Timestamp::from_unix_timestamp(
        chrono::Utc::now().timestamp() + (duration_ms / 1000) as i64,
    )
    .map_err(|e| ActionError::TimeoutTimestamp(e.to_string()))?;

    serenity::GuildId::new(guild_id)
        .edit_member(
            &ctx.http,
            serenity::UserId::new(user_id),
            serenity::EditMember::new()
                .disable_communication_until_datetime(until)
                .audit_log_reason(reason),
        )
        .await
        .map_err(ActionError::Timeout)?;
    Ok(())
}

async fn kick_member(
    ctx: &serenity::Context,
    guild_id: u64,
    user_id: u64,
    reason: &str,
) -> Result<(), ActionError> {
    serenity::GuildId::new(guild_id)
        .kick_with_reason(&ctx.http, serenity::UserId::new(user_id), reason)
        .await
        .map_err(ActionError::Kick)
}

async fn ban_member(
    ctx: &serenity::Context,
    guild_id: u64,
    user_id: u64,
    reason: &str,
) -> Result<(), ActionError> {
    serenity::GuildId::new(guild_id)
        .ban_with_reason(
            &ctx.http,
            serenity::UserId::new(user_id),
            BAN_DELETE_MESSAGE_DAYS,
            reason,
        )
        .await
        .map_err(ActionError::Ban)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::ViolationKind;

    fn deleting_violation(kind: ViolationKind, targets: Vec<MessageRef>) -> Violation {
        Violation {
            kind,
            reason: "test".to_string(),
            details: "test".to_string(),
            action: ActionKind::Delete,
            timeout_duration_ms: None,
            should_delete: true,
            delete_targets: targets,
        }
    }

    #[test]
    fn target_removed_by_an_earlier_violation_is_not_retried_and_still_counts() {
        let target = MessageRef {
            channel_id: 10,
            message_id: 20,
        };
        let first = deleting_violation(ViolationKind::Invite, vec![target]);
        let second = deleting_violation(ViolationKind::BannedWord, vec![target]);

        let mut deleted_in_batch = HashSet::new();

        let (already, pending) = split_targets(&first, &deleted_in_batch);
        assert!(!already);
        assert_eq!(pending, vec![target]);
        deleted_in_batch.insert(target);

        // The second violation sees the message as already gone
        let (already, pending) = split_targets(&second, &deleted_in_batch);
        assert!(already);
        assert!(pending.is_empty());
    }

    #[test]
    fn only_shared_targets_are_skipped() {
        let shared = MessageRef {
            channel_id: 10,
            message_id: 20,
        };
        let extra = MessageRef {
            channel_id: 10,
            message_id: 21,
        };
        let violation = deleting_violation(ViolationKind::Spam, vec![shared, extra]);

        let mut deleted_in_batch = HashSet::new();
        deleted_in_batch.insert(shared);

        let (already, pending) = split_targets(&violation, &deleted_in_batch);
        assert!(already);
        assert_eq!(pending, vec![extra]);
    }
}
