// Auto-moderation service - the core pipeline for inbound messages and joins.
//
// This service handles:
// - Config lookup and bypass rules (bots, ignored channels/roles, admins)
// - Running the detection checks in their fixed order
// - Clearing history after spam-class violations
// - The join-burst pipeline
//
// NO Discord dependencies here - just pure domain logic. The Discord layer
// executes the resulting violations and writes the audit log.

use super::automod_models::{
    AutoModConfig, IncomingMessage, JoinEvent, MessageEvent, Violation, ViolationKind,
};
use super::checks::{check_join_burst, default_checks, MessageCheck};
use super::tracker::SlidingWindowTracker;
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AutoModError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting per-guild moderation config.
///
/// Following the same pattern as the other feature stores.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch the config for a guild. `None` means the guild was never
    /// configured, which the service treats as "feature disabled".
    async fn find_config(&self, guild_id: u64) -> Result<Option<AutoModConfig>, AutoModError>;

    /// Save (create or replace) the config for a guild.
    async fn save_config(&self, guild_id: u64, config: AutoModConfig) -> Result<(), AutoModError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Everything the caller needs to act on one event. `log_channel_id` comes
/// from the same config snapshot the checks ran against, so the dispatcher
/// never re-reads the store mid-event; an admin edit landing concurrently
/// only affects the next event.
#[derive(Debug, Default)]
pub struct Detection {
    pub violations: Vec<Violation>,
    pub log_channel_id: Option<u64>,
}

/// Auto-moderation service: detection only. Violations come back to the
/// caller, which owns action execution and audit logging.
pub struct AutoModService<S: ConfigStore> {
    store: S,
    tracker: SlidingWindowTracker,
    checks: Vec<Box<dyn MessageCheck>>,
}

impl<S: ConfigStore> AutoModService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tracker: SlidingWindowTracker::new(),
            checks: default_checks(),
        }
    }

    /// Whether the detection pipeline should skip this message entirely.
    /// Bypass runs strictly before any check - bypassed input is never
    /// recorded or evaluated.
    fn is_bypassed(msg: &IncomingMessage, config: &AutoModConfig) -> bool {
        msg.author_is_bot
            || msg.author_is_admin
            || config.ignored_channels.contains(&msg.channel_id)
            || msg
                .author_roles
                .iter()
                .any(|role| config.ignored_roles.contains(role))
    }

    /// Run every applicable check against an inbound message.
    ///
    /// Returns all violations that fired; each is acted on and logged
    /// independently by the caller. The spam/duplicate pair is the only
    /// short-circuit: a spam hit suppresses the duplicate check, and either
    /// clears the user's history so the same burst can't re-trigger.
    pub async fn process_message(
        &self,
        msg: &IncomingMessage,
        now_ms: i64,
    ) -> Result<Detection, AutoModError> {
        let config = match self.store.find_config(msg.guild_id).await? {
            Some(config) if config.enabled => config,
            _ => return Ok(Detection::default()),
        };

        if Self::is_bypassed(msg, &config) {
            return Ok(Detection {
                violations: Vec::new(),
                log_channel_id: config.log_channel_id,
            });
        }

        self.tracker.record_message(
            msg.guild_id,
            msg.author_id,
            MessageEvent {
                content: msg.content.clone(),
                timestamp_ms: now_ms,
                channel_id: msg.channel_id,
                message_id: msg.message_id,
            },
        );

        // One window-filtered snapshot feeds both spam and duplicate checks
        let recent = self.tracker.recent_messages(
            msg.guild_id,
            msg.author_id,
            config.spam.time_window_ms,
            now_ms,
        );

        let mut violations = Vec::new();
        let mut spam_fired = false;

        for check in &self.checks {
            if spam_fired && check.kind() == ViolationKind::DuplicateSpam {
                continue;
            }

            if let Some(violation) = check.evaluate(msg, &config, &recent) {
                match violation.kind {
                    ViolationKind::Spam | ViolationKind::DuplicateSpam => {
                        self.tracker.clear_messages(msg.guild_id, msg.author_id);
                        spam_fired = true;
                    }
                    _ => {}
                }
                violations.push(violation);
            }
        }

        Ok(Detection {
            violations,
            log_channel_id: config.log_channel_id,
        })
    }

    /// Run the join-burst pipeline for a new member. A violation targets
    /// that member, never the earlier joiners in the burst.
    pub async fn process_join(
        &self,
        guild_id: u64,
        member_id: u64,
        now_ms: i64,
    ) -> Result<Detection, AutoModError> {
        let config = match self.store.find_config(guild_id).await? {
            Some(config) if config.enabled => config,
            _ => return Ok(Detection::default()),
        };
        if !config.raid.enabled {
            return Ok(Detection {
                violations: Vec::new(),
                log_channel_id: config.log_channel_id,
            });
        }

        self.tracker.record_join(
            guild_id,
            JoinEvent {
                member_id,
                timestamp_ms: now_ms,
            },
        );

        let recent = self
            .tracker
            .recent_joins(guild_id, config.raid.time_window_ms, now_ms);

        Ok(Detection {
            violations: check_join_burst(&config.raid, recent.len())
                .into_iter()
                .collect(),
            log_channel_id: config.log_channel_id,
        })
    }

    /// Expire stale tracker state. The dispatcher calls this on a fixed
    /// 60 second timer.
    pub fn sweep(&self, now_ms: i64) {
        self.tracker.sweep(now_ms);
    }

    // ------------------------------------------------------------------------
    // Admin config surface
    // ------------------------------------------------------------------------

    /// Current config for a guild, default-initialized if never configured.
    pub async fn get_config(&self, guild_id: u64) -> Result<AutoModConfig, AutoModError> {
        Ok(self
            .store
            .find_config(guild_id)
            .await?
            .unwrap_or_default())
    }

    /// Load-or-default, mutate, save. This is how the config document gets
    /// lazily created on the first admin command.
    pub async fn update_config<F>(&self, guild_id: u64, mutate: F) -> Result<AutoModConfig, AutoModError>
    where
        F: FnOnce(&mut AutoModConfig),
    {
        let mut config = self.get_config(guild_id).await?;
        mutate(&mut config);
        self.store.save_config(guild_id, config.clone()).await?;
        Ok(config)
    }

    /// Enable or disable auto-moderation for a guild.
    pub async fn set_enabled(&self, guild_id: u64, enabled: bool) -> Result<(), AutoModError> {
        self.update_config(guild_id, |config| config.enabled = enabled)
            .await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &SlidingWindowTracker {
        &self.tracker
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::automod_models::{ActionKind, RaidAction};
    use crate::infra::automod::InMemoryConfigStore;

    fn message(guild_id: u64, user_id: u64, message_id: u64, content: &str) -> IncomingMessage {
        IncomingMessage {
            guild_id,
            channel_id: 100,
            message_id,
            author_id: user_id,
            author_is_bot: false,
            author_is_admin: false,
            author_roles: Vec::new(),
            content: content.to_string(),
            mentioned_users: Vec::new(),
            mentioned_roles: Vec::new(),
            attachment_count: 0,
        }
    }

    async fn service_with(config: AutoModConfig) -> AutoModService<InMemoryConfigStore> {
        let store = InMemoryConfigStore::new();
        store.save_config(1, config).await.unwrap();
        AutoModService::new(store)
    }

    #[tokio::test]
    async fn unconfigured_guild_is_left_alone() {
        let service = AutoModService::new(InMemoryConfigStore::new());
        let detection = service
            .process_message(&message(1, 2, 1, "hi"), 0)
            .await
            .unwrap();
        assert!(detection.violations.is_empty());
        assert_eq!(detection.log_channel_id, None);
        // Nothing recorded either - no config means no tracking
        assert!(service.tracker().recent_messages(1, 2, u64::MAX, 0).is_empty());
    }

    #[tokio::test]
    async fn disabled_config_skips_everything() {
        let config = AutoModConfig {
            enabled: false,
            ..Default::default()
        };
        let service = service_with(config).await;

        for i in 0..20 {
            let detection = service
                .process_message(&message(1, 2, i, "spam"), 0)
                .await
                .unwrap();
            assert!(detection.violations.is_empty());
        }
    }

    #[tokio::test]
    async fn spam_fires_on_sixth_message_and_clears_history() {
        // Defaults: max_messages 5, window 5000ms, timeout action
        let service = service_with(AutoModConfig::default()).await;

        for i in 0..5 {
            let detection = service
                .process_message(&message(1, 2, i, &format!("msg {}", i)), (i * 800) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty(), "message {} should pass", i);
        }

        let detection = service
            .process_message(&message(1, 2, 5, "msg 5"), 4_000)
            .await
            .unwrap();
        assert_eq!(detection.violations.len(), 1);
        let v = &detection.violations[0];
        assert_eq!(v.kind, ViolationKind::Spam);
        assert_eq!(v.action, ActionKind::Timeout);
        assert_eq!(v.timeout_duration_ms, Some(300_000));
        assert!(v.should_delete);
        // The whole six-message burst is marked for deletion
        assert_eq!(v.delete_targets.len(), 6);

        // History cleared so the burst cannot immediately re-trigger
        assert!(service.tracker().recent_messages(1, 2, u64::MAX, 4_000).is_empty());

        let detection = service
            .process_message(&message(1, 2, 6, "msg 6"), 4_100)
            .await
            .unwrap();
        assert!(detection.violations.is_empty());
    }

    #[tokio::test]
    async fn messages_outside_window_do_not_count_as_spam() {
        let service = service_with(AutoModConfig::default()).await;

        // Six messages, but spread beyond the 5s window
        for i in 0..6 {
            let detection = service
                .process_message(&message(1, 2, i, "hello"), (i * 2_000) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty(), "message {} should pass", i);
        }
    }

    #[tokio::test]
    async fn duplicate_fires_on_fourth_identical_message() {
        // Raise max_messages so the rate check stays quiet
        let mut config = AutoModConfig::default();
        config.spam.max_messages = 50;
        let service = service_with(config).await;

        for i in 0..3 {
            let detection = service
                .process_message(&message(1, 2, i, "buy now"), (i * 100) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty());
        }

        let violations = service
            .process_message(&message(1, 2, 3, "buy now"), 300)
            .await
            .unwrap()
            .violations;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::DuplicateSpam);
        // All four duplicates get deleted
        assert_eq!(violations[0].delete_targets.len(), 4);
        assert!(service.tracker().recent_messages(1, 2, u64::MAX, 300).is_empty());
    }

    #[tokio::test]
    async fn spam_suppresses_duplicate_but_not_the_rest() {
        // The fourth identical message trips both the rate limit (3) and the
        // duplicate limit (3) at once; spam wins, the invite check still runs.
        let mut config = AutoModConfig::default();
        config.spam.max_messages = 3;
        config.invites.enabled = true;
        let service = service_with(config).await;

        let mut last = Vec::new();
        for i in 0..4 {
            last = service
                .process_message(
                    &message(1, 2, i, "join discord.gg/spam"),
                    (i * 100) as i64,
                )
                .await
                .unwrap()
                .violations;
        }

        let kinds: Vec<ViolationKind> = last.iter().map(|v| v.kind).collect();
        // Spam fired, duplicate was suppressed, invite still ran independently
        assert_eq!(kinds, vec![ViolationKind::Spam, ViolationKind::Invite]);
    }

    #[tokio::test]
    async fn multiple_independent_checks_fire_for_one_message() {
        let mut config = AutoModConfig::default();
        config.invites.enabled = true;
        config.banned_words.enabled = true;
        config.banned_words.words = vec!["badword".to_string()];
        let service = service_with(config).await;

        let violations = service
            .process_message(&message(1, 2, 1, "badword discord.gg/raid"), 0)
            .await
            .unwrap()
            .violations;

        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::Invite, ViolationKind::BannedWord]);
    }

    #[tokio::test]
    async fn bypass_rules_run_before_any_check() {
        let mut config = AutoModConfig::default();
        config.ignored_channels.insert(100);
        let service = service_with(config).await;

        for i in 0..10 {
            let detection = service
                .process_message(&message(1, 2, i, "spam"), 0)
                .await
                .unwrap();
            assert!(detection.violations.is_empty());
        }
        // Bypassed messages are never even recorded
        assert!(service.tracker().recent_messages(1, 2, u64::MAX, 0).is_empty());
    }

    #[tokio::test]
    async fn admin_and_ignored_role_bypass() {
        let mut config = AutoModConfig::default();
        config.ignored_roles.insert(777);
        let service = service_with(config).await;

        let mut admin = message(1, 2, 1, "spam");
        admin.author_is_admin = true;
        assert!(service
            .process_message(&admin, 0)
            .await
            .unwrap()
            .violations
            .is_empty());

        let mut trusted = message(1, 3, 2, "spam");
        trusted.author_roles = vec![5, 777];
        assert!(service
            .process_message(&trusted, 0)
            .await
            .unwrap()
            .violations
            .is_empty());
    }

    #[tokio::test]
    async fn raid_fires_on_eleventh_join() {
        let mut config = AutoModConfig::default();
        config.raid = crate::core::automod::automod_models::RaidRule {
            enabled: true,
            join_threshold: 10,
            time_window_ms: 10_000,
            action: RaidAction::Kick,
        };
        let service = service_with(config).await;

        for member in 0..10u64 {
            let detection = service
                .process_join(1, member, (member * 500) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty(), "join {} should pass", member);
        }

        let violations = service.process_join(1, 10, 5_000).await.unwrap().violations;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Raid);
        assert_eq!(violations[0].action, ActionKind::Kick);
    }

    #[tokio::test]
    async fn joins_outside_window_do_not_count() {
        let mut config = AutoModConfig::default();
        config.raid.enabled = true;
        config.raid.join_threshold = 2;
        config.raid.time_window_ms = 1_000;
        let service = service_with(config).await;

        for i in 0..5u64 {
            let detection = service
                .process_join(1, i, (i * 2_000) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty());
        }
    }

    #[tokio::test]
    async fn end_to_end_spam_burst_gets_one_timeout_violation() {
        // Spam rule only: 6x "hi" inside the window must produce exactly one
        // violation, on the sixth message, with the configured timeout and
        // the whole batch queued for deletion.
        let mut config = AutoModConfig::default();
        config.duplicates.enabled = false;
        let service = service_with(config).await;

        let mut total = 0;
        let mut last = Vec::new();
        for i in 0..6u64 {
            last = service
                .process_message(&message(1, 2, i, "hi"), (i * 800) as i64)
                .await
                .unwrap()
                .violations;
            total += last.len();
        }

        assert_eq!(total, 1);
        assert_eq!(last.len(), 1);
        let v = &last[0];
        assert_eq!(v.kind, ViolationKind::Spam);
        assert_eq!(v.action, ActionKind::Timeout);
        assert_eq!(v.timeout_duration_ms, Some(300_000));
        assert!(v.should_delete);
        assert_eq!(v.delete_targets.len(), 6);
    }

    #[tokio::test]
    async fn update_config_creates_lazily_and_persists() {
        let service = AutoModService::new(InMemoryConfigStore::new());

        let updated = service
            .update_config(9, |config| config.spam.max_messages = 8)
            .await
            .unwrap();
        assert_eq!(updated.spam.max_messages, 8);

        let reloaded = service.get_config(9).await.unwrap();
        assert_eq!(reloaded.spam.max_messages, 8);
        assert!(reloaded.enabled);
    }

    #[tokio::test]
    async fn detection_carries_audit_destination_from_the_same_snapshot() {
        let mut config = AutoModConfig::default();
        config.log_channel_id = Some(555);
        config.invites.enabled = true;
        let service = service_with(config).await;

        let detection = service
            .process_message(&message(1, 2, 1, "discord.gg/burst"), 0)
            .await
            .unwrap();
        assert_eq!(detection.violations.len(), 1);
        assert_eq!(detection.log_channel_id, Some(555));

        // Clean messages and joins carry the destination too
        let detection = service.process_message(&message(1, 2, 2, "hi"), 10).await.unwrap();
        assert!(detection.violations.is_empty());
        assert_eq!(detection.log_channel_id, Some(555));

        let detection = service.process_join(1, 3, 20).await.unwrap();
        assert_eq!(detection.log_channel_id, Some(555));
    }

    #[tokio::test]
    async fn duplicate_rule_can_be_disabled_and_retargeted() {
        // The duplicate rule is on by default; the admin surface must be able
        // to retarget it and turn it off entirely.
        let service = AutoModService::new(InMemoryConfigStore::new());
        service
            .update_config(1, |config| {
                config.spam.max_messages = 50;
                config.duplicates.action = ActionKind::Ban;
                config.duplicates.delete_messages = false;
            })
            .await
            .unwrap();

        for i in 0..3 {
            let detection = service
                .process_message(&message(1, 2, i, "same"), (i * 100) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty());
        }
        let violations = service
            .process_message(&message(1, 2, 3, "same"), 300)
            .await
            .unwrap()
            .violations;
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::DuplicateSpam);
        assert_eq!(violations[0].action, ActionKind::Ban);
        assert!(!violations[0].should_delete);

        // Once disabled the same burst passes untouched
        service
            .update_config(1, |config| config.duplicates.enabled = false)
            .await
            .unwrap();
        for i in 10..20 {
            let detection = service
                .process_message(&message(1, 2, i, "same"), 400 + (i * 10) as i64)
                .await
                .unwrap();
            assert!(detection.violations.is_empty(), "message {} should pass", i);
        }
    }
}
