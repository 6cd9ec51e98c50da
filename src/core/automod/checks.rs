// Detection checks - each one is a pure predicate over the incoming message,
// the guild config, and the user's recent history.
//
// Checks run in a fixed order (spam, duplicate, mention, link, invite,
// banned word, caps, emoji). Adding a new check means appending to
// `default_checks`, not editing a monolithic handler.
//
// Threshold policy: strict `>` for "exceeds" everywhere except the caps
// percentage, which is inclusive `>=`. Unparseable URLs fail closed.

use super::automod_models::{
    ActionKind, AutoModConfig, IncomingMessage, MessageEvent, MessageRef, RaidRule, Violation,
    ViolationKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static INVITE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(discord\.gg/|discord(?:app)?\.com/invite/)").unwrap());
static CUSTOM_EMOJI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<a?:\w+:\d+>").unwrap());

/// A single detection rule. `recent` is the window-filtered history for the
/// message's author, current message included.
pub trait MessageCheck: Send + Sync {
    fn kind(&self) -> ViolationKind;

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        recent: &[MessageEvent],
    ) -> Option<Violation>;
}

/// The full check list in pipeline order.
pub fn default_checks() -> Vec<Box<dyn MessageCheck>> {
    vec![
        Box::new(SpamCheck),
        Box::new(DuplicateCheck),
        Box::new(MentionCheck),
        Box::new(LinkCheck),
        Box::new(InviteCheck),
        Box::new(BannedWordCheck),
        Box::new(CapsCheck),
        Box::new(EmojiCheck),
    ]
}

fn timeout_for(action: ActionKind, duration_ms: u64) -> Option<u64> {
    if action == ActionKind::Timeout {
        Some(duration_ms)
    } else {
        None
    }
}

fn current_message_target(msg: &IncomingMessage) -> Vec<MessageRef> {
    vec![MessageRef {
        channel_id: msg.channel_id,
        message_id: msg.message_id,
    }]
}

// ============================================================================
// MESSAGE CHECKS
// ============================================================================

/// Too many messages inside the spam window.
pub struct SpamCheck;

impl MessageCheck for SpamCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::Spam
    }

    fn evaluate(
        &self,
        _msg: &IncomingMessage,
        config: &AutoModConfig,
        recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.spam;
        if !rule.enabled || recent.len() <= rule.max_messages as usize {
            return None;
        }

        // The whole burst gets deleted, not just the triggering message
        let targets = recent
            .iter()
            .map(|m| MessageRef {
                channel_id: m.channel_id,
                message_id: m.message_id,
            })
            .collect();

        Some(Violation {
            kind: ViolationKind::Spam,
            reason: "Sending messages too quickly".to_string(),
            details: format!(
                "sent {} messages in {} seconds",
                recent.len(),
                rule.time_window_ms / 1000
            ),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_messages,
            delete_targets: targets,
        })
    }
}

/// Same content repeated too often inside the spam window.
pub struct DuplicateCheck;

impl MessageCheck for DuplicateCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::DuplicateSpam
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.duplicates;
        if !rule.enabled {
            return None;
        }

        let duplicates: Vec<&MessageEvent> = recent
            .iter()
            .filter(|m| m.content == msg.content)
            .collect();
        if duplicates.len() <= rule.max_duplicates as usize {
            return None;
        }

        let count = duplicates.len();
        let targets = duplicates
            .iter()
            .map(|m| MessageRef {
                channel_id: m.channel_id,
                message_id: m.message_id,
            })
            .collect();

        Some(Violation {
            kind: ViolationKind::DuplicateSpam,
            reason: "Sending duplicate messages".to_string(),
            details: format!("sent the same message {} times", count),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_messages,
            delete_targets: targets,
        })
    }
}

/// Too many unique user/role mentions in one message.
pub struct MentionCheck;

impl MessageCheck for MentionCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::MassMention
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        _recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.mentions;
        if !rule.enabled {
            return None;
        }

        let users: HashSet<u64> = msg.mentioned_users.iter().copied().collect();
        let roles: HashSet<u64> = msg.mentioned_roles.iter().copied().collect();
        let count = users.len() + roles.len();
        if count <= rule.max_mentions as usize {
            return None;
        }

        Some(Violation {
            kind: ViolationKind::MassMention,
            reason: "Too many mentions in one message".to_string(),
            details: format!("mentioned {} unique users/roles", count),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_message,
            delete_targets: current_message_target(msg),
        })
    }
}

/// Links whose hostname isn't a suffix match of an allow-listed domain.
pub struct LinkCheck;

impl LinkCheck {
    fn host_allowed(host: &str, allowed: &[String]) -> bool {
        let host = host.to_ascii_lowercase();
        allowed.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        })
    }
}

impl MessageCheck for LinkCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::DisallowedLink
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        _recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.links;
        if !rule.enabled {
            return None;
        }

        for m in URL_RE.find_iter(&msg.content) {
            // Unparseable or host-less URLs fail closed
            let allowed = match Url::parse(m.as_str()) {
                Ok(url) => url
                    .host_str()
                    .map(|host| Self::host_allowed(host, &rule.allowed_domains))
                    .unwrap_or(false),
                Err(_) => false,
            };

            if !allowed {
                return Some(Violation {
                    kind: ViolationKind::DisallowedLink,
                    reason: "Posting links to non-whitelisted domains".to_string(),
                    details: format!("posted {}", m.as_str()),
                    action: rule.action,
                    timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
                    should_delete: rule.delete_message,
                    delete_targets: current_message_target(msg),
                });
            }
        }
        None
    }
}

/// Discord invite links.
pub struct InviteCheck;

impl MessageCheck for InviteCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::Invite
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        _recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.invites;
        if !rule.enabled || !INVITE_RE.is_match(&msg.content) {
            return None;
        }

        Some(Violation {
            kind: ViolationKind::Invite,
            reason: "Posting server invite links".to_string(),
            details: "posted an invite link".to_string(),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_message,
            delete_targets: current_message_target(msg),
        })
    }
}

/// Case-insensitive substring match against the configured word list.
pub struct BannedWordCheck;

impl MessageCheck for BannedWordCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::BannedWord
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        _recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.banned_words;
        if !rule.enabled {
            return None;
        }

        let content = msg.content.to_lowercase();
        let matched: Vec<&str> = rule
            .words
            .iter()
            .filter(|w| content.contains(&w.to_lowercase()))
            .map(|w| w.as_str())
            .collect();
        if matched.is_empty() {
            return None;
        }

        Some(Violation {
            kind: ViolationKind::BannedWord,
            reason: "Using banned words".to_string(),
            details: format!("matched: {}", matched.join(", ")),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_message,
            delete_targets: current_message_target(msg),
        })
    }
}

/// Uppercase ratio over letters only; short messages are skipped entirely.
pub struct CapsCheck;

impl MessageCheck for CapsCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::ExcessiveCaps
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        _recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.caps;
        if !rule.enabled || msg.content.chars().count() < rule.min_length as usize {
            return None;
        }

        let letters = msg.content.chars().filter(|c| c.is_alphabetic()).count();
        if letters == 0 {
            return None;
        }
        let uppercase = msg.content.chars().filter(|c| c.is_uppercase()).count();

        // Inclusive boundary: exactly the threshold fires. Integer math
        // sidesteps float comparison at the boundary.
        if uppercase * 100 < rule.percentage as usize * letters {
            return None;
        }

        Some(Violation {
            kind: ViolationKind::ExcessiveCaps,
            reason: "Excessive capital letters".to_string(),
            details: format!("{}% of letters are uppercase", uppercase * 100 / letters),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_message,
            delete_targets: current_message_target(msg),
        })
    }
}

/// Custom emoji tokens plus standard pictographic codepoints.
pub struct EmojiCheck;

impl EmojiCheck {
    fn is_standard_emoji(c: char) -> bool {
        matches!(
            u32::from(c),
            0x1F300..=0x1F5FF   // symbols & pictographs
                | 0x1F600..=0x1F64F // emoticons
                | 0x1F680..=0x1F6FF // transport & map
                | 0x1F900..=0x1F9FF // supplemental symbols
                | 0x1FA70..=0x1FAFF // extended-A
                | 0x2600..=0x26FF   // misc symbols
                | 0x2700..=0x27BF   // dingbats
        )
    }
}

impl MessageCheck for EmojiCheck {
    fn kind(&self) -> ViolationKind {
        ViolationKind::EmojiSpam
    }

    fn evaluate(
        &self,
        msg: &IncomingMessage,
        config: &AutoModConfig,
        _recent: &[MessageEvent],
    ) -> Option<Violation> {
        let rule = &config.emoji;
        if !rule.enabled {
            return None;
        }

        let custom = CUSTOM_EMOJI_RE.find_iter(&msg.content).count();
        let standard = msg
            .content
            .chars()
            .filter(|c| Self::is_standard_emoji(*c))
            .count();
        let count = custom + standard;
        if count <= rule.max_emojis as usize {
            return None;
        }

        Some(Violation {
            kind: ViolationKind::EmojiSpam,
            reason: "Too many emojis in one message".to_string(),
            details: format!("used {} emojis", count),
            action: rule.action,
            timeout_duration_ms: timeout_for(rule.action, rule.timeout_duration_ms),
            should_delete: rule.delete_message,
            delete_targets: current_message_target(msg),
        })
    }
}

// ============================================================================
// JOIN CHECK (separate pipeline - runs on member joins, not messages)
// ============================================================================

/// Join-burst detection. `recent_join_count` includes the join being
/// processed; the resulting violation targets that newest member, never the
/// earlier joiners.
pub fn check_join_burst(rule: &RaidRule, recent_join_count: usize) -> Option<Violation> {
    if !rule.enabled || recent_join_count <= rule.join_threshold as usize {
        return None;
    }

    Some(Violation {
        kind: ViolationKind::Raid,
        reason: "Join burst detected".to_string(),
        details: format!(
            "{} joins in {} seconds",
            recent_join_count,
            rule.time_window_ms / 1000
        ),
        action: rule.action.into(),
        timeout_duration_ms: None,
        should_delete: false,
        delete_targets: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::automod_models::RaidAction;

    fn message(content: &str) -> IncomingMessage {
        IncomingMessage {
            guild_id: 1,
            channel_id: 2,
            message_id: 3,
            author_id: 4,
            author_is_bot: false,
            author_is_admin: false,
            author_roles: Vec::new(),
            content: content.to_string(),
            mentioned_users: Vec::new(),
            mentioned_roles: Vec::new(),
            attachment_count: 0,
        }
    }

    fn config() -> AutoModConfig {
        let mut config = AutoModConfig::default();
        config.links.enabled = true;
        config.invites.enabled = true;
        config.banned_words.enabled = true;
        config.caps.enabled = true;
        config.emoji.enabled = true;
        config
    }

    #[test]
    fn caps_boundary_is_inclusive() {
        let config = config(); // min_length 10, threshold 70
        // 10 letters, exactly 7 uppercase = exactly 70%
        let msg = message("AAAAAAAbbb");
        let violation = CapsCheck.evaluate(&msg, &config, &[]).unwrap();
        assert_eq!(violation.kind, ViolationKind::ExcessiveCaps);

        // One uppercase fewer is 60% - under the line
        assert!(CapsCheck.evaluate(&message("AAAAAAbbbb"), &config, &[]).is_none());
    }

    #[test]
    fn caps_skips_short_messages() {
        let config = config();
        // 9 chars of pure shouting, still under min_length 10
        assert!(CapsCheck.evaluate(&message("AAAAAAAAA"), &config, &[]).is_none());
    }

    #[test]
    fn caps_skips_letterless_messages() {
        let config = config();
        assert!(CapsCheck.evaluate(&message("1234567890!!"), &config, &[]).is_none());
    }

    #[test]
    fn link_allows_whitelisted_suffix() {
        let mut config = config();
        config.links.allowed_domains = vec!["allowed.com".to_string()];

        assert!(LinkCheck
            .evaluate(&message("see https://sub.allowed.com/page"), &config, &[])
            .is_none());
        assert!(LinkCheck
            .evaluate(&message("see https://allowed.com"), &config, &[])
            .is_none());

        // "notallowed.com" must not pass via a bare suffix match
        let violation = LinkCheck
            .evaluate(&message("see https://notallowed.com"), &config, &[])
            .unwrap();
        assert_eq!(violation.kind, ViolationKind::DisallowedLink);
    }

    #[test]
    fn unparseable_url_fails_closed() {
        let mut config = config();
        config.links.allowed_domains = vec!["allowed.com".to_string()];

        // The permissive scan grabs "http://]" which Url::parse rejects
        let violation = LinkCheck.evaluate(&message("go to http://]"), &config, &[]);
        assert!(violation.is_some());
    }

    #[test]
    fn invite_links_are_flagged() {
        let config = config();
        for content in [
            "join discord.gg/abc123",
            "https://discord.com/invite/abc123",
            "https://discordapp.com/invite/abc123",
        ] {
            let violation = InviteCheck.evaluate(&message(content), &config, &[]).unwrap();
            assert_eq!(violation.kind, ViolationKind::Invite);
        }
        assert!(InviteCheck
            .evaluate(&message("plain https://example.com"), &config, &[])
            .is_none());
    }

    #[test]
    fn banned_words_match_case_insensitively() {
        let mut config = config();
        config.banned_words.words = vec!["Badword".to_string()];

        let violation = BannedWordCheck
            .evaluate(&message("well BADWORD to you"), &config, &[])
            .unwrap();
        assert_eq!(violation.kind, ViolationKind::BannedWord);
        assert!(violation.details.contains("Badword"));
    }

    #[test]
    fn mention_count_is_unique_users_plus_roles() {
        let config = config(); // max_mentions 10
        let mut msg = message("hi");
        // 6 unique users (one repeated) + 5 unique roles = 11 > 10
        msg.mentioned_users = vec![1, 2, 3, 4, 5, 6, 6];
        msg.mentioned_roles = vec![10, 11, 12, 13, 14];

        let violation = MentionCheck.evaluate(&msg, &config, &[]).unwrap();
        assert_eq!(violation.kind, ViolationKind::MassMention);
        assert!(violation.details.contains("11"));

        // Dropping one role lands exactly on the threshold - no violation
        msg.mentioned_roles.pop();
        assert!(MentionCheck.evaluate(&msg, &config, &[]).is_none());
    }

    #[test]
    fn emoji_count_mixes_custom_and_standard() {
        let mut config = config();
        config.emoji.max_emojis = 3;

        let msg = message("😀😀 <:pog:12345> <a:wave:67890>");
        let violation = EmojiCheck.evaluate(&msg, &config, &[]).unwrap();
        assert_eq!(violation.kind, ViolationKind::EmojiSpam);
        assert!(violation.details.contains("4"));

        let under = message("😀 <:pog:12345>");
        assert!(EmojiCheck.evaluate(&under, &config, &[]).is_none());
    }

    #[test]
    fn join_burst_fires_above_threshold_only() {
        let rule = RaidRule {
            enabled: true,
            join_threshold: 10,
            time_window_ms: 10_000,
            action: RaidAction::Ban,
        };

        assert!(check_join_burst(&rule, 10).is_none());
        let violation = check_join_burst(&rule, 11).unwrap();
        assert_eq!(violation.kind, ViolationKind::Raid);
        assert_eq!(violation.action, ActionKind::Ban);
        assert!(!violation.should_delete);
    }
}
