// Sliding-window event tracker - the only mutable shared state in the
// auto-moderation core.
//
// Holds, per (guild, user), the recent messages of that user, and per guild
// the recent joins. Queries re-filter by window on every call; a periodic
// sweep bounds memory with a fixed retention independent of any configured
// detection window (configured windows re-filter live, so a sweep retention
// shorter than a configured window is fine).

use super::automod_models::{JoinEvent, MessageEvent};
use dashmap::DashMap;

/// The sweep drops anything older than this, and the dispatcher runs the
/// sweep on the same 60s cadence.
pub const SWEEP_RETENTION_MS: i64 = 60_000;

/// A composite key for message history.
/// We need both guild_id AND user_id since users can be in multiple guilds.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct GuildUserKey {
    guild_id: u64,
    user_id: u64,
}

/// In-process tracker for recent message and join events.
///
/// Constructed once per process and injected into the service - never a
/// module-level singleton, so tests get isolated instances.
pub struct SlidingWindowTracker {
    messages: DashMap<GuildUserKey, Vec<MessageEvent>>,
    joins: DashMap<u64, Vec<JoinEvent>>,
}

impl SlidingWindowTracker {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            joins: DashMap::new(),
        }
    }

    /// Append a message to the user's history. Always succeeds.
    pub fn record_message(&self, guild_id: u64, user_id: u64, event: MessageEvent) {
        self.messages
            .entry(GuildUserKey { guild_id, user_id })
            .or_insert_with(Vec::new)
            .push(event);
    }

    /// Messages for (guild, user) with `now - timestamp < window`, strict.
    /// Pure query - never mutates state (cleanup is the sweep's job).
    pub fn recent_messages(
        &self,
        guild_id: u64,
        user_id: u64,
        window_ms: u64,
        now_ms: i64,
    ) -> Vec<MessageEvent> {
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        self.messages
            .get(&GuildUserKey { guild_id, user_id })
            .map(|events| {
                events
                    .iter()
                    .filter(|e| now_ms - e.timestamp_ms < window)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop all history for a user. Called after a spam-class violation so
    /// the same burst cannot immediately re-trigger. Idempotent.
    pub fn clear_messages(&self, guild_id: u64, user_id: u64) {
        self.messages.remove(&GuildUserKey { guild_id, user_id });
    }

    pub fn record_join(&self, guild_id: u64, event: JoinEvent) {
        self.joins
            .entry(guild_id)
            .or_insert_with(Vec::new)
            .push(event);
    }

    pub fn recent_joins(&self, guild_id: u64, window_ms: u64, now_ms: i64) -> Vec<JoinEvent> {
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        self.joins
            .get(&guild_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| now_ms - e.timestamp_ms < window)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Expire everything older than the fixed retention and drop entries
    /// that end up empty, so idle users don't leak map slots.
    pub fn sweep(&self, now_ms: i64) {
        self.messages.retain(|_, events| {
            events.retain(|e| now_ms - e.timestamp_ms < SWEEP_RETENTION_MS);
            !events.is_empty()
        });
        self.joins.retain(|_, events| {
            events.retain(|e| now_ms - e.timestamp_ms < SWEEP_RETENTION_MS);
            !events.is_empty()
        });
    }

    /// Number of live message-history entries (test helper).
    #[cfg(test)]
    pub fn message_entry_count(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    pub fn join_entry_count(&self) -> usize {
        self.joins.len()
    }
}

impl Default for SlidingWindowTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str, timestamp_ms: i64) -> MessageEvent {
        MessageEvent {
            content: content.to_string(),
            timestamp_ms,
            channel_id: 1,
            message_id: timestamp_ms as u64,
        }
    }

    #[test]
    fn recent_messages_returns_exact_window_subset() {
        let tracker = SlidingWindowTracker::new();
        // Insert out of order on purpose - the query must not care
        tracker.record_message(1, 2, msg("c", 3_000));
        tracker.record_message(1, 2, msg("a", 0));
        tracker.record_message(1, 2, msg("b", 1_500));

        let recent = tracker.recent_messages(1, 2, 2_000, 3_000);
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "b"]);

        // Boundary is strict: an event exactly window_ms old is excluded
        let recent = tracker.recent_messages(1, 2, 1_500, 3_000);
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["c"]);
    }

    #[test]
    fn recent_messages_is_scoped_to_guild_and_user() {
        let tracker = SlidingWindowTracker::new();
        tracker.record_message(1, 2, msg("mine", 0));
        tracker.record_message(1, 3, msg("other user", 0));
        tracker.record_message(9, 2, msg("other guild", 0));

        let recent = tracker.recent_messages(1, 2, 1_000, 0);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "mine");
    }

    #[test]
    fn query_does_not_mutate_state() {
        let tracker = SlidingWindowTracker::new();
        tracker.record_message(1, 2, msg("old", 0));

        // Way outside any window
        let recent = tracker.recent_messages(1, 2, 1_000, 100_000);
        assert!(recent.is_empty());

        // The stale event is still there until a sweep runs
        let all = tracker.recent_messages(1, 2, u64::MAX, 100_000);
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn sweep_drops_stale_events_and_empty_entries() {
        let tracker = SlidingWindowTracker::new();
        tracker.record_message(1, 2, msg("stale", 0));
        tracker.record_message(1, 3, msg("fresh", 50_000));
        tracker.record_join(1, JoinEvent { member_id: 7, timestamp_ms: 0 });
        tracker.record_join(2, JoinEvent { member_id: 8, timestamp_ms: 55_000 });

        tracker.sweep(60_000);

        // Stale user entry is gone entirely, not left empty
        assert_eq!(tracker.message_entry_count(), 1);
        assert!(tracker.recent_messages(1, 2, u64::MAX, 60_000).is_empty());
        assert_eq!(tracker.recent_messages(1, 3, u64::MAX, 60_000).len(), 1);

        assert_eq!(tracker.join_entry_count(), 1);
        assert_eq!(tracker.recent_joins(2, u64::MAX, 60_000).len(), 1);
    }

    #[test]
    fn sweep_boundary_is_strict() {
        let tracker = SlidingWindowTracker::new();
        tracker.record_message(1, 2, msg("exactly 60s old", 0));
        tracker.sweep(SWEEP_RETENTION_MS);
        assert_eq!(tracker.message_entry_count(), 0);
    }

    #[test]
    fn clear_messages_is_idempotent() {
        let tracker = SlidingWindowTracker::new();
        tracker.record_message(1, 2, msg("hi", 0));

        tracker.clear_messages(1, 2);
        assert!(tracker.recent_messages(1, 2, u64::MAX, 0).is_empty());

        // Second clear is a no-op, not an error
        tracker.clear_messages(1, 2);
        assert!(tracker.recent_messages(1, 2, u64::MAX, 0).is_empty());
    }
}
