// Auto-moderation slash commands for configuration.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service (load-or-default, mutate, save)
// 3. Format the response
//
// This layer is THIN - no business logic, just translation.

use crate::core::automod::{ActionKind, AutoModService, RaidAction};
use crate::infra::automod::SqliteConfigStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Shared state handed to every command and event handler.
pub struct Data {
    pub automod: Arc<AutoModService<SqliteConfigStore>>,
}

type Context<'a> = poise::Context<'a, Data, Error>;

/// Escalation action choice for slash-command options.
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ActionChoice {
    #[name = "warn"]
    Warn,
    #[name = "timeout"]
    Timeout,
    #[name = "kick"]
    Kick,
    #[name = "ban"]
    Ban,
    #[name = "delete"]
    Delete,
}

impl From<ActionChoice> for ActionKind {
    fn from(choice: ActionChoice) -> Self {
        match choice {
            ActionChoice::Warn => ActionKind::Warn,
            ActionChoice::Timeout => ActionKind::Timeout,
            ActionChoice::Kick => ActionKind::Kick,
            ActionChoice::Ban => ActionKind::Ban,
            ActionChoice::Delete => ActionKind::Delete,
        }
    }
}

/// Raid responses are kick or ban only.
#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum RaidActionChoice {
    #[name = "kick"]
    Kick,
    #[name = "ban"]
    Ban,
}

impl From<RaidActionChoice> for RaidAction {
    fn from(choice: RaidActionChoice) -> Self {
        match choice {
            RaidActionChoice::Kick => RaidAction::Kick,
            RaidActionChoice::Ban => RaidAction::Ban,
        }
    }
}

fn guild_id(ctx: &Context<'_>) -> Result<u64, Error> {
    Ok(ctx.guild_id().ok_or("Must be used in a server")?.get())
}

/// Auto-moderation configuration commands.
#[poise::command(
    slash_command,
    subcommands(
        "status",
        "enable",
        "disable",
        "log_channel",
        "ignore_channel",
        "ignore_role",
        "spam",
        "mentions",
        "links",
        "words",
        "caps",
        "emoji",
        "raid"
    ),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn automod(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - subcommands do the work
    Ok(())
}

/// Show current auto-moderation status and settings.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let config = ctx.data().automod.get_config(guild_id(&ctx)?).await?;

    fn on_off(enabled: bool) -> &'static str {
        if enabled {
            "✅ on"
        } else {
            "❌ off"
        }
    }

    let embed = serenity::CreateEmbed::new()
        .title("🛡️ Auto-Moderation Status")
        .color(if config.enabled { 0x00FF00 } else { 0xFF0000 })
        .field("Enabled", on_off(config.enabled), false)
        .field(
            "Log Channel",
            config
                .log_channel_id
                .map(|id| format!("<#{}>", id))
                .unwrap_or_else(|| "not set".to_string()),
            false,
        )
        .field(
            "Spam",
            format!(
                "{} — {} msgs / {} s → {}",
                on_off(config.spam.enabled),
                config.spam.max_messages,
                config.spam.time_window_ms / 1000,
                config.spam.action
            ),
            true,
        )
        .field(
            "Duplicates",
            format!(
                "{} — {} identical → {}",
                on_off(config.duplicates.enabled),
                config.duplicates.max_duplicates,
                config.duplicates.action
            ),
            true,
        )
        .field(
            "Mentions",
            format!(
                "{} — max {} → {}",
                on_off(config.mentions.enabled),
                config.mentions.max_mentions,
                config.mentions.action
            ),
            true,
        )
        .field(
            "Links",
            format!(
                "{} — {} allowed domains → {}",
                on_off(config.links.enabled),
                config.links.allowed_domains.len(),
                config.links.action
            ),
            true,
        )
        .field(
            "Invites",
            format!("{} → {}", on_off(config.invites.enabled), config.invites.action),
            true,
        )
        .field(
            "Banned Words",
            format!(
                "{} — {} words → {}",
                on_off(config.banned_words.enabled),
                config.banned_words.words.len(),
                config.banned_words.action
            ),
            true,
        )
        .field(
            "Caps",
            format!(
                "{} — ≥{}% over {} chars → {}",
                on_off(config.caps.enabled),
                config.caps.percentage,
                config.caps.min_length,
                config.caps.action
            ),
            true,
        )
        .field(
            "Emoji",
            format!(
                "{} — max {} → {}",
                on_off(config.emoji.enabled),
                config.emoji.max_emojis,
                config.emoji.action
            ),
            true,
        )
        .field(
            "Anti-Raid",
            format!(
                "{} — {} joins / {} s → {:?}",
                on_off(config.raid.enabled),
                config.raid.join_threshold,
                config.raid.time_window_ms / 1000,
                config.raid.action
            ),
            true,
        )
        .field(
            "Ignored",
            format!(
                "{} channels, {} roles",
                config.ignored_channels.len(),
                config.ignored_roles.len()
            ),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Enable auto-moderation.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    ctx.data().automod.set_enabled(guild_id(&ctx)?, true).await?;
    ctx.say("✅ Auto-moderation has been **enabled**.").await?;
    Ok(())
}

/// Disable auto-moderation.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    ctx.data().automod.set_enabled(guild_id(&ctx)?, false).await?;
    ctx.say("❌ Auto-moderation has been **disabled**.").await?;
    Ok(())
}

/// Set (or clear) the audit log channel.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn log_channel(
    ctx: Context<'_>,
    #[description = "Channel for audit log entries (omit to clear)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let channel_id = channel.as_ref().map(|c| c.id.get());
    ctx.data()
        .automod
        .update_config(guild_id(&ctx)?, |config| config.log_channel_id = channel_id)
        .await?;

    match channel_id {
        Some(id) => ctx.say(format!("✅ Audit log channel set to <#{}>.", id)).await?,
        None => ctx.say("✅ Audit logging disabled (no channel set).").await?,
    };
    Ok(())
}

/// Toggle a channel on or off the ignore list.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn ignore_channel(
    ctx: Context<'_>,
    #[description = "Channel to toggle"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let channel_id = channel.id.get();
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            if !config.ignored_channels.remove(&channel_id) {
                config.ignored_channels.insert(channel_id);
            }
        })
        .await?;

    if config.ignored_channels.contains(&channel_id) {
        ctx.say(format!("✅ <#{}> is now ignored by auto-moderation.", channel_id))
            .await?;
    } else {
        ctx.say(format!("✅ <#{}> is no longer ignored.", channel_id))
            .await?;
    }
    Ok(())
}

/// Toggle a role on or off the ignore list.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn ignore_role(
    ctx: Context<'_>,
    #[description = "Role to toggle"] role: serenity::Role,
) -> Result<(), Error> {
    let role_id = role.id.get();
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            if !config.ignored_roles.remove(&role_id) {
                config.ignored_roles.insert(role_id);
            }
        })
        .await?;

    if config.ignored_roles.contains(&role_id) {
        ctx.say(format!("✅ Members with <@&{}> are now ignored.", role_id))
            .await?;
    } else {
        ctx.say(format!("✅ <@&{}> is no longer ignored.", role_id))
            .await?;
    }
    Ok(())
}

/// Configure spam-rate detection.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn spam(
    ctx: Context<'_>,
    #[description = "Turn the check on or off"] enabled: Option<bool>,
    #[description = "Max messages in the window (default: 5)"] max_messages: Option<u32>,
    #[description = "Window in seconds (default: 5)"] window_secs: Option<u64>,
    #[description = "Action to take"] action: Option<ActionChoice>,
    #[description = "Timeout duration in seconds (default: 300)"] timeout_secs: Option<u64>,
    #[description = "Delete the offending messages"] delete: Option<bool>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.spam;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(v) = max_messages {
                rule.max_messages = v;
            }
            if let Some(v) = window_secs {
                rule.time_window_ms = v * 1000;
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
            if let Some(v) = timeout_secs {
                rule.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = delete {
                rule.delete_messages = v;
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Spam rule updated: {} msgs / {} s → {} (delete: {}).",
        config.spam.max_messages,
        config.spam.time_window_ms / 1000,
        config.spam.action,
        config.spam.delete_messages
    ))
    .await?;
    Ok(())
}

/// Configure duplicate-message and mention limits.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn mentions(
    ctx: Context<'_>,
    #[description = "Turn the check on or off"] enabled: Option<bool>,
    #[description = "Max unique mentions per message (default: 10)"] max_mentions: Option<u32>,
    #[description = "Action to take"] action: Option<ActionChoice>,
    #[description = "Timeout duration in seconds"] timeout_secs: Option<u64>,
    #[description = "Delete the offending message"] delete: Option<bool>,
    #[description = "Turn the duplicate check on or off"] duplicates_enabled: Option<bool>,
    #[description = "Max identical messages before duplicate spam (default: 3)"]
    max_duplicates: Option<u32>,
    #[description = "Action for duplicate spam"] duplicates_action: Option<ActionChoice>,
    #[description = "Timeout duration for duplicate spam in seconds"]
    duplicates_timeout_secs: Option<u64>,
    #[description = "Delete the duplicate messages"] duplicates_delete: Option<bool>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.mentions;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(v) = max_mentions {
                rule.max_mentions = v;
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
            if let Some(v) = timeout_secs {
                rule.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = delete {
                rule.delete_message = v;
            }

            let dup = &mut config.duplicates;
            if let Some(v) = duplicates_enabled {
                dup.enabled = v;
            }
            if let Some(v) = max_duplicates {
                dup.max_duplicates = v;
            }
            if let Some(v) = duplicates_action {
                dup.action = v.into();
            }
            if let Some(v) = duplicates_timeout_secs {
                dup.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = duplicates_delete {
                dup.delete_messages = v;
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Mention rule updated: {} — max {} mentions → {}; duplicates {} — limit {} → {}.",
        if config.mentions.enabled { "on" } else { "off" },
        config.mentions.max_mentions,
        config.mentions.action,
        if config.duplicates.enabled { "on" } else { "off" },
        config.duplicates.max_duplicates,
        config.duplicates.action
    ))
    .await?;
    Ok(())
}

/// Configure link filtering and the domain whitelist.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn links(
    ctx: Context<'_>,
    #[description = "Turn the check on or off"] enabled: Option<bool>,
    #[description = "Action to take"] action: Option<ActionChoice>,
    #[description = "Timeout duration in seconds"] timeout_secs: Option<u64>,
    #[description = "Delete the offending message"] delete: Option<bool>,
    #[description = "Domain to add to the whitelist (e.g. example.com)"] allow_domain: Option<String>,
    #[description = "Domain to remove from the whitelist"] forget_domain: Option<String>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.links;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
            if let Some(v) = timeout_secs {
                rule.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = delete {
                rule.delete_message = v;
            }
            if let Some(domain) = &allow_domain {
                let domain = domain.to_lowercase();
                if !rule.allowed_domains.contains(&domain) {
                    rule.allowed_domains.push(domain);
                }
            }
            if let Some(domain) = &forget_domain {
                let domain = domain.to_lowercase();
                rule.allowed_domains.retain(|d| d != &domain);
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Link rule updated: {} — {} allowed domains → {}.",
        if config.links.enabled { "on" } else { "off" },
        config.links.allowed_domains.len(),
        config.links.action
    ))
    .await?;
    Ok(())
}

/// Configure the banned-word list and invite filtering.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn words(
    ctx: Context<'_>,
    #[description = "Turn the banned-word check on or off"] enabled: Option<bool>,
    #[description = "Word to add to the list"] add: Option<String>,
    #[description = "Word to remove from the list"] remove: Option<String>,
    #[description = "Action to take"] action: Option<ActionChoice>,
    #[description = "Timeout duration in seconds"] timeout_secs: Option<u64>,
    #[description = "Delete the offending message"] delete: Option<bool>,
    #[description = "Turn invite-link blocking on or off"] block_invites: Option<bool>,
    #[description = "Action for invite links"] invite_action: Option<ActionChoice>,
    #[description = "Timeout duration for invite links in seconds"]
    invite_timeout_secs: Option<u64>,
    #[description = "Delete messages containing invites"] invite_delete: Option<bool>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.banned_words;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(word) = &add {
                let word = word.to_lowercase();
                if !rule.words.contains(&word) {
                    rule.words.push(word);
                }
            }
            if let Some(word) = &remove {
                let word = word.to_lowercase();
                rule.words.retain(|w| w != &word);
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
            if let Some(v) = timeout_secs {
                rule.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = delete {
                rule.delete_message = v;
            }

            let invites = &mut config.invites;
            if let Some(v) = block_invites {
                invites.enabled = v;
            }
            if let Some(v) = invite_action {
                invites.action = v.into();
            }
            if let Some(v) = invite_timeout_secs {
                invites.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = invite_delete {
                invites.delete_message = v;
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Word rule updated: {} words on the list → {}; invite blocking {}.",
        config.banned_words.words.len(),
        config.banned_words.action,
        if config.invites.enabled { "on" } else { "off" }
    ))
    .await?;
    Ok(())
}

/// Configure the excessive-caps check.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn caps(
    ctx: Context<'_>,
    #[description = "Turn the check on or off"] enabled: Option<bool>,
    #[description = "Minimum message length to check (default: 10)"] min_length: Option<u32>,
    #[description = "Uppercase percentage threshold (default: 70)"] percentage: Option<u32>,
    #[description = "Action to take"] action: Option<ActionChoice>,
    #[description = "Timeout duration in seconds"] timeout_secs: Option<u64>,
    #[description = "Delete the offending message"] delete: Option<bool>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.caps;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(v) = min_length {
                rule.min_length = v;
            }
            if let Some(v) = percentage {
                rule.percentage = v.min(100);
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
            if let Some(v) = timeout_secs {
                rule.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = delete {
                rule.delete_message = v;
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Caps rule updated: ≥{}% uppercase over {} chars → {}.",
        config.caps.percentage, config.caps.min_length, config.caps.action
    ))
    .await?;
    Ok(())
}

/// Configure the emoji-spam check.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn emoji(
    ctx: Context<'_>,
    #[description = "Turn the check on or off"] enabled: Option<bool>,
    #[description = "Max emojis per message (default: 10)"] max_emojis: Option<u32>,
    #[description = "Action to take"] action: Option<ActionChoice>,
    #[description = "Timeout duration in seconds"] timeout_secs: Option<u64>,
    #[description = "Delete the offending message"] delete: Option<bool>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.emoji;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(v) = max_emojis {
                rule.max_emojis = v;
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
            if let Some(v) = timeout_secs {
                rule.timeout_duration_ms = v * 1000;
            }
            if let Some(v) = delete {
                rule.delete_message = v;
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Emoji rule updated: max {} → {}.",
        config.emoji.max_emojis, config.emoji.action
    ))
    .await?;
    Ok(())
}

/// Configure anti-raid join-burst detection.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn raid(
    ctx: Context<'_>,
    #[description = "Turn the check on or off"] enabled: Option<bool>,
    #[description = "Joins in the window before triggering (default: 10)"] join_threshold: Option<u32>,
    #[description = "Window in seconds (default: 10)"] window_secs: Option<u64>,
    #[description = "Action for members joining during a raid"] action: Option<RaidActionChoice>,
) -> Result<(), Error> {
    let config = ctx
        .data()
        .automod
        .update_config(guild_id(&ctx)?, |config| {
            let rule = &mut config.raid;
            if let Some(v) = enabled {
                rule.enabled = v;
            }
            if let Some(v) = join_threshold {
                rule.join_threshold = v;
            }
            if let Some(v) = window_secs {
                rule.time_window_ms = v * 1000;
            }
            if let Some(v) = action {
                rule.action = v.into();
            }
        })
        .await?;

    ctx.say(format!(
        "✅ Anti-raid updated: more than {} joins in {} s → {:?}.",
        config.raid.join_threshold,
        config.raid.time_window_ms / 1000,
        config.raid.action
    ))
    .await?;
    Ok(())
}
