// Discord adapters for auto-moderation: dispatcher, action execution,
// audit logging and admin commands.

pub mod actions;
pub mod audit;
pub mod commands;
pub mod events;
