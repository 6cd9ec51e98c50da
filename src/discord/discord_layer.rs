// Discord layer - commands and event handlers.

#[path = "automod/mod.rs"]
pub mod automod;

// Re-export the framework state types for convenience
pub use automod::commands::{Data, Error};
