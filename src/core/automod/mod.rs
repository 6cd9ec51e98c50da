// Core auto-moderation module - detection engine, tracker and service.

pub mod automod_models;
pub mod automod_service;
pub mod checks;
pub mod tracker;

pub use automod_models::*;
pub use automod_service::*;
pub use tracker::SlidingWindowTracker;
