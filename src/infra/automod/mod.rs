// Infra implementations of the auto-moderation ConfigStore port.

pub mod in_memory;
pub mod sqlite_config_store;

pub use in_memory::InMemoryConfigStore;
pub use sqlite_config_store::SqliteConfigStore;
