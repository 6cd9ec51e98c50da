// In-memory implementation of ConfigStore.
//
// Used by the core test suite; production wiring uses the SQLite store.
// Same trait, so the service can't tell the difference.

use crate::core::automod::{AutoModConfig, AutoModError, ConfigStore};
use async_trait::async_trait;
use dashmap::DashMap;

pub struct InMemoryConfigStore {
    configs: DashMap<u64, AutoModConfig>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn find_config(&self, guild_id: u64) -> Result<Option<AutoModConfig>, AutoModError> {
        Ok(self.configs.get(&guild_id).map(|c| c.clone()))
    }

    async fn save_config(&self, guild_id: u64, config: AutoModConfig) -> Result<(), AutoModError> {
        self.configs.insert(guild_id, config);
        Ok(())
    }
}
