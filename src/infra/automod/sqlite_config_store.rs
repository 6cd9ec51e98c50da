// SQLite-backed config store for per-guild auto-moderation settings.
//
// One row per guild. The config is nested (a rule struct per check), so it
// is stored as a JSON blob instead of a column per field.

use crate::core::automod::{AutoModConfig, AutoModError, ConfigStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteConfigStore {
    pool: Pool<Sqlite>,
}

impl SqliteConfigStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), AutoModError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS automod_config (
                guild_id INTEGER PRIMARY KEY,
                config TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AutoModError::StorageError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn find_config(&self, guild_id: u64) -> Result<Option<AutoModConfig>, AutoModError> {
        let row = sqlx::query("SELECT config FROM automod_config WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AutoModError::StorageError(e.to_string()))?;

        match row {
            Some(row) => {
                let json: String = row.get("config");
                let config = serde_json::from_str(&json)
                    .map_err(|e| AutoModError::StorageError(e.to_string()))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    async fn save_config(&self, guild_id: u64, config: AutoModConfig) -> Result<(), AutoModError> {
        let json = serde_json::to_string(&config)
            .map_err(|e| AutoModError::StorageError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO automod_config (guild_id, config)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                config = excluded.config
            "#,
        )
        .bind(guild_id as i64)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| AutoModError::StorageError(e.to_string()))?;
        Ok(())
    }
}
