// SQLite-backed guild config store.
//
// The whole config document is stored as one JSON blob per guild.
// Serde fills in defaults for fields added after a row was written, so
// config schema growth never needs a migration.

use crate::core::config::{ConfigError, ConfigStore, GuildConfig};
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
    pub async fn migrate(&self) -> Result<(), ConfigError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_configs (
                guild_id INTEGER PRIMARY KEY,
                config TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn load(&self, guild_id: u64) -> Result<Option<GuildConfig>, ConfigError> {
        let row = sqlx::query("SELECT config FROM guild_configs WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ConfigError::Storage(e.to_string()))?;

        row.map(|row| {
            let json: String = row.get("config");
            serde_json::from_str(&json).map_err(|e| ConfigError::Storage(e.to_string()))
        })
        .transpose()
    }

    async fn save(&self, guild_id: u64, config: &GuildConfig) -> Result<(), ConfigError> {
        let json =
            serde_json::to_string(config).map_err(|e| ConfigError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO guild_configs (guild_id, config)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                config = excluded.config
            "#,
        )
        .bind(guild_id as i64)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| ConfigError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::automod::Action;

    async fn store() -> (SqliteConfigStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.db");
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap();
        let store = SqliteConfigStore::new(pool);
        store.migrate().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn missing_guild_loads_as_none() {
        let (store, _dir) = store().await;
        assert!(store.load(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_and_load_round_trips() {
        let (store, _dir) = store().await;

        let mut config = GuildConfig::default();
        config.automod.module_enabled = true;
        config.automod.spam.action = Action::Kick;
        config.automod.badwords_blocked = vec!["heck".to_string()];
        store.save(10, &config).await.unwrap();

        let loaded = store.load(10).await.unwrap().unwrap();
        assert!(loaded.automod.module_enabled);
        assert_eq!(loaded.automod.spam.action, Action::Kick);
        assert_eq!(loaded.automod.badwords_blocked, vec!["heck".to_string()]);
    }

    #[tokio::test]
    async fn save_overwrites_the_existing_document() {
        let (store, _dir) = store().await;

        let mut config = GuildConfig::default();
        config.automod.module_enabled = true;
        store.save(10, &config).await.unwrap();

        config.automod.module_enabled = false;
        store.save(10, &config).await.unwrap();

        let loaded = store.load(10).await.unwrap().unwrap();
        assert!(!loaded.automod.module_enabled);
    }
}
