// Guild config provider - read-through cache over the config store.
//
// `get` never fails a caller on a missing row: an unconfigured guild
// gets the compiled-in defaults. Writes go through `update` so the
// cache and the store never diverge.

use async_trait::async_trait;
use dashmap::DashMap;

use super::config_models::{ConfigError, GuildConfig};

/// Trait for persisting guild configuration documents.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// `None` when the guild has never been configured.
    async fn load(&self, guild_id: u64) -> Result<Option<GuildConfig>, ConfigError>;

    async fn save(&self, guild_id: u64, config: &GuildConfig) -> Result<(), ConfigError>;
}

pub struct ConfigService<S: ConfigStore> {
    store: S,
    cache: DashMap<u64, GuildConfig>,
}

impl<S: ConfigStore> ConfigService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Current config for a guild: cached, else stored, else default.
    pub async fn get(&self, guild_id: u64) -> Result<GuildConfig, ConfigError> {
        if let Some(cached) = self.cache.get(&guild_id) {
            return Ok(cached.clone());
        }

        let config = self
            .store
            .load(guild_id)
            .await?
            .unwrap_or_default();
        self.cache.insert(guild_id, config.clone());
        Ok(config)
    }

    /// Apply a mutation, persist the result and refresh the cache.
    pub async fn update<F>(&self, guild_id: u64, mutate: F) -> Result<GuildConfig, ConfigError>
    where
        F: FnOnce(&mut GuildConfig),
    {
        let mut config = self.get(guild_id).await?;
        mutate(&mut config);
        self.store.save(guild_id, &config).await?;
        self.cache.insert(guild_id, config.clone());
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    pub struct MockConfigStore {
        pub configs: DashMap<u64, GuildConfig>,
        pub loads: AtomicU32,
    }

    #[async_trait]
    impl ConfigStore for MockConfigStore {
        async fn load(&self, guild_id: u64) -> Result<Option<GuildConfig>, ConfigError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.configs.get(&guild_id).map(|c| c.clone()))
        }

        async fn save(&self, guild_id: u64, config: &GuildConfig) -> Result<(), ConfigError> {
            self.configs.insert(guild_id, config.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn unconfigured_guild_gets_defaults() {
        let service = ConfigService::new(MockConfigStore::default());
        let config = service.get(10).await.unwrap();
        assert_eq!(config.locale, "en");
        assert!(!config.automod.module_enabled);
        assert_eq!(config.automod.mute_duration_secs, 600);
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let service = ConfigService::new(MockConfigStore::default());
        service.get(10).await.unwrap();
        service.get(10).await.unwrap();
        assert_eq!(service.store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_persists_and_refreshes_the_cache() {
        let service = ConfigService::new(MockConfigStore::default());

        let updated = service
            .update(10, |c| c.automod.module_enabled = true)
            .await
            .unwrap();
        assert!(updated.automod.module_enabled);

        // Visible through the cache and in the store.
        assert!(service.get(10).await.unwrap().automod.module_enabled);
        let stored = service.store.configs.get(&10).unwrap();
        assert!(stored.automod.module_enabled);
    }
}
