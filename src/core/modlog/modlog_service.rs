// Moderation case ledger - assigns per-guild case numbers, persists case
// records and hydrates them for display.
//
// Case numbers are computed as max(existing) + 1 under a per-guild async
// mutex: the storage read-then-write itself is not atomic, so allocation
// for one guild must be serialized here.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::modlog_models::{
    case_id, CaseRecord, CaseUpdate, Modlog, ModlogError, NewCase, ResolvedUser,
};

// ============================================================================
// STORAGE / LOOKUP TRAITS (PORTS)
// ============================================================================

/// Trait for persisting case records, keyed by `"<guild>-<number>"`.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Case numbers of all live cases in a guild.
    async fn case_numbers(&self, guild_id: u64) -> Result<Vec<u32>, ModlogError>;

    async fn insert(&self, record: &CaseRecord) -> Result<(), ModlogError>;

    async fn fetch(&self, case_id: &str) -> Result<Option<CaseRecord>, ModlogError>;

    async fn fetch_guild(&self, guild_id: u64) -> Result<Vec<CaseRecord>, ModlogError>;

    async fn update(&self, case_id: &str, update: &CaseUpdate) -> Result<(), ModlogError>;

    async fn delete(&self, case_id: &str) -> Result<(), ModlogError>;
}

/// Entity resolution for hydrating case records.
#[async_trait]
pub trait Directory: Send + Sync {
    /// `None` when the guild is not known to the running process.
    async fn guild_name(&self, guild_id: u64) -> Option<String>;

    /// Cache-first user lookup with a remote fallback inside the
    /// implementation; `None` when the id cannot be resolved at all.
    async fn resolve_user(&self, user_id: u64) -> Option<ResolvedUser>;
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct ModlogService<S: CaseStore, D: Directory> {
    store: S,
    directory: D,
    guild_locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl<S: CaseStore, D: Directory> ModlogService<S, D> {
    pub fn new(store: S, directory: D) -> Self {
        Self {
            store,
            directory,
            guild_locks: DashMap::new(),
        }
    }

    /// Create a case: allocate the next case number for the guild,
    /// persist the record and return it hydrated.
    pub async fn create(&self, new: NewCase) -> Result<Modlog, ModlogError> {
        let lock = self
            .guild_locks
            .entry(new.guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let case_number = self
            .store
            .case_numbers(new.guild_id)
            .await?
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1;

        let record = CaseRecord {
            id: case_id(new.guild_id, case_number),
            guild_id: new.guild_id,
            case_number,
            member_id: new.member_id,
            moderator_id: new.moderator_id,
            case_type: new.case_type,
            reason: new.reason,
            created_at: Utc::now(),
            expires_at: new.expires_at,
        };
        self.store.insert(&record).await?;

        self.hydrate(record).await
    }

    pub async fn get(&self, case_id: &str) -> Result<Modlog, ModlogError> {
        let record = self
            .store
            .fetch(case_id)
            .await?
            .ok_or_else(|| ModlogError::CaseNotFound(case_id.to_string()))?;
        self.hydrate(record).await
    }

    pub async fn cases(&self, guild_id: u64) -> Result<Vec<CaseRecord>, ModlogError> {
        self.store.fetch_guild(guild_id).await
    }

    /// Apply a partial update and return the re-hydrated case.
    pub async fn update(&self, case_id: &str, update: CaseUpdate) -> Result<Modlog, ModlogError> {
        // Existence check first so an update of a missing case is a
        // CaseNotFound, not a silent no-op.
        let _ = self
            .store
            .fetch(case_id)
            .await?
            .ok_or_else(|| ModlogError::CaseNotFound(case_id.to_string()))?;

        self.store.update(case_id, &update).await?;
        let record = self
            .store
            .fetch(case_id)
            .await?
            .ok_or_else(|| ModlogError::CaseNotFound(case_id.to_string()))?;
        self.hydrate(record).await
    }

    /// Remove a case (the rollback path) and return the hydrated
    /// snapshot of what was deleted.
    pub async fn delete(&self, case_id: &str) -> Result<Modlog, ModlogError> {
        let record = self
            .store
            .fetch(case_id)
            .await?
            .ok_or_else(|| ModlogError::CaseNotFound(case_id.to_string()))?;
        self.store.delete(case_id).await?;
        self.hydrate(record).await
    }

    async fn hydrate(&self, record: CaseRecord) -> Result<Modlog, ModlogError> {
        let guild_name = self
            .directory
            .guild_name(record.guild_id)
            .await
            .ok_or(ModlogError::EntityNotFound("guild", record.guild_id))?;
        let moderator = self
            .directory
            .resolve_user(record.moderator_id)
            .await
            .ok_or(ModlogError::EntityNotFound("user", record.moderator_id))?;
        let member = self
            .directory
            .resolve_user(record.member_id)
            .await
            .ok_or(ModlogError::EntityNotFound("user", record.member_id))?;

        Ok(Modlog {
            record,
            guild_name,
            member,
            moderator,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::super::modlog_models::CaseType;
    use super::*;
    use dashmap::DashMap;
    use std::collections::HashSet;

    /// In-memory case store for testing.
    #[derive(Default)]
    pub struct MockCaseStore {
        pub cases: DashMap<String, CaseRecord>,
    }

    #[async_trait]
    impl CaseStore for MockCaseStore {
        async fn case_numbers(&self, guild_id: u64) -> Result<Vec<u32>, ModlogError> {
            Ok(self
                .cases
                .iter()
                .filter(|r| r.guild_id == guild_id)
                .map(|r| r.case_number)
                .collect())
        }

        async fn insert(&self, record: &CaseRecord) -> Result<(), ModlogError> {
            self.cases.insert(record.id.clone(), record.clone());
            Ok(())
        }

        async fn fetch(&self, case_id: &str) -> Result<Option<CaseRecord>, ModlogError> {
            Ok(self.cases.get(case_id).map(|r| r.clone()))
        }

        async fn fetch_guild(&self, guild_id: u64) -> Result<Vec<CaseRecord>, ModlogError> {
            let mut records: Vec<CaseRecord> = self
                .cases
                .iter()
                .filter(|r| r.guild_id == guild_id)
                .map(|r| r.clone())
                .collect();
            records.sort_by_key(|r| r.case_number);
            Ok(records)
        }

        async fn update(&self, case_id: &str, update: &CaseUpdate) -> Result<(), ModlogError> {
            if let Some(mut record) = self.cases.get_mut(case_id) {
                if let Some(reason) = &update.reason {
                    record.reason = reason.clone();
                }
                if let Some(expires_at) = update.expires_at {
                    record.expires_at = Some(expires_at);
                }
            }
            Ok(())
        }

        async fn delete(&self, case_id: &str) -> Result<(), ModlogError> {
            self.cases.remove(case_id);
            Ok(())
        }
    }

    /// Directory that knows one guild and resolves every user.
    pub struct MockDirectory {
        pub known_guild: u64,
    }

    #[async_trait]
    impl Directory for MockDirectory {
        async fn guild_name(&self, guild_id: u64) -> Option<String> {
            (guild_id == self.known_guild).then(|| "Test Guild".to_string())
        }

        async fn resolve_user(&self, user_id: u64) -> Option<ResolvedUser> {
            Some(ResolvedUser {
                id: user_id,
                tag: format!("user#{user_id}"),
            })
        }
    }

    pub fn new_case(guild_id: u64) -> NewCase {
        NewCase {
            guild_id,
            member_id: 30,
            moderator_id: 40,
            case_type: CaseType::Warn,
            reason: "testing".to_string(),
            expires_at: None,
        }
    }

    fn service() -> ModlogService<MockCaseStore, MockDirectory> {
        ModlogService::new(MockCaseStore::default(), MockDirectory { known_guild: 10 })
    }

    #[tokio::test]
    async fn sequential_creates_number_densely_from_one() {
        let service = service();
        for expected in 1..=5u32 {
            let case = service.create(new_case(10)).await.unwrap();
            assert_eq!(case.record.case_number, expected);
            assert_eq!(case.record.id, format!("10-{expected}"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_never_duplicate_numbers() {
        let service = Arc::new(service());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.create(new_case(10)).await.unwrap().record.case_number
            }));
        }

        let mut numbers = HashSet::new();
        for handle in handles {
            assert!(numbers.insert(handle.await.unwrap()));
        }
        assert_eq!(numbers.len(), 10);
        assert_eq!(numbers.iter().max(), Some(&10));
    }

    #[tokio::test]
    async fn guilds_number_independently() {
        let directory = MockDirectory { known_guild: 10 };
        let service = ModlogService::new(MockCaseStore::default(), directory);
        service.create(new_case(10)).await.unwrap();
        let second = service.create(new_case(10)).await.unwrap();
        assert_eq!(second.record.case_number, 2);

        // Unknown guild fails hydration even though the number allocates.
        let err = service.create(new_case(99)).await.unwrap_err();
        assert!(matches!(err, ModlogError::EntityNotFound("guild", 99)));
    }

    #[tokio::test]
    async fn update_changes_reason_and_rehydrates() {
        let service = service();
        let case = service.create(new_case(10)).await.unwrap();

        let updated = service
            .update(
                &case.record.id,
                CaseUpdate {
                    reason: Some("updated reason".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.record.reason, "updated reason");
        assert_eq!(updated.guild_name, "Test Guild");

        let err = service
            .update("10-999", CaseUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModlogError::CaseNotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_record_and_returns_the_snapshot() {
        let service = service();
        let case = service.create(new_case(10)).await.unwrap();

        let deleted = service.delete(&case.record.id).await.unwrap();
        assert_eq!(deleted.record.id, case.record.id);

        let err = service.get(&case.record.id).await.unwrap_err();
        assert!(matches!(err, ModlogError::CaseNotFound(_)));

        // A rolled-back number is freed: allocation takes max+1 of live rows.
        let next = service.create(new_case(10)).await.unwrap();
        assert_eq!(next.record.case_number, 1);
    }
}
