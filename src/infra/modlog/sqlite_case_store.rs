// SQLite-backed case store for the moderation ledger.
//
// One table, keyed by the composite case id. Timestamps are stored as
// RFC 3339 text, the case type as its canonical uppercase name.

use crate::core::modlog::{CaseRecord, CaseStore, CaseType, CaseUpdate, ModlogError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteCaseStore {
    pool: Pool<Sqlite>,
}

impl SqliteCaseStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModlogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS modlog_cases (
                id TEXT PRIMARY KEY,
                guild_id INTEGER NOT NULL,
                case_number INTEGER NOT NULL,
                member_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                case_type TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_modlog_cases_guild
                ON modlog_cases(guild_id, case_number);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ModlogError::Storage(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<CaseRecord, ModlogError> {
        let case_type: String = row.get("case_type");
        let case_type: CaseType = case_type.parse().map_err(ModlogError::Storage)?;

        let created_at: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let expires_at: Option<String> = row.get("expires_at");
        let expires_at = expires_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(CaseRecord {
            id: row.get("id"),
            guild_id: row.get::<i64, _>("guild_id") as u64,
            case_number: row.get::<i64, _>("case_number") as u32,
            member_id: row.get::<i64, _>("member_id") as u64,
            moderator_id: row.get::<i64, _>("moderator_id") as u64,
            case_type,
            reason: row.get("reason"),
            created_at,
            expires_at,
        })
    }
}

#[async_trait]
impl CaseStore for SqliteCaseStore {
    async fn case_numbers(&self, guild_id: u64) -> Result<Vec<u32>, ModlogError> {
        let rows = sqlx::query("SELECT case_number FROM modlog_cases WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ModlogError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| row.get::<i64, _>("case_number") as u32)
            .collect())
    }

    async fn insert(&self, record: &CaseRecord) -> Result<(), ModlogError> {
        sqlx::query(
            r#"
            INSERT INTO modlog_cases (
                id, guild_id, case_number, member_id, moderator_id,
                case_type, reason, created_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.guild_id as i64)
        .bind(record.case_number as i64)
        .bind(record.member_id as i64)
        .bind(record.moderator_id as i64)
        .bind(record.case_type.to_string())
        .bind(&record.reason)
        .bind(record.created_at.to_rfc3339())
        .bind(record.expires_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| ModlogError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, case_id: &str) -> Result<Option<CaseRecord>, ModlogError> {
        let row = sqlx::query("SELECT * FROM modlog_cases WHERE id = ?")
            .bind(case_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ModlogError::Storage(e.to_string()))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn fetch_guild(&self, guild_id: u64) -> Result<Vec<CaseRecord>, ModlogError> {
        let rows = sqlx::query(
            "SELECT * FROM modlog_cases WHERE guild_id = ? ORDER BY case_number ASC",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ModlogError::Storage(e.to_string()))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn update(&self, case_id: &str, update: &CaseUpdate) -> Result<(), ModlogError> {
        sqlx::query(
            r#"
            UPDATE modlog_cases SET
                reason = COALESCE(?, reason),
                expires_at = COALESCE(?, expires_at)
            WHERE id = ?
            "#,
        )
        .bind(update.reason.as_deref())
        .bind(update.expires_at.map(|dt| dt.to_rfc3339()))
        .bind(case_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ModlogError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, case_id: &str) -> Result<(), ModlogError> {
        sqlx::query("DELETE FROM modlog_cases WHERE id = ?")
            .bind(case_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ModlogError::Storage(e.to_string()))?;
        Ok(())
    }
}
