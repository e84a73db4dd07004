// SPDX-License-Identifier: MIT

//! SQLite-backed store.
//!
//! Schema is created on connect. Sessions and submissions both key on
//! `user_id` with a primary-key constraint, which is what enforces the
//! one-session-per-user and one-submission-per-user invariants at the
//! storage layer. Completion runs as a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::{Buyer, CompletedSubmission, FormSession, SessionStore, StorageError};
use crate::leadline::attribution::Attribution;
use crate::leadline::form::step::Step;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS form_sessions (
        user_id INTEGER PRIMARY KEY,
        username TEXT,
        current_step TEXT NOT NULL,
        fields_json TEXT NOT NULL,
        attribution_json TEXT,
        created_at TEXT NOT NULL,
        reminder_sent INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS submissions (
        user_id INTEGER PRIMARY KEY,
        username TEXT,
        name TEXT NOT NULL,
        country TEXT NOT NULL,
        phone TEXT NOT NULL,
        contact_time TEXT NOT NULL,
        attribution_json TEXT,
        completed_at TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS buyers (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sessions_reminder
        ON form_sessions (reminder_sent, created_at)",
];

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url` (e.g. `sqlite://leadline.db`), creating
    /// the file and schema when missing.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Unavailable(e.to_string()))
}

fn row_to_session(row: &SqliteRow) -> Result<FormSession, StorageError> {
    let user_id: i64 = row.try_get("user_id")?;
    let corrupt = |message: String| StorageError::Corrupt { user_id, message };

    let step_raw: String = row.try_get("current_step")?;
    let current_step = Step::from_str(&step_raw).map_err(&corrupt)?;

    let fields_json: String = row.try_get("fields_json")?;
    let collected_fields: BTreeMap<String, String> =
        serde_json::from_str(&fields_json).map_err(|e| corrupt(e.to_string()))?;

    let attribution_json: Option<String> = row.try_get("attribution_json")?;
    let attribution: Option<Attribution> = match attribution_json {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?),
        None => None,
    };

    Ok(FormSession {
        user_id,
        username: row.try_get("username")?,
        current_step,
        collected_fields,
        attribution,
        created_at: row.try_get("created_at")?,
        reminder_sent: row.try_get("reminder_sent")?,
    })
}

fn row_to_submission(row: &SqliteRow) -> Result<CompletedSubmission, StorageError> {
    let user_id: i64 = row.try_get("user_id")?;
    let attribution_json: Option<String> = row.try_get("attribution_json")?;
    let attribution: Option<Attribution> = match attribution_json {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            user_id,
            message: e.to_string(),
        })?),
        None => None,
    };

    Ok(CompletedSubmission {
        user_id,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        phone: row.try_get("phone")?,
        contact_time: row.try_get("contact_time")?,
        attribution,
        completed_at: row.try_get("completed_at")?,
        processed: row.try_get("processed")?,
    })
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn upsert_session(&self, session: &FormSession) -> Result<(), StorageError> {
        let attribution_json = session
            .attribution
            .as_ref()
            .map(encode_json)
            .transpose()?;
        sqlx::query(
            "INSERT INTO form_sessions
                (user_id, username, current_step, fields_json, attribution_json,
                 created_at, reminder_sent)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                current_step = excluded.current_step,
                fields_json = excluded.fields_json,
                attribution_json = excluded.attribution_json,
                created_at = excluded.created_at,
                reminder_sent = excluded.reminder_sent",
        )
        .bind(session.user_id)
        .bind(&session.username)
        .bind(session.current_step.as_str())
        .bind(encode_json(&session.collected_fields)?)
        .bind(attribution_json)
        .bind(session.created_at)
        .bind(session.reminder_sent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, user_id: i64) -> Result<Option<FormSession>, StorageError> {
        let row = sqlx::query("SELECT * FROM form_sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn delete_session(&self, user_id: i64) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM form_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_stale(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<FormSession>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM form_sessions
             WHERE reminder_sent = 0 AND created_at < ?
             ORDER BY created_at",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_session).collect()
    }

    async fn mark_reminder_sent(&self, user_id: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE form_sessions SET reminder_sent = 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete(&self, submission: &CompletedSubmission) -> Result<(), StorageError> {
        let attribution_json = submission
            .attribution
            .as_ref()
            .map(encode_json)
            .transpose()?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM form_sessions WHERE user_id = ?")
            .bind(submission.user_id)
            .execute(&mut *tx)
            .await?;
        let inserted = sqlx::query(
            "INSERT INTO submissions
                (user_id, username, name, country, phone, contact_time,
                 attribution_json, completed_at, processed)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.user_id)
        .bind(&submission.username)
        .bind(&submission.name)
        .bind(&submission.country)
        .bind(&submission.phone)
        .bind(&submission.contact_time)
        .bind(attribution_json)
        .bind(submission.completed_at)
        .bind(submission.processed)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            // Dropping the transaction rolls the session delete back, so a
            // duplicate completion leaves the existing state untouched.
            Err(e) => {
                let unique = e
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                if unique {
                    Err(StorageError::DuplicateSubmission(submission.user_id))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn has_submission(&self, user_id: i64) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM submissions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn get_submission(
        &self,
        user_id: i64,
    ) -> Result<Option<CompletedSubmission>, StorageError> {
        let row = sqlx::query("SELECT * FROM submissions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_submission).transpose()
    }

    async fn count_submissions(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM submissions")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn recent_submissions(
        &self,
        limit: u32,
    ) -> Result<Vec<CompletedSubmission>, StorageError> {
        let rows = sqlx::query("SELECT * FROM submissions ORDER BY completed_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_submission).collect()
    }

    async fn submissions_by_attribution(&self) -> Result<BTreeMap<String, u64>, StorageError> {
        // Buckets depend on the decoded attribution value, so aggregation
        // happens here rather than in SQL.
        let rows = sqlx::query("SELECT * FROM submissions")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = BTreeMap::new();
        for row in &rows {
            let submission = row_to_submission(row)?;
            let bucket = submission
                .attribution
                .as_ref()
                .map(|a| a.bucket())
                .unwrap_or_else(|| "organic".to_string());
            *counts.entry(bucket).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn sessions_by_step(&self) -> Result<Vec<(Step, u64)>, StorageError> {
        let rows = sqlx::query(
            "SELECT current_step, COUNT(*) AS n
             FROM form_sessions GROUP BY current_step",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut counts: BTreeMap<Step, u64> = BTreeMap::new();
        for row in &rows {
            let raw: String = row.try_get("current_step")?;
            let n: i64 = row.try_get("n")?;
            match Step::from_str(&raw) {
                Ok(step) => {
                    *counts.entry(step).or_insert(0) += n as u64;
                }
                Err(e) => log::warn!("skipping unknown step in funnel counts: {}", e),
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_stale_unreminded(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM form_sessions
             WHERE reminder_sent = 0 AND created_at < ?",
        )
        .bind(older_than)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn put_buyer(&self, buyer: &Buyer) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO buyers (code, name, source, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                source = excluded.source",
        )
        .bind(&buyer.code)
        .bind(&buyer.name)
        .bind(&buyer.source)
        .bind(buyer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn buyer_exists(&self, code: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM buyers WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_buyers(&self) -> Result<Vec<Buyer>, StorageError> {
        let rows = sqlx::query("SELECT * FROM buyers ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Buyer {
                    code: row.try_get("code")?,
                    name: row.try_get("name")?,
                    source: row.try_get("source")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
