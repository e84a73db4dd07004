// SPDX-License-Identifier: MIT

//! Session and submission storage.
//!
//! The store is the single source of truth for in-progress form sessions
//! and completed submissions. Everything above it talks through the
//! [`SessionStore`] trait; implementations must keep the two invariants:
//! at most one session per user (upsert semantics on `user_id`), and a
//! completed submission for a user implies no session for that user.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::leadline::attribution::Attribution;
use crate::leadline::form::step::Step;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable or I/O failed; the same call may be retried.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A completed submission already exists for this user.
    #[error("submission already exists for user {0}")]
    DuplicateSubmission(i64),

    /// A stored record did not decode.
    #[error("corrupt record for user {user_id}: {message}")]
    Corrupt { user_id: i64, message: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

/// One user's in-progress form attempt. At most one exists per `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSession {
    pub user_id: i64,
    pub username: Option<String>,
    pub current_step: Step,
    /// Accepted values keyed by [`Step::field_key`]. Grows monotonically;
    /// only ever holds keys for steps strictly before `current_step`.
    pub collected_fields: BTreeMap<String, String>,
    /// Set once at session creation, immutable afterwards.
    pub attribution: Option<Attribution>,
    pub created_at: DateTime<Utc>,
    pub reminder_sent: bool,
}

impl FormSession {
    pub fn new(user_id: i64, username: Option<String>, attribution: Option<Attribution>) -> Self {
        Self {
            user_id,
            username,
            current_step: Step::Name,
            collected_fields: BTreeMap::new(),
            attribution,
            created_at: Utc::now(),
            reminder_sent: false,
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.collected_fields.get(key).map(String::as_str)
    }
}

/// The final record a session is promoted into, exactly once per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedSubmission {
    pub user_id: i64,
    pub username: Option<String>,
    pub name: String,
    pub country: String,
    pub phone: String,
    pub contact_time: String,
    pub attribution: Option<Attribution>,
    pub completed_at: DateTime<Utc>,
    /// Admin workflow flag; submissions start unprocessed.
    pub processed: bool,
}

/// A registered paid-traffic buyer whose campaign code may appear in
/// start parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub code: String,
    pub name: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create-or-replace the session keyed by `session.user_id`.
    async fn upsert_session(&self, session: &FormSession) -> Result<(), StorageError>;

    async fn get_session(&self, user_id: i64) -> Result<Option<FormSession>, StorageError>;

    async fn delete_session(&self, user_id: i64) -> Result<(), StorageError>;

    /// Sessions created before `older_than` that have not been reminded yet.
    async fn list_stale(&self, older_than: DateTime<Utc>)
        -> Result<Vec<FormSession>, StorageError>;

    async fn mark_reminder_sent(&self, user_id: i64) -> Result<(), StorageError>;

    /// Atomically delete the user's session and insert the submission.
    ///
    /// Fails with [`StorageError::DuplicateSubmission`] when the user has
    /// already completed; in that case the session must be left intact.
    async fn complete(&self, submission: &CompletedSubmission) -> Result<(), StorageError>;

    async fn has_submission(&self, user_id: i64) -> Result<bool, StorageError>;

    async fn get_submission(
        &self,
        user_id: i64,
    ) -> Result<Option<CompletedSubmission>, StorageError>;

    // Read-only analytics queries for the admin surface.

    async fn count_submissions(&self) -> Result<u64, StorageError>;

    async fn recent_submissions(
        &self,
        limit: u32,
    ) -> Result<Vec<CompletedSubmission>, StorageError>;

    /// Submission counts keyed by attribution bucket ("organic",
    /// "referral", "buyer:<code>").
    async fn submissions_by_attribution(&self) -> Result<BTreeMap<String, u64>, StorageError>;

    /// Live-session counts per form step.
    async fn sessions_by_step(&self) -> Result<Vec<(Step, u64)>, StorageError>;

    async fn count_stale_unreminded(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    // Buyer registry.

    async fn put_buyer(&self, buyer: &Buyer) -> Result<(), StorageError>;

    async fn buyer_exists(&self, code: &str) -> Result<bool, StorageError>;

    async fn list_buyers(&self) -> Result<Vec<Buyer>, StorageError>;
}
