// SPDX-License-Identifier: MIT

//! In-memory store.
//!
//! Not durable: everything is lost on restart. Used by the test suite and
//! as an explicit dev mode; production runs on [`super::SqliteStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Buyer, CompletedSubmission, FormSession, SessionStore, StorageError};
use crate::leadline::form::step::Step;

#[derive(Default)]
struct Inner {
    sessions: HashMap<i64, FormSession>,
    submissions: HashMap<i64, CompletedSubmission>,
    buyers: HashMap<String, Buyer>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn upsert_session(&self, session: &FormSession) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(session.user_id, session.clone());
        Ok(())
    }

    async fn get_session(&self, user_id: i64) -> Result<Option<FormSession>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(&user_id).cloned())
    }

    async fn delete_session(&self, user_id: i64) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(&user_id);
        Ok(())
    }

    async fn list_stale(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<FormSession>, StorageError> {
        let inner = self.inner.read().await;
        let mut stale: Vec<FormSession> = inner
            .sessions
            .values()
            .filter(|s| !s.reminder_sent && s.created_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|s| s.created_at);
        Ok(stale)
    }

    async fn mark_reminder_sent(&self, user_id: i64) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if let Some(session) = inner.sessions.get_mut(&user_id) {
            session.reminder_sent = true;
        }
        Ok(())
    }

    async fn complete(&self, submission: &CompletedSubmission) -> Result<(), StorageError> {
        // Single write lock makes delete-plus-insert atomic.
        let mut inner = self.inner.write().await;
        if inner.submissions.contains_key(&submission.user_id) {
            return Err(StorageError::DuplicateSubmission(submission.user_id));
        }
        inner.sessions.remove(&submission.user_id);
        inner
            .submissions
            .insert(submission.user_id, submission.clone());
        Ok(())
    }

    async fn has_submission(&self, user_id: i64) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.submissions.contains_key(&user_id))
    }

    async fn get_submission(
        &self,
        user_id: i64,
    ) -> Result<Option<CompletedSubmission>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.submissions.get(&user_id).cloned())
    }

    async fn count_submissions(&self) -> Result<u64, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.submissions.len() as u64)
    }

    async fn recent_submissions(
        &self,
        limit: u32,
    ) -> Result<Vec<CompletedSubmission>, StorageError> {
        let inner = self.inner.read().await;
        let mut all: Vec<CompletedSubmission> = inner.submissions.values().cloned().collect();
        all.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        all.truncate(limit as usize);
        Ok(all)
    }

    async fn submissions_by_attribution(&self) -> Result<BTreeMap<String, u64>, StorageError> {
        let inner = self.inner.read().await;
        let mut counts = BTreeMap::new();
        for submission in inner.submissions.values() {
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
        let inner = self.inner.read().await;
        let mut counts: BTreeMap<Step, u64> = BTreeMap::new();
        for session in inner.sessions.values() {
            *counts.entry(session.current_step).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_stale_unreminded(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| !s.reminder_sent && s.created_at < older_than)
            .count() as u64)
    }

    async fn put_buyer(&self, buyer: &Buyer) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.buyers.insert(buyer.code.clone(), buyer.clone());
        Ok(())
    }

    async fn buyer_exists(&self, code: &str) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.buyers.contains_key(code))
    }

    async fn list_buyers(&self) -> Result<Vec<Buyer>, StorageError> {
        let inner = self.inner.read().await;
        let mut buyers: Vec<Buyer> = inner.buyers.values().cloned().collect();
        buyers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(buyers)
    }
}
