// SPDX-License-Identifier: MIT

//! The form state machine.
//!
//! Owns the begin/advance/cancel transitions and checkpoints every accepted
//! step to the store before reporting success, so an interrupted session
//! can always be resumed from the last accepted input. A step is never
//! considered advanced until its checkpoint write has succeeded.

use std::sync::Arc;

use super::step::Step;
use super::validate::{validate, StepInput, ValidationError};
use crate::leadline::attribution::Attribution;
use crate::leadline::error::LeadlineError;
use crate::leadline::storage::{CompletedSubmission, FormSession, SessionStore, StorageError};

/// Result of an entry event.
#[derive(Debug)]
pub enum BeginOutcome {
    /// A fresh session was created and checkpointed at the first step.
    Started(FormSession),
    /// A live session already existed; its progress and attribution are
    /// untouched.
    Resumed(FormSession),
    /// The user already completed the form.
    AlreadySubmitted,
}

/// Result of feeding one user reply into the machine.
#[derive(Debug)]
pub enum StepOutcome {
    /// Input accepted and checkpointed; the session now waits at `next`.
    Advanced { session: FormSession, next: Step },
    /// Final step accepted; the session was atomically promoted.
    Completed(CompletedSubmission),
    /// Input rejected; nothing changed.
    Rejected {
        step: Step,
        error: ValidationError,
    },
    /// The user has no live session.
    NoSession,
    /// A submission already existed when the final step tried to commit.
    AlreadySubmitted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NoSession,
}

pub struct FormMachine {
    store: Arc<dyn SessionStore>,
    slots: Vec<String>,
}

impl FormMachine {
    pub fn new(store: Arc<dyn SessionStore>, slots: Vec<String>) -> Self {
        Self { store, slots }
    }

    /// Handle an entry event for `user_id`.
    ///
    /// Attribution is bound here, exactly once: a later entry with a
    /// different token finds the existing session and leaves it alone.
    pub async fn begin(
        &self,
        user_id: i64,
        username: Option<String>,
        attribution: Option<Attribution>,
    ) -> Result<BeginOutcome, LeadlineError> {
        if self.store.has_submission(user_id).await? {
            return Ok(BeginOutcome::AlreadySubmitted);
        }
        if let Some(existing) = self.store.get_session(user_id).await? {
            return Ok(BeginOutcome::Resumed(existing));
        }
        let session = FormSession::new(user_id, username, attribution);
        self.store.upsert_session(&session).await?;
        Ok(BeginOutcome::Started(session))
    }

    /// Validate `input` against the user's current step and advance.
    ///
    /// The checkpoint write happens before this returns, so the caller may
    /// emit the next prompt knowing the accepted value is durable. On a
    /// storage failure the transition is rolled back wholesale: the stored
    /// session still shows the previous step and the same input can be
    /// retried.
    pub async fn advance(
        &self,
        user_id: i64,
        input: StepInput,
    ) -> Result<StepOutcome, LeadlineError> {
        let Some(mut session) = self.store.get_session(user_id).await? else {
            return Ok(StepOutcome::NoSession);
        };

        let step = session.current_step;
        let value = match validate(step, &input, &self.slots) {
            Ok(value) => value,
            Err(error) => return Ok(StepOutcome::Rejected { step, error }),
        };

        match step.next() {
            Some(next) => {
                session
                    .collected_fields
                    .insert(step.field_key().to_string(), value);
                session.current_step = next;
                self.store.upsert_session(&session).await?;
                Ok(StepOutcome::Advanced { session, next })
            }
            None => {
                let submission = build_submission(&session, value)?;
                match self.store.complete(&submission).await {
                    Ok(()) => Ok(StepOutcome::Completed(submission)),
                    Err(StorageError::DuplicateSubmission(_)) => {
                        // Should be unreachable through begin(), but restore
                        // the invariant: a submitted user holds no session.
                        self.store.delete_session(user_id).await?;
                        Ok(StepOutcome::AlreadySubmitted)
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Destroy the user's session without completing it.
    pub async fn cancel(&self, user_id: i64) -> Result<CancelOutcome, LeadlineError> {
        if self.store.get_session(user_id).await?.is_none() {
            return Ok(CancelOutcome::NoSession);
        }
        self.store.delete_session(user_id).await?;
        Ok(CancelOutcome::Cancelled)
    }
}

fn build_submission(
    session: &FormSession,
    contact_time: String,
) -> Result<CompletedSubmission, LeadlineError> {
    let field = |key: &str| {
        session.collected_fields.get(key).cloned().ok_or_else(|| {
            LeadlineError::other(format!(
                "session for user {} reached the final step without field '{}'",
                session.user_id, key
            ))
        })
    };
    Ok(CompletedSubmission {
        user_id: session.user_id,
        username: session.username.clone(),
        name: field("name")?,
        country: field("country")?,
        phone: field("phone")?,
        contact_time,
        attribution: session.attribution.clone(),
        completed_at: chrono::Utc::now(),
        processed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leadline::storage::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn machine(store: Arc<dyn SessionStore>) -> FormMachine {
        FormMachine::new(store, vec!["09:00-12:00".to_string(), "18:00-21:00".to_string()])
    }

    fn text(s: &str) -> StepInput {
        StepInput::Text(s.to_string())
    }

    async fn fill_to_contact_time(m: &FormMachine, user_id: i64) {
        m.begin(user_id, None, None).await.unwrap();
        m.advance(user_id, text("Anna")).await.unwrap();
        m.advance(user_id, text("Portugal")).await.unwrap();
        m.advance(user_id, text("+491701234567")).await.unwrap();
    }

    #[tokio::test]
    async fn test_happy_path_to_completion() {
        let store = Arc::new(MemoryStore::new());
        let m = machine(store.clone());

        let BeginOutcome::Started(session) = m.begin(42, Some("anna".into()), None).await.unwrap()
        else {
            panic!("expected a fresh session");
        };
        assert_eq!(session.current_step, Step::Name);

        let StepOutcome::Advanced { session, next } = m.advance(42, text("Anna")).await.unwrap()
        else {
            panic!("name should be accepted");
        };
        assert_eq!(next, Step::Country);
        assert_eq!(session.field("name"), Some("Anna"));

        // Checkpoint is durable before the next prompt.
        let stored = store.get_session(42).await.unwrap().unwrap();
        assert_eq!(stored.current_step, Step::Country);
        assert_eq!(stored.field("name"), Some("Anna"));

        m.advance(42, text("Portugal")).await.unwrap();
        m.advance(42, text("+491701234567")).await.unwrap();

        let StepOutcome::Completed(submission) =
            m.advance(42, text("09:00-12:00")).await.unwrap()
        else {
            panic!("final step should complete");
        };
        assert_eq!(submission.name, "Anna");
        assert_eq!(submission.contact_time, "09:00-12:00");
        assert_eq!(submission.username.as_deref(), Some("anna"));

        // Session gone, submission in place.
        assert!(store.get_session(42).await.unwrap().is_none());
        assert!(store.has_submission(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_input_does_not_mutate() {
        let store = Arc::new(MemoryStore::new());
        let m = machine(store.clone());
        m.begin(42, None, None).await.unwrap();
        m.advance(42, text("Anna")).await.unwrap();

        let StepOutcome::Rejected { step, .. } = m.advance(42, text("123")).await.unwrap() else {
            panic!("digits are not a country");
        };
        assert_eq!(step, Step::Country);

        let stored = store.get_session(42).await.unwrap().unwrap();
        assert_eq!(stored.current_step, Step::Country);
        assert_eq!(stored.collected_fields.len(), 1);
    }

    #[tokio::test]
    async fn test_begin_twice_resumes_and_keeps_attribution() {
        let store = Arc::new(MemoryStore::new());
        let m = machine(store.clone());
        let original = Attribution::Referral { referrer: 9 };
        m.begin(42, None, Some(original.clone())).await.unwrap();
        m.advance(42, text("Anna")).await.unwrap();

        // Re-entry with a different token: original attribution wins.
        let other = Attribution::Buyer {
            code: "buyer_x_y".to_string(),
            click_id: None,
        };
        let BeginOutcome::Resumed(session) = m.begin(42, None, Some(other)).await.unwrap() else {
            panic!("live session must not be reset");
        };
        assert_eq!(session.attribution, Some(original));
        assert_eq!(session.current_step, Step::Country);
        assert_eq!(session.field("name"), Some("Anna"));
    }

    #[tokio::test]
    async fn test_begin_after_completion_rejected() {
        let store = Arc::new(MemoryStore::new());
        let m = machine(store.clone());
        fill_to_contact_time(&m, 42).await;
        m.advance(42, text("09:00-12:00")).await.unwrap();

        assert!(matches!(
            m.begin(42, None, None).await.unwrap(),
            BeginOutcome::AlreadySubmitted
        ));
        // No new session may appear.
        assert!(store.get_session(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_destroys_session() {
        let store = Arc::new(MemoryStore::new());
        let m = machine(store.clone());
        m.begin(42, None, None).await.unwrap();
        m.advance(42, text("Anna")).await.unwrap();

        assert_eq!(m.cancel(42).await.unwrap(), CancelOutcome::Cancelled);
        assert!(store.get_session(42).await.unwrap().is_none());
        assert!(!store.has_submission(42).await.unwrap());
        assert_eq!(m.cancel(42).await.unwrap(), CancelOutcome::NoSession);
    }

    #[tokio::test]
    async fn test_no_session_outcome() {
        let m = machine(Arc::new(MemoryStore::new()));
        assert!(matches!(
            m.advance(42, text("Anna")).await.unwrap(),
            StepOutcome::NoSession
        ));
    }

    /// Store whose upsert can be switched to fail, for rollback tests.
    struct FlakyStore {
        inner: MemoryStore,
        fail_upserts: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn upsert_session(&self, session: &FormSession) -> Result<(), StorageError> {
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("injected".into()));
            }
            self.inner.upsert_session(session).await
        }
        async fn get_session(&self, user_id: i64) -> Result<Option<FormSession>, StorageError> {
            self.inner.get_session(user_id).await
        }
        async fn delete_session(&self, user_id: i64) -> Result<(), StorageError> {
            self.inner.delete_session(user_id).await
        }
        async fn list_stale(
            &self,
            older_than: DateTime<Utc>,
        ) -> Result<Vec<FormSession>, StorageError> {
            self.inner.list_stale(older_than).await
        }
        async fn mark_reminder_sent(&self, user_id: i64) -> Result<(), StorageError> {
            self.inner.mark_reminder_sent(user_id).await
        }
        async fn complete(&self, submission: &CompletedSubmission) -> Result<(), StorageError> {
            self.inner.complete(submission).await
        }
        async fn has_submission(&self, user_id: i64) -> Result<bool, StorageError> {
            self.inner.has_submission(user_id).await
        }
        async fn get_submission(
            &self,
            user_id: i64,
        ) -> Result<Option<CompletedSubmission>, StorageError> {
            self.inner.get_submission(user_id).await
        }
        async fn count_submissions(&self) -> Result<u64, StorageError> {
            self.inner.count_submissions().await
        }
        async fn recent_submissions(
            &self,
            limit: u32,
        ) -> Result<Vec<CompletedSubmission>, StorageError> {
            self.inner.recent_submissions(limit).await
        }
        async fn submissions_by_attribution(
            &self,
        ) -> Result<BTreeMap<String, u64>, StorageError> {
            self.inner.submissions_by_attribution().await
        }
        async fn sessions_by_step(&self) -> Result<Vec<(Step, u64)>, StorageError> {
            self.inner.sessions_by_step().await
        }
        async fn count_stale_unreminded(
            &self,
            older_than: DateTime<Utc>,
        ) -> Result<u64, StorageError> {
            self.inner.count_stale_unreminded(older_than).await
        }
        async fn put_buyer(
            &self,
            buyer: &crate::leadline::storage::Buyer,
        ) -> Result<(), StorageError> {
            self.inner.put_buyer(buyer).await
        }
        async fn buyer_exists(&self, code: &str) -> Result<bool, StorageError> {
            self.inner.buyer_exists(code).await
        }
        async fn list_buyers(
            &self,
        ) -> Result<Vec<crate::leadline::storage::Buyer>, StorageError> {
            self.inner.list_buyers().await
        }
    }

    #[tokio::test]
    async fn test_checkpoint_failure_rolls_back_the_step() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_upserts: AtomicBool::new(false),
        });
        let m = machine(flaky.clone());
        m.begin(42, None, None).await.unwrap();

        flaky.fail_upserts.store(true, Ordering::SeqCst);
        let err = m.advance(42, text("Anna")).await.unwrap_err();
        assert!(err.is_retryable());

        // Stored session still waits at the name step with no fields.
        let stored = flaky.get_session(42).await.unwrap().unwrap();
        assert_eq!(stored.current_step, Step::Name);
        assert!(stored.collected_fields.is_empty());

        // The same input succeeds once the store recovers.
        flaky.fail_upserts.store(false, Ordering::SeqCst);
        assert!(matches!(
            m.advance(42, text("Anna")).await.unwrap(),
            StepOutcome::Advanced {
                next: Step::Country,
                ..
            }
        ));
    }
}
