// SPDX-License-Identifier: MIT

//! Rehydrates in-flight form context from a checkpointed session.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::step::Step;
use crate::leadline::config::Messages;
use crate::leadline::error::LeadlineError;
use crate::leadline::storage::SessionStore;

/// Everything needed to re-enter the form at the checkpointed step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeContext {
    pub step: Step,
    pub fields: BTreeMap<String, String>,
    pub prompt: String,
}

pub struct ResumeController {
    store: Arc<dyn SessionStore>,
    messages: Arc<Messages>,
}

impl ResumeController {
    pub fn new(store: Arc<dyn SessionStore>, messages: Arc<Messages>) -> Self {
        Self { store, messages }
    }

    /// Look up the user's session and build a re-entry prompt for it.
    ///
    /// Purely a read: calling this any number of times returns the same
    /// context and never moves the session. `Ok(None)` means there is
    /// nothing to resume (benign, start fresh); a store failure is returned
    /// as a retryable error so callers never mistake an outage for an
    /// absent session.
    pub async fn resume(&self, user_id: i64) -> Result<Option<ResumeContext>, LeadlineError> {
        let Some(session) = self.store.get_session(user_id).await? else {
            return Ok(None);
        };
        let prompt = self
            .messages
            .resume_prompt(session.current_step, session.field("name"));
        Ok(Some(ResumeContext {
            step: session.current_step,
            fields: session.collected_fields,
            prompt,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leadline::form::machine::FormMachine;
    use crate::leadline::form::validate::StepInput;
    use crate::leadline::storage::MemoryStore;

    async fn controller_with_progress() -> (ResumeController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let messages = Arc::new(Messages::default());
        let machine = FormMachine::new(store.clone(), messages.contact_times.clone());
        machine.begin(42, None, None).await.unwrap();
        machine
            .advance(42, StepInput::Text("Anna".into()))
            .await
            .unwrap();
        machine
            .advance(42, StepInput::Text("Portugal".into()))
            .await
            .unwrap();
        (ResumeController::new(store.clone(), messages), store)
    }

    #[tokio::test]
    async fn test_resume_returns_checkpointed_step_and_name() {
        let (controller, _store) = controller_with_progress().await;
        let ctx = controller.resume(42).await.unwrap().unwrap();
        assert_eq!(ctx.step, Step::Phone);
        assert_eq!(ctx.fields.get("name").map(String::as_str), Some("Anna"));
        assert!(ctx.prompt.contains("Anna"));
    }

    #[tokio::test]
    async fn test_resume_is_idempotent() {
        let (controller, store) = controller_with_progress().await;
        let first = controller.resume(42).await.unwrap().unwrap();
        let second = controller.resume(42).await.unwrap().unwrap();
        assert_eq!(first, second);

        // The session itself is untouched.
        let session = store.get_session(42).await.unwrap().unwrap();
        assert_eq!(session.current_step, Step::Phone);
        assert_eq!(session.collected_fields.len(), 2);
    }

    #[tokio::test]
    async fn test_no_session_is_benign() {
        let controller =
            ResumeController::new(Arc::new(MemoryStore::new()), Arc::new(Messages::default()));
        assert!(controller.resume(7).await.unwrap().is_none());
    }
}
