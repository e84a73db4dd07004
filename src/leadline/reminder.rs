// SPDX-License-Identifier: MIT

//! Idle-session reminder scheduler.
//!
//! A periodic task that owns its own lifecycle, fully decoupled from
//! request handling: it reads only the session store and writes only
//! through the notifier. Runs never overlap — the next sleep starts after
//! the current sweep has finished every dispatch attempt.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::Messages;
use super::error::LeadlineError;
use super::keyboards::continue_keyboard;
use super::storage::SessionStore;
use crate::botapi::outbound::Notifier;

pub struct ReminderScheduler {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    messages: Arc<Messages>,
    interval: Duration,
    stale_after: chrono::Duration,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        messages: Arc<Messages>,
        interval: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            messages,
            interval,
            stale_after: chrono::Duration::from_std(stale_after)
                .unwrap_or_else(|_| chrono::Duration::minutes(30)),
        }
    }

    /// Run the tick loop until `shutdown` flips.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!(
                "reminder scheduler started (every {:?}, stale after {}m)",
                self.interval,
                self.stale_after.num_minutes()
            );
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {
                        match self.run_once().await {
                            Ok(0) => {}
                            Ok(sent) => log::info!("sent {} reminders", sent),
                            Err(e) => log::error!("reminder sweep failed: {}", e),
                        }
                    }
                    _ = shutdown.changed() => {
                        log::info!("reminder scheduler stopped");
                        break;
                    }
                }
            }
        })
    }

    /// One sweep: find stale unreminded sessions, nudge each once.
    ///
    /// A delivery failure for one user is logged and skipped; the session
    /// stays unreminded and the rest of the batch proceeds. Only a store
    /// failure on the initial listing aborts the sweep.
    pub async fn run_once(&self) -> Result<usize, LeadlineError> {
        let cutoff = Utc::now() - self.stale_after;
        let stale = self.store.list_stale(cutoff).await?;
        let mut sent = 0;

        for session in stale {
            let text = self
                .messages
                .reminder(session.current_step, session.field("name"));
            match self
                .notifier
                .notify(session.user_id, &text, Some(continue_keyboard()))
                .await
            {
                Ok(()) => {
                    if let Err(e) = self.store.mark_reminder_sent(session.user_id).await {
                        log::error!(
                            "reminder delivered to {} but not recorded: {}",
                            session.user_id,
                            e
                        );
                    } else {
                        sent += 1;
                    }
                }
                Err(e) => {
                    log::warn!("reminder delivery to {} failed: {}", session.user_id, e);
                }
            }
        }
        Ok(sent)
    }
}
