// SPDX-License-Identifier: MIT

//! Update routing.
//!
//! Every incoming event is routed here with the session id passed
//! explicitly into the machine; there is no ambient per-user context.
//! Errors never escape `dispatch`: storage hiccups turn into a try-again
//! prompt for the user, transport hiccups are logged and the poll loop
//! moves on.

use std::sync::Arc;
use tokio::sync::watch;

use crate::botapi::client::BotClient;
use crate::botapi::keyboard::ReplyMarkup;
use crate::botapi::outbound::{Messenger, Notifier};
use crate::botapi::types::{CallbackQuery, Message, OutgoingMessage, Update, User};

use super::attribution::AttributionResolver;
use super::config::Messages;
use super::error::LeadlineError;
use super::form::machine::{BeginOutcome, CancelOutcome, FormMachine, StepOutcome};
use super::form::resume::ResumeController;
use super::form::validate::StepInput;
use super::keyboards::{
    after_submission_keyboard, cancel_keyboard, keyboard_for, plain, start_menu, CANCEL_LABEL,
    CB_BACK_TO_START, CB_CANCEL_APPLICATION, CB_CONTINUE_APPLICATION, CB_START_APPLICATION,
    CB_TIME_PREFIX,
};
use super::storage::SessionStore;

pub struct Dispatcher {
    machine: FormMachine,
    resume: ResumeController,
    attribution: AttributionResolver,
    store: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
    notifier: Arc<dyn Notifier>,
    messages: Arc<Messages>,
    admin_chat_id: Option<i64>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SessionStore>,
        messenger: Arc<dyn Messenger>,
        notifier: Arc<dyn Notifier>,
        messages: Arc<Messages>,
        admin_chat_id: Option<i64>,
    ) -> Self {
        Self {
            machine: FormMachine::new(store.clone(), messages.contact_times.clone()),
            resume: ResumeController::new(store.clone(), messages.clone()),
            attribution: AttributionResolver::new(store.clone()),
            store,
            messenger,
            notifier,
            messages,
            admin_chat_id,
        }
    }

    /// Entry point for the poll loop. Never fails.
    pub async fn dispatch(&self, update: Update) {
        let update_id = update.update_id;
        if let Err(e) = self.route(update).await {
            log::error!("failed to handle update {}: {}", update_id, e);
        }
    }

    async fn route(&self, update: Update) -> Result<(), LeadlineError> {
        if let Some(message) = update.message {
            return self.on_message(message).await;
        }
        if let Some(callback) = update.callback_query {
            return self.on_callback(callback).await;
        }
        Ok(())
    }

    async fn on_message(&self, message: Message) -> Result<(), LeadlineError> {
        let Some(user) = message.from else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        if let Some(contact) = message.contact {
            return self
                .on_step_input(
                    &user,
                    chat_id,
                    StepInput::Contact {
                        phone_number: contact.phone_number,
                    },
                )
                .await;
        }

        let Some(text) = message.text else {
            return Ok(());
        };
        let text = text.trim();

        if text == "/start" {
            return self.on_start(&user, chat_id, "").await;
        }
        if let Some(param) = text.strip_prefix("/start ") {
            return self.on_start(&user, chat_id, param.trim()).await;
        }
        match text {
            "/cancel" | CANCEL_LABEL => self.on_cancel(&user, chat_id).await,
            "/help" => self.say(chat_id, &self.messages.help, None).await,
            "/info" => self.say(chat_id, &self.messages.info, None).await,
            _ => {
                self.on_step_input(&user, chat_id, StepInput::Text(text.to_string()))
                    .await
            }
        }
    }

    async fn on_callback(&self, callback: CallbackQuery) -> Result<(), LeadlineError> {
        let user = callback.from.clone();
        let chat_id = callback
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(user.id);
        let data = callback.data.clone().unwrap_or_default();

        let result = match data.as_str() {
            CB_START_APPLICATION | CB_CONTINUE_APPLICATION => {
                self.on_start(&user, chat_id, "").await
            }
            CB_CANCEL_APPLICATION => self.on_cancel(&user, chat_id).await,
            CB_BACK_TO_START => {
                // Leaving the form from an inline button behaves like cancel,
                // then lands on the entry menu.
                self.machine.cancel(user.id).await.ok();
                self.show_entry_menu(&user, chat_id).await
            }
            "show_info" => self.say(chat_id, &self.messages.info, None).await,
            slot if slot.starts_with(CB_TIME_PREFIX) => {
                let slot = slot[CB_TIME_PREFIX.len()..].to_string();
                self.on_step_input(&user, chat_id, StepInput::Text(slot))
                    .await
            }
            other => {
                log::debug!("ignoring unknown callback: {:?}", other);
                Ok(())
            }
        };

        if let Err(e) = self.messenger.ack_callback(&callback.id, None).await {
            log::warn!("failed to ack callback {}: {}", callback.id, e);
        }
        result
    }

    /// Entry event: `/start`, with an optional deep-link payload, or one of
    /// the apply/continue buttons.
    async fn on_start(&self, user: &User, chat_id: i64, param: &str) -> Result<(), LeadlineError> {
        if self.store.has_submission(user.id).await? {
            return self
                .say(
                    chat_id,
                    &self.messages.already_applied,
                    Some(after_submission_keyboard()),
                )
                .await;
        }

        // Re-entry with a live session resumes it; progress and the original
        // attribution are untouched no matter what token came along.
        match self.resume.resume(user.id).await {
            Ok(Some(ctx)) => {
                let markup = keyboard_for(ctx.step, &self.messages.contact_times);
                return self.say(chat_id, &ctx.prompt, Some(markup)).await;
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("resume lookup for user {} failed: {}", user.id, e);
                return self.say(chat_id, &self.messages.try_again, None).await;
            }
        }

        let param = if param.is_empty() { None } else { Some(param) };
        let attribution = self.attribution.resolve(user.id, param).await;

        match self
            .machine
            .begin(user.id, user.username.clone(), attribution)
            .await
        {
            Ok(BeginOutcome::Started(_)) => {
                let text = format!("{}\n\n{}", self.messages.welcome, self.messages.ask_name);
                self.say(chat_id, &text, Some(cancel_keyboard())).await
            }
            Ok(BeginOutcome::Resumed(session)) => {
                let prompt = self
                    .messages
                    .resume_prompt(session.current_step, session.field("name"));
                let markup = keyboard_for(session.current_step, &self.messages.contact_times);
                self.say(chat_id, &prompt, Some(markup)).await
            }
            Ok(BeginOutcome::AlreadySubmitted) => {
                self.say(
                    chat_id,
                    &self.messages.already_applied,
                    Some(after_submission_keyboard()),
                )
                .await
            }
            Err(e) => {
                log::warn!("begin for user {} failed: {}", user.id, e);
                self.say(chat_id, &self.messages.try_again, None).await
            }
        }
    }

    async fn on_step_input(
        &self,
        user: &User,
        chat_id: i64,
        input: StepInput,
    ) -> Result<(), LeadlineError> {
        match self.machine.advance(user.id, input).await {
            Ok(StepOutcome::Advanced { next, .. }) => {
                let markup = keyboard_for(next, &self.messages.contact_times);
                self.say(chat_id, self.messages.prompt_for(next), Some(markup))
                    .await
            }
            Ok(StepOutcome::Completed(submission)) => {
                self.say(
                    chat_id,
                    &self.messages.success,
                    Some(after_submission_keyboard()),
                )
                .await?;
                if let Some(admin) = self.admin_chat_id {
                    let summary = self.messages.admin_summary(&submission);
                    // Non-fatal: the lead is already stored.
                    if let Err(e) = self.notifier.notify(admin, &summary, None).await {
                        log::warn!("admin notification failed: {}", e);
                    }
                }
                Ok(())
            }
            Ok(StepOutcome::Rejected { step, error }) => {
                log::debug!("rejected input from user {} at {}: {}", user.id, step, error);
                let markup = keyboard_for(step, &self.messages.contact_times);
                self.say(chat_id, self.messages.invalid_for(step), Some(markup))
                    .await
            }
            Ok(StepOutcome::NoSession) => self.show_entry_menu(user, chat_id).await,
            Ok(StepOutcome::AlreadySubmitted) => {
                self.say(
                    chat_id,
                    &self.messages.already_applied,
                    Some(after_submission_keyboard()),
                )
                .await
            }
            Err(e) => {
                log::warn!("step transition for user {} failed: {}", user.id, e);
                self.say(chat_id, &self.messages.try_again, None).await
            }
        }
    }

    async fn on_cancel(&self, user: &User, chat_id: i64) -> Result<(), LeadlineError> {
        match self.machine.cancel(user.id).await {
            Ok(CancelOutcome::Cancelled) => {
                self.say(chat_id, &self.messages.cancelled, Some(plain()))
                    .await
            }
            Ok(CancelOutcome::NoSession) => self.show_entry_menu(user, chat_id).await,
            Err(e) => {
                log::warn!("cancel for user {} failed: {}", user.id, e);
                self.say(chat_id, &self.messages.try_again, None).await
            }
        }
    }

    async fn show_entry_menu(&self, user: &User, chat_id: i64) -> Result<(), LeadlineError> {
        if self.store.has_submission(user.id).await.unwrap_or(false) {
            self.say(
                chat_id,
                &self.messages.already_applied,
                Some(after_submission_keyboard()),
            )
            .await
        } else {
            self.say(chat_id, &self.messages.welcome, Some(start_menu()))
                .await
        }
    }

    async fn say(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<(), LeadlineError> {
        let mut message = OutgoingMessage::new(chat_id, text);
        message.reply_markup = markup;
        self.messenger.send(message).await?;
        Ok(())
    }
}

/// Long-poll loop: pulls update batches and feeds them to the dispatcher
/// until `shutdown` flips.
pub async fn run_polling(
    client: Arc<BotClient>,
    dispatcher: Dispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), LeadlineError> {
    client.delete_webhook(true).await?;
    let mut offset: Option<i64> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                log::info!("poll loop stopped");
                return Ok(());
            }
            batch = client.get_updates(offset, 30) => match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        dispatcher.dispatch(update).await;
                    }
                }
                Err(e) => {
                    log::warn!("getUpdates failed, backing off: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    }
}
