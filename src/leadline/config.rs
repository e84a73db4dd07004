// SPDX-License-Identifier: MIT

//! Runtime configuration and the user-facing copy deck.
//!
//! `Config` is assembled from the environment; `Messages` carries every
//! user-visible string and can be overridden from a YAML file so copy
//! changes never require a rebuild.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::LeadlineError;
use super::form::step::Step;
use super::storage::CompletedSubmission;

const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 300;
const DEFAULT_STALE_AFTER_SECS: u64 = 1800;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    /// Chat that receives a summary of every completed submission.
    pub admin_chat_id: Option<i64>,
    pub reminder_interval: Duration,
    pub stale_after: Duration,
    pub messages_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, LeadlineError> {
        let bot_token = env::var("BOT_TOKEN")
            .map_err(|_| LeadlineError::config("BOT_TOKEN must be set"))?;
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://leadline.db".to_string());
        let admin_chat_id = match env::var("ADMIN_CHAT_ID") {
            Ok(raw) => Some(raw.parse::<i64>().map_err(|_| {
                LeadlineError::config("ADMIN_CHAT_ID must be a numeric chat id")
            })?),
            Err(_) => None,
        };

        Ok(Self {
            bot_token,
            database_url,
            admin_chat_id,
            reminder_interval: Duration::from_secs(env_secs(
                "REMINDER_INTERVAL_SECS",
                DEFAULT_REMINDER_INTERVAL_SECS,
            )?),
            stale_after: Duration::from_secs(env_secs(
                "STALE_AFTER_SECS",
                DEFAULT_STALE_AFTER_SECS,
            )?),
            messages_path: env::var("MESSAGES_FILE").ok().map(PathBuf::from),
        })
    }
}

fn env_secs(key: &str, default: u64) -> Result<u64, LeadlineError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| LeadlineError::config(format!("{} must be a number of seconds", key))),
        Err(_) => Ok(default),
    }
}

/// Every user-visible string plus the contact-time vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub welcome: String,
    pub already_applied: String,
    pub ask_name: String,
    pub invalid_name: String,
    pub ask_country: String,
    pub invalid_country: String,
    pub ask_phone: String,
    pub invalid_phone: String,
    pub ask_time: String,
    pub invalid_time: String,
    pub success: String,
    pub cancelled: String,
    pub try_again: String,
    pub help: String,
    pub info: String,
    /// `{name}` is replaced with the collected name.
    pub resume_greeting: String,
    pub resume_greeting_anon: String,
    pub reminder_name: String,
    pub reminder_country: String,
    pub reminder_phone: String,
    pub reminder_time: String,
    pub admin_notification: String,
    pub contact_times: Vec<String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            welcome: "👋 Welcome! We'll get you set up in four quick steps.".into(),
            already_applied: "✅ You have already applied — our manager will be in touch.".into(),
            ask_name: "What's your name?".into(),
            invalid_name: "Please use letters and spaces only. What's your name?".into(),
            ask_country: "Which country are you in?".into(),
            invalid_country: "That doesn't look like a country name. Which country are you in?"
                .into(),
            ask_phone: "Share your phone number with the button below, or type it in \
                        international format, e.g. +491701234567."
                .into(),
            invalid_phone: "Please send the number in international format, e.g. +491701234567."
                .into(),
            ask_time: "When is a good time for our call?".into(),
            invalid_time: "Please pick one of the offered time slots.".into(),
            success: "🎉 All done! We'll call you at the time you picked.".into(),
            cancelled: "Application cancelled. Send /start whenever you're ready.".into(),
            try_again: "Something went wrong on our side. Please send that again.".into(),
            help: "Commands:\n/start — begin or continue your application\n/cancel — discard \
                   your application\n/info — about us"
                .into(),
            info: "We connect you with a personal consultant. Apply via /start.".into(),
            resume_greeting: "{name}, welcome back! Let's pick up where you left off.".into(),
            resume_greeting_anon: "Welcome back! Let's pick up where you left off.".into(),
            reminder_name: "🔔 Your application is waiting — it only takes a minute to finish."
                .into(),
            reminder_country: "🔔 {name}, you're almost there! Just three quick steps left."
                .into(),
            reminder_phone: "🔔 {name}, only your phone number is missing.".into(),
            reminder_time: "🔔 {name}, last step: pick a time for our call.".into(),
            admin_notification: "📬 New lead: {name} ({country}), {phone}, prefers {contact_time}."
                .into(),
            contact_times: vec![
                "09:00-12:00".into(),
                "12:00-15:00".into(),
                "15:00-18:00".into(),
                "18:00-21:00".into(),
            ],
        }
    }
}

impl Messages {
    /// Load a deck from a YAML file. Missing keys fall back to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LeadlineError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, LeadlineError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn prompt_for(&self, step: Step) -> &str {
        match step {
            Step::Name => &self.ask_name,
            Step::Country => &self.ask_country,
            Step::Phone => &self.ask_phone,
            Step::ContactTime => &self.ask_time,
        }
    }

    pub fn invalid_for(&self, step: Step) -> &str {
        match step {
            Step::Name => &self.invalid_name,
            Step::Country => &self.invalid_country,
            Step::Phone => &self.invalid_phone,
            Step::ContactTime => &self.invalid_time,
        }
    }

    /// Re-entry prompt: a greeting (personalized when the name is already
    /// known) followed by the current step's question.
    pub fn resume_prompt(&self, step: Step, name: Option<&str>) -> String {
        let greeting = match name {
            Some(name) => self.resume_greeting.replace("{name}", name),
            None => self.resume_greeting_anon.clone(),
        };
        format!("{}\n\n{}", greeting, self.prompt_for(step))
    }

    /// Step-aware nudge for stale sessions.
    pub fn reminder(&self, step: Step, name: Option<&str>) -> String {
        let template = match step {
            Step::Name => &self.reminder_name,
            Step::Country => &self.reminder_country,
            Step::Phone => &self.reminder_phone,
            Step::ContactTime => &self.reminder_time,
        };
        template.replace("{name}", name.unwrap_or("there"))
    }

    pub fn admin_summary(&self, submission: &CompletedSubmission) -> String {
        self.admin_notification
            .replace("{name}", &submission.name)
            .replace("{country}", &submission.country)
            .replace("{phone}", &submission.phone)
            .replace("{contact_time}", &submission.contact_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deck_has_four_slots() {
        let messages = Messages::default();
        assert_eq!(messages.contact_times.len(), 4);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = "welcome: \"hi\"\ncontact_times: [\"morning\", \"evening\"]\n";
        let messages: Messages = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(messages.welcome, "hi");
        assert_eq!(messages.contact_times, vec!["morning", "evening"]);
        assert_eq!(messages.ask_name, Messages::default().ask_name);
    }

    #[test]
    fn test_resume_prompt_uses_known_name() {
        let messages = Messages::default();
        let prompt = messages.resume_prompt(Step::Phone, Some("Anna"));
        assert!(prompt.contains("Anna"));
        assert!(prompt.ends_with(messages.prompt_for(Step::Phone)));

        let anon = messages.resume_prompt(Step::Name, None);
        assert!(!anon.contains("{name}"));
    }

    #[test]
    fn test_reminder_is_step_specific() {
        let messages = Messages::default();
        let country = messages.reminder(Step::Country, Some("Anna"));
        let phone = messages.reminder(Step::Phone, Some("Anna"));
        assert_ne!(country, phone);
        assert!(country.contains("Anna"));
        // Name step fires before any name is collected.
        assert!(!messages.reminder(Step::Name, None).contains("{name}"));
    }
}
