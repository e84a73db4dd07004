// SPDX-License-Identifier: MIT

//! Per-step input validation.
//!
//! Each validator returns the canonical value that gets checkpointed, so
//! trimming and phone normalization happen exactly once.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::step::Step;

// \p{L} keeps the name and country patterns alphabet-agnostic.
static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\s]+$").unwrap());
static COUNTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\s\-]+$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d{10,15}$").unwrap());

/// Why a reply was rejected. Not an error in the `LeadlineError` sense:
/// the machine stays on the same step and re-prompts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must contain only letters and spaces")]
    InvalidName,
    #[error("country must be at least two letters")]
    InvalidCountry,
    #[error("phone must be in international format, e.g. +491701234567")]
    InvalidPhone,
    #[error("contact time must be one of the offered slots")]
    UnknownSlot,
    #[error("this step expects a text reply")]
    ExpectedText,
}

/// A user reply as the dispatcher hands it to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Text(String),
    /// Structured payload from a shared contact; only the phone step takes it.
    Contact { phone_number: String },
}

/// Validate `input` against the rules of `step` and return the canonical
/// value to store. `slots` is the configured contact-time vocabulary.
pub fn validate(step: Step, input: &StepInput, slots: &[String]) -> Result<String, ValidationError> {
    match step {
        Step::Name => {
            let text = expect_text(input)?.trim();
            if text.is_empty() || !NAME_RE.is_match(text) {
                return Err(ValidationError::InvalidName);
            }
            Ok(text.to_string())
        }
        Step::Country => {
            let text = expect_text(input)?.trim();
            if text.chars().count() < 2 || !COUNTRY_RE.is_match(text) {
                return Err(ValidationError::InvalidCountry);
            }
            Ok(text.to_string())
        }
        Step::Phone => match input {
            // A shared contact is trusted as-is, normalized to a + prefix.
            StepInput::Contact { phone_number } => {
                let phone = phone_number.trim();
                if phone.starts_with('+') {
                    Ok(phone.to_string())
                } else {
                    Ok(format!("+{}", phone))
                }
            }
            StepInput::Text(text) => {
                let phone = text.trim();
                if !PHONE_RE.is_match(phone) {
                    return Err(ValidationError::InvalidPhone);
                }
                Ok(phone.to_string())
            }
        },
        Step::ContactTime => {
            let text = expect_text(input)?.trim();
            if !slots.iter().any(|slot| slot == text) {
                return Err(ValidationError::UnknownSlot);
            }
            Ok(text.to_string())
        }
    }
}

fn expect_text(input: &StepInput) -> Result<&str, ValidationError> {
    match input {
        StepInput::Text(text) => Ok(text),
        StepInput::Contact { .. } => Err(ValidationError::ExpectedText),
    }
}
