// SPDX-License-Identifier: MIT

//! Application keyboard layouts.

use crate::botapi::keyboard::{
    remove_keyboard, InlineKeyboardBuilder, InlineKeyboardButton, KeyboardButton, ReplyKeyboardBuilder,
    ReplyMarkup,
};
use crate::leadline::form::step::Step;

/// Reply-keyboard label that doubles as a cancel command; the dispatcher
/// matches incoming text against it.
pub const CANCEL_LABEL: &str = "❌ Cancel";

pub const CB_START_APPLICATION: &str = "start_application";
pub const CB_CONTINUE_APPLICATION: &str = "continue_application";
pub const CB_CANCEL_APPLICATION: &str = "cancel_application";
pub const CB_BACK_TO_START: &str = "back_to_start";
pub const CB_TIME_PREFIX: &str = "time:";

/// Entry menu shown on /start before a session exists.
pub fn start_menu() -> ReplyMarkup {
    InlineKeyboardBuilder::new()
        .row(vec![InlineKeyboardButton::callback(
            "🚀 Apply now",
            CB_START_APPLICATION,
        )])
        .row(vec![InlineKeyboardButton::callback("ℹ️ About us", "show_info")])
        .build()
}

/// Phone step: share-contact button plus cancel.
pub fn phone_keyboard() -> ReplyMarkup {
    ReplyKeyboardBuilder::new()
        .row(vec![KeyboardButton::contact("📱 Share my phone number")])
        .row(vec![KeyboardButton::text(CANCEL_LABEL)])
        .build()
}

/// Text steps: a cancel button only.
pub fn cancel_keyboard() -> ReplyMarkup {
    ReplyKeyboardBuilder::new()
        .row(vec![KeyboardButton::text(CANCEL_LABEL)])
        .build()
}

/// Contact-time step: one button per configured slot plus cancel.
pub fn contact_time_keyboard(slots: &[String]) -> ReplyMarkup {
    let mut builder = InlineKeyboardBuilder::new();
    for slot in slots {
        builder = builder.row(vec![InlineKeyboardButton::callback(
            slot.clone(),
            format!("{}{}", CB_TIME_PREFIX, slot),
        )]);
    }
    builder
        .row(vec![InlineKeyboardButton::callback(
            CANCEL_LABEL,
            CB_CANCEL_APPLICATION,
        )])
        .build()
}

/// Shown after a submission exists (fresh or historical).
pub fn after_submission_keyboard() -> ReplyMarkup {
    InlineKeyboardBuilder::new()
        .row(vec![InlineKeyboardButton::callback("ℹ️ About us", "show_info")])
        .row(vec![InlineKeyboardButton::callback(
            "🏠 Main menu",
            CB_BACK_TO_START,
        )])
        .build()
}

/// Attached to reminder nudges.
pub fn continue_keyboard() -> ReplyMarkup {
    InlineKeyboardBuilder::new()
        .row(vec![InlineKeyboardButton::callback(
            "✅ Continue my application",
            CB_CONTINUE_APPLICATION,
        )])
        .build()
}

/// Keyboard appropriate for prompting at `step`.
pub fn keyboard_for(step: Step, slots: &[String]) -> ReplyMarkup {
    match step {
        Step::Name | Step::Country => cancel_keyboard(),
        Step::Phone => phone_keyboard(),
        Step::ContactTime => contact_time_keyboard(slots),
    }
}

/// Markup that clears any reply keyboard left over from the form.
pub fn plain() -> ReplyMarkup {
    remove_keyboard()
}
