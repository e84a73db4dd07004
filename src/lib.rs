// SPDX-License-Identifier: MIT

//! leadline-rs: a conversational lead-intake bot.
//!
//! A multi-step intake form over a chat transport, with resumable
//! checkpointing, first-touch attribution, idle-session reminders, and a
//! read-only admin analytics API. `botapi` is the transport layer;
//! `leadline` is the application.

pub mod botapi;
pub mod leadline;
