// SPDX-License-Identifier: MIT

//! Outbound messaging seams.
//!
//! The application core talks to the transport only through these traits so
//! tests can record outbound traffic instead of hitting the network.

use async_trait::async_trait;

use super::client::BotClient;
use super::error::TransportError;
use super::keyboard::ReplyMarkup;
use super::types::OutgoingMessage;

/// Delivers prompts in direct response to a user interaction.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), TransportError>;

    /// Acknowledge a callback-button press so the client stops its spinner.
    async fn ack_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Pushes unsolicited messages (reminders, admin notifications) to a user.
///
/// Delivery may fail for blocked or deleted accounts; callers treat that as
/// non-fatal.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<(), TransportError>;
}

#[async_trait]
impl Messenger for BotClient {
    async fn send(&self, message: OutgoingMessage) -> Result<(), TransportError> {
        self.send_message(&message).await?;
        Ok(())
    }

    async fn ack_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answer_callback_query(callback_id, text).await
    }
}

#[async_trait]
impl Notifier for BotClient {
    async fn notify(
        &self,
        user_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<(), TransportError> {
        let mut message = OutgoingMessage::new(user_id, text);
        message.reply_markup = markup;
        self.send_message(&message).await?;
        Ok(())
    }
}
