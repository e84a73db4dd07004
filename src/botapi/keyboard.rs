// SPDX-License-Identifier: MIT

//! Keyboard markup types and row-based builders.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Reply(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
}

impl KeyboardButton {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: false,
        }
    }

    pub fn contact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

/// Builds an inline keyboard row by row.
#[derive(Debug, Default)]
pub struct InlineKeyboardBuilder {
    rows: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<InlineKeyboardButton>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn build(self) -> ReplyMarkup {
        ReplyMarkup::Inline(InlineKeyboardMarkup {
            inline_keyboard: self.rows,
        })
    }
}

/// Builds a reply keyboard row by row.
#[derive(Debug, Default)]
pub struct ReplyKeyboardBuilder {
    rows: Vec<Vec<KeyboardButton>>,
}

impl ReplyKeyboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<KeyboardButton>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn build(self) -> ReplyMarkup {
        ReplyMarkup::Reply(ReplyKeyboardMarkup {
            keyboard: self.rows,
            resize_keyboard: true,
        })
    }
}

/// Markup that removes any visible reply keyboard.
pub fn remove_keyboard() -> ReplyMarkup {
    ReplyMarkup::Remove(ReplyKeyboardRemove {
        remove_keyboard: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_builder_rows() {
        let markup = InlineKeyboardBuilder::new()
            .row(vec![InlineKeyboardButton::callback("Apply", "start_application")])
            .row(vec![
                InlineKeyboardButton::callback("A", "a"),
                InlineKeyboardButton::callback("B", "b"),
            ])
            .build();

        let ReplyMarkup::Inline(inline) = markup else {
            panic!("expected inline markup");
        };
        assert_eq!(inline.inline_keyboard.len(), 2);
        assert_eq!(inline.inline_keyboard[1].len(), 2);
    }

    #[test]
    fn test_untagged_serialization() {
        let markup = InlineKeyboardBuilder::new()
            .row(vec![InlineKeyboardButton::callback("Go", "go")])
            .build();
        let value = serde_json::to_value(&markup).unwrap();
        assert!(value.get("inline_keyboard").is_some());

        let value = serde_json::to_value(remove_keyboard()).unwrap();
        assert_eq!(value["remove_keyboard"], true);
    }

    #[test]
    fn test_contact_button_flag() {
        let markup = ReplyKeyboardBuilder::new()
            .row(vec![KeyboardButton::contact("Share phone")])
            .row(vec![KeyboardButton::text("Cancel")])
            .build();
        let value = serde_json::to_value(&markup).unwrap();
        assert_eq!(value["keyboard"][0][0]["request_contact"], true);
        assert!(value["keyboard"][1][0].get("request_contact").is_none());
    }
}
