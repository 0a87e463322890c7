//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

use crate::menu::content::{BACK, HOME};
use crate::menu::keyboard::{Keyboard, KeyboardAction, KeyboardButton};
use crate::menu::render::Messenger;
use crate::menu::session::ConversationId;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Messenger for TelegramClient {
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(conversation), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn send_text_with_keyboard(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), String> {
        self.bot
            .send_message(ChatId(conversation), text)
            .reply_markup(inline_markup(keyboard))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send menu: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn acknowledge(&self, interaction_id: &str) -> Result<(), String> {
        self.bot
            .answer_callback_query(CallbackQueryId(interaction_id.to_string()))
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to answer callback query: {e}"))
    }
}

/// One row per option; Back and Home share the last row.
pub fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let (controls, options): (Vec<&KeyboardButton>, Vec<&KeyboardButton>) =
        keyboard.buttons().iter().partition(|b| b.is_control());

    let mut rows: Vec<Vec<InlineKeyboardButton>> = options.into_iter().map(|b| vec![inline_button(b)]).collect();
    if !controls.is_empty() {
        rows.push(controls.into_iter().map(inline_button).collect());
    }
    InlineKeyboardMarkup::new(rows)
}

fn inline_button(button: &KeyboardButton) -> InlineKeyboardButton {
    let label = button.label.clone();
    match &button.action {
        KeyboardAction::Navigate(key) => InlineKeyboardButton::callback(label, key.clone()),
        KeyboardAction::OpenUrl(url) => InlineKeyboardButton::url(label, url.clone()),
        KeyboardAction::GoBack => InlineKeyboardButton::callback(label, BACK),
        KeyboardAction::GoHome => InlineKeyboardButton::callback(label, HOME),
    }
}
