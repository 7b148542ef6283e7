//! Telegram transport via teloxide long polling

use super::{route, split_html, Keyboard, Outbound, SPLIT_THRESHOLD};
use crate::runtime::{RuntimeManager, SessionStore, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    ChatKind, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode, ReplyMarkup,
};
use tracing::debug;

/// Outbound adapter: HTML parse mode plus reply keyboards
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn reply_markup(keyboard: &Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::Unchanged => None,
        Keyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        Keyboard::Buttons(rows) => {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(|caption| KeyboardButton::new(*caption)));
            Some(ReplyMarkup::Keyboard(
                KeyboardMarkup::new(rows).resize_keyboard(),
            ))
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    /// Long text goes out as several messages; the keyboard rides on the last
    async fn send(&self, chat_id: i64, message: &Outbound) -> Result<(), String> {
        let chunks = split_html(&message.text, SPLIT_THRESHOLD);
        let last = chunks.len().saturating_sub(1);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let mut request = self
                .bot
                .send_message(ChatId(chat_id), chunk)
                .parse_mode(ParseMode::Html);
            if index == last {
                if let Some(markup) = reply_markup(&message.keyboard) {
                    request = request.reply_markup(markup);
                }
            }
            request.await.map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// Consume updates until the dispatcher stops, routing text messages into
/// the runtime. Non-text messages and unrelated chats are ignored.
pub async fn run_polling<S, T>(
    bot: Bot,
    manager: Arc<RuntimeManager<S, T>>,
    operator_channel: Option<i64>,
) where
    S: SessionStore + 'static,
    T: Transport + 'static,
{
    tracing::info!("Starting Telegram long polling");

    let handler = Update::filter_message().endpoint(move |msg: Message| {
        let manager = Arc::clone(&manager);
        async move {
            let Some(text) = msg.text() else {
                debug!(chat_id = msg.chat.id.0, "Ignoring non-text message");
                return respond(());
            };

            let is_private = matches!(msg.chat.kind, ChatKind::Private(_));
            match route(msg.chat.id.0, is_private, text, operator_channel) {
                Some(inbound) => manager.dispatch(inbound).await,
                None => debug!(chat_id = msg.chat.id.0, "Ignoring message from unrelated chat"),
            }
            respond(())
        }
    });

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {}) // Silently ignore non-message updates
        .build()
        .dispatch()
        .await;
}
