//! Operator relay bridge
//!
//! Parses operator reply commands, formats traffic crossing between parties
//! and the operator channel, and owns the handle used to post into that
//! channel.

use crate::runtime::Transport;
use crate::state_machine::{PartyId, Session};
use crate::transport::Outbound;
use std::sync::Arc;
use teloxide::utils::html;
use thiserror::Error;

const USAGE: &str = "Используйте формат: /reply user_id текст";
const REPLY_DELIVERED: &str = "✅ Ответ отправлен пользователю.";
const PARTY_NOT_FOUND: &str = "❌ Ошибка: пользователь не найден в базе.";

// ============================================================================
// Operator command
// ============================================================================

/// `reply <party_id> <text>` issued in the operator channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorCommand {
    pub target: PartyId,
    pub text: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Ordinary chatter, not addressed to the bot
    #[error("Not a reply command")]
    NotACommand,
    #[error("Reply command needs a party id and text")]
    MissingArguments,
    #[error("Invalid party id: {0}")]
    InvalidTarget(String),
}

impl CommandError {
    /// Reply for the operator who sent the malformed command
    pub fn operator_message(&self) -> Outbound {
        match self {
            Self::InvalidTarget(id) => Outbound::new(format!(
                "❌ Некорректный user_id: {}\n{USAGE}",
                html::escape(id)
            )),
            Self::NotACommand | Self::MissingArguments => Outbound::new(USAGE),
        }
    }
}

fn split_word(text: &str) -> (&str, &str) {
    text.split_once(char::is_whitespace).unwrap_or((text, ""))
}

impl OperatorCommand {
    /// Accepts `/reply`, `/reply@botname` and bare `reply` as the command word.
    ///
    /// Bare `reply` counts only when a numeric id follows, so operators can
    /// still say "reply soon" to each other. Text after the id is kept
    /// verbatim apart from the separating whitespace.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let (word, rest) = split_word(text.trim_start());
        let bare = word == "reply";
        let slashed = word.split_once('@').map_or(word, |(command, _)| command) == "/reply";
        if !bare && !slashed {
            return Err(CommandError::NotACommand);
        }

        let (id, remainder) = split_word(rest.trim_start());
        let target = match id.parse::<PartyId>() {
            Ok(target) => target,
            Err(_) if bare => return Err(CommandError::NotACommand),
            Err(_) if id.is_empty() => return Err(CommandError::MissingArguments),
            Err(_) => return Err(CommandError::InvalidTarget(id.to_string())),
        };

        let text = remainder.trim_start();
        if text.trim_end().is_empty() {
            return Err(CommandError::MissingArguments);
        }
        Ok(Self {
            target,
            text: text.to_string(),
        })
    }
}

/// Whether text would be taken for a reply command (well-formed or not)
pub fn is_reply_syntax(text: &str) -> bool {
    !matches!(
        OperatorCommand::parse(text),
        Err(CommandError::NotACommand)
    )
}

// ============================================================================
// Formatting
// ============================================================================

/// Party message as shown in the operator channel
pub fn format_party_message(session: &Session, text: &str) -> String {
    let name = session
        .name_or_company
        .as_deref()
        .unwrap_or(crate::state_machine::state::NOT_SPECIFIED);
    let id = session.party_id;
    format!(
        "💬 Сообщение от {}\n📲 Телефон: {}\n🆔 User ID: <code>{id}</code>\n\n{}\n\n<i>Ответить: /reply {id} текст</i>",
        html::bold(&html::escape(name)),
        html::escape(session.phone_display()),
        html::escape(text),
    )
}

/// Operator reply as delivered to the party
pub fn format_operator_reply(text: &str) -> String {
    format!(
        "✉️ {}\n\n{}",
        html::bold("Ответ от оператора:"),
        html::escape(text)
    )
}

pub fn reply_delivered() -> Outbound {
    Outbound::new(REPLY_DELIVERED)
}

pub fn reply_failed(error: &str) -> Outbound {
    Outbound::new(format!(
        "❌ Ошибка при отправке сообщения: {}",
        html::escape(error)
    ))
}

pub fn party_not_found() -> Outbound {
    Outbound::new(PARTY_NOT_FOUND)
}

// ============================================================================
// Operator channel
// ============================================================================

/// Shared destination for summaries and forwarded party messages.
///
/// Posting needs no locking of its own; every post is an independent send.
pub struct OperatorChannel<T> {
    transport: Arc<T>,
    chat_id: Option<i64>,
}

impl<T> Clone for OperatorChannel<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            chat_id: self.chat_id,
        }
    }
}

impl<T: Transport> OperatorChannel<T> {
    pub fn new(transport: Arc<T>, chat_id: Option<i64>) -> Self {
        Self { transport, chat_id }
    }

    /// Post text to the channel. Returns whether it was delivered; an
    /// unconfigured channel or a failed send is logged, never raised.
    pub async fn post(&self, text: &str) -> bool {
        let Some(chat_id) = self.chat_id else {
            tracing::warn!("Operator channel not configured, dropping message");
            return false;
        };
        match self.transport.send(chat_id, &Outbound::new(text)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(chat_id, error = %e, "Failed to post to operator channel");
                false
            }
        }
    }
}
