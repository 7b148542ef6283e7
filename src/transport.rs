//! Chat transport boundary
//!
//! Outbound text is Telegram-flavoured HTML: callers escape anything a party
//! or operator typed before embedding it.

pub mod telegram;

use crate::state_machine::PartyId;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A message to deliver to one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Outbound {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Unchanged,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }
}

/// Reply keyboard attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard the chat currently shows
    Unchanged,
    /// Hide the keyboard (free-text steps)
    Remove,
    /// Rows of button captions
    Buttons(Vec<Vec<&'static str>>),
}

/// A message received from the transport, classified by origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Party { party_id: PartyId, text: String },
    Operator { chat_id: i64, text: String },
}

/// Classify a text message by the chat it arrived in.
///
/// The operator channel is the only source of operator input; private chats
/// are parties; anything else (other groups the bot was added to) is dropped.
pub fn route(
    chat_id: i64,
    is_private: bool,
    text: &str,
    operator_channel: Option<i64>,
) -> Option<Inbound> {
    if operator_channel == Some(chat_id) {
        return Some(Inbound::Operator {
            chat_id,
            text: text.to_string(),
        });
    }
    is_private.then(|| Inbound::Party {
        party_id: PartyId(chat_id),
        text: text.to_string(),
    })
}

// ============================================================================
// Message length
// ============================================================================

/// Telegram rejects messages over 4096 characters. Chunks are cut at this
/// size so the tags reopened around a cut stay well inside the limit.
pub const SPLIT_THRESHOLD: usize = 3800;

/// Split HTML text into chunks of roughly `max_chars` characters.
///
/// Cuts prefer a paragraph break, then a line break, then a space, and never
/// land inside a tag or an entity. Tags still open at a cut are closed at the
/// end of the chunk and reopened at the start of the next one.
pub fn split_html(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut open: Vec<&str> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let reopened: String = open.iter().map(|tag| format!("<{tag}>")).collect();

        let Some((window_end, _)) = rest.char_indices().nth(max_chars) else {
            chunks.push(format!("{reopened}{rest}"));
            break;
        };
        let (window, _) = rest.split_at(window_end);
        let mut cut = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .unwrap_or(window_end);

        let (head, _) = rest.split_at(cut);
        if head.rfind('<') > head.rfind('>') {
            cut = head.rfind('<').unwrap_or(cut);
        }
        let (head, _) = rest.split_at(cut);
        if head.rfind('&') > head.rfind(';') {
            cut = head.rfind('&').unwrap_or(cut);
        }
        if cut == 0 {
            cut = window_end;
        }

        let (head, tail) = rest.split_at(cut);
        track_tags(&mut open, head);
        let closing: String = open
            .iter()
            .rev()
            .map(|tag| format!("</{}>", tag_name(tag)))
            .collect();
        chunks.push(format!("{reopened}{}{closing}", head.trim_end()));
        rest = tail.trim_start();
    }

    chunks
}

fn tag_name(tag: &str) -> &str {
    tag.split_whitespace().next().unwrap_or_default()
}

/// Update the stack of open tags (kept with their attributes) from `html`
fn track_tags<'a>(open: &mut Vec<&'a str>, html: &'a str) {
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        let (_, from_tag) = rest.split_at(start + 1);
        let Some(end) = from_tag.find('>') else {
            break;
        };
        let (tag, after) = from_tag.split_at(end);
        rest = after;
        match tag.strip_prefix('/') {
            Some(name) => {
                if let Some(pos) = open.iter().rposition(|t| tag_name(t) == name.trim()) {
                    open.truncate(pos);
                }
            }
            None if !tag_name(tag).is_empty() => open.push(tag),
            None => {}
        }
    }
}

// ============================================================================
// Supervision
// ============================================================================

/// Restarts a consumption loop whenever it exits or panics
#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Supervisor {
    /// Backoff before the given restart (1-based), doubling up to `max_delay`
    pub fn restart_delay(&self, restart: u32) -> Duration {
        let factor = 2u32.saturating_pow(restart.saturating_sub(1).min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `start()` in its own task until `shutdown` fires, restarting it
    /// after any exit. Returns once shutdown is requested.
    pub async fn run<F, Fut>(&self, name: &'static str, mut start: F, shutdown: CancellationToken)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut restarts: u32 = 0;
        loop {
            let task = tokio::spawn(start());
            let abort = task.abort_handle();

            tokio::select! {
                () = shutdown.cancelled() => {
                    abort.abort();
                    tracing::info!(loop_name = name, "Stopping consumption loop");
                    return;
                }
                outcome = task => match outcome {
                    Ok(()) => tracing::warn!(loop_name = name, "Consumption loop exited"),
                    Err(e) => tracing::error!(loop_name = name, error = %e, "Consumption loop crashed"),
                },
            }

            restarts = restarts.saturating_add(1);
            let delay = self.restart_delay(restarts);
            tracing::info!(
                loop_name = name,
                restarts,
                delay_ms = %delay.as_millis(),
                "Restarting consumption loop"
            );

            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
