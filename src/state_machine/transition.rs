//! Pure state transition function
//!
//! Given the stored session (if any), the party context and one event, compute
//! the next session record and the effects the runtime must execute. No I/O.

use super::prompts::{self, START_CAPTION};
use super::state::{
    CaseType, ContactMethod, DialogState, FlowConfig, PartyContext, PartyId, Role, Session,
    KNOWN_CITIES, OTHER_CITY,
};
use super::{Effect, Event};
use crate::relay;
use crate::transport::Outbound;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("No session, the start command is required")]
    NoSession,
    #[error("Input not accepted in state {state}")]
    UnexpectedInput { state: DialogState },
    #[error("Party {0} has no session")]
    PartyNotFound(PartyId),
}

impl TransitionError {
    /// Reply for whoever sent the rejected input
    pub fn prompt(&self) -> Outbound {
        match self {
            TransitionError::NoSession => prompts::use_start(),
            TransitionError::UnexpectedInput { state } => prompts::follow_instructions(*state),
            TransitionError::PartyNotFound(_) => relay::party_not_found(),
        }
    }
}

/// `/start`, `/start@botname`, `/start <payload>` or the start button caption
pub fn is_start_command(text: &str) -> bool {
    let text = text.trim();
    if text == START_CAPTION {
        return true;
    }
    let word = text.split_whitespace().next().unwrap_or_default();
    let command = word.split_once('@').map_or(word, |(command, _)| command);
    command == "/start"
}

/// Pure transition function
///
/// `session` is whatever the store returned; expired records never reach
/// here because the store hides them.
pub fn transition(
    session: Option<&Session>,
    context: &PartyContext,
    event: Event,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    let session = session.filter(|s| s.state != DialogState::Idle);

    match event {
        Event::PartyText { text } => {
            if is_start_command(&text) {
                return Ok(TransitionResult::new(Session::new(context.party_id, now))
                    .with_effect(Effect::PersistSession)
                    .with_effect(Effect::prompt(prompts::welcome())));
            }
            let current = session.ok_or(TransitionError::NoSession)?;
            handle_party_text(current, &context.flow, text.trim())
        }

        // Replies are valid for any stored session, finished or not
        Event::OperatorReply { origin_chat, text } => {
            let mut next = session
                .cloned()
                .ok_or(TransitionError::PartyNotFound(context.party_id))?;
            next.enter_relay();
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::RelayToParty {
                    text: relay::format_operator_reply(&text),
                    ack_chat: origin_chat,
                }))
        }
    }
}

// ============================================================================
// Intake steps
// ============================================================================

fn handle_party_text(
    current: &Session,
    flow: &FlowConfig,
    input: &str,
) -> Result<TransitionResult, TransitionError> {
    let mismatch = || TransitionError::UnexpectedInput {
        state: current.state,
    };
    let free_text = |input: &str| {
        if input.is_empty() {
            Err(mismatch())
        } else {
            Ok(input.to_string())
        }
    };

    let mut next = current.clone();
    match current.state {
        DialogState::Idle => return Err(TransitionError::NoSession),

        DialogState::AwaitCity if input == OTHER_CITY => {
            next.state = DialogState::AwaitCustomCity;
        }
        DialogState::AwaitCity => {
            if !KNOWN_CITIES.contains(&input) {
                return Err(mismatch());
            }
            next.city = Some(input.to_string());
            next.state = DialogState::AwaitRole;
        }

        DialogState::AwaitCustomCity => {
            next.city = Some(free_text(input)?);
            next.state = DialogState::AwaitRole;
        }

        DialogState::AwaitRole => {
            next.role = Some(Role::from_caption(input).ok_or_else(mismatch)?);
            next.state = if flow.ask_case_type {
                DialogState::AwaitCaseType
            } else {
                DialogState::AwaitContactMethod
            };
        }

        DialogState::AwaitCaseType => {
            next.case_type = Some(CaseType::from_caption(input).ok_or_else(mismatch)?);
            next.state = DialogState::AwaitContactMethod;
        }

        DialogState::AwaitContactMethod => {
            next.contact_method = Some(ContactMethod::from_caption(input).ok_or_else(mismatch)?);
            next.state = DialogState::AwaitName;
        }

        DialogState::AwaitName => {
            next.name_or_company = Some(free_text(input)?);
            next.state = DialogState::AwaitQuery;
        }

        DialogState::AwaitQuery => {
            next.query_text = Some(free_text(input)?);
            if next.contact_method == Some(ContactMethod::Phone) {
                next.state = DialogState::AwaitPhone;
            } else {
                next.enter_relay();
            }
        }

        DialogState::AwaitPhone => {
            next.phone = Some(free_text(input)?);
            next.enter_relay();
        }

        DialogState::ActiveRelay => return Ok(relay_from_party(current, flow, input)),
    }

    if next.state == DialogState::ActiveRelay {
        let confirmation = prompts::intake_complete(&next, flow);
        return Ok(TransitionResult::new(next).with_effects([
            Effect::PersistSession,
            Effect::DispatchSummary,
            Effect::prompt(confirmation),
        ]));
    }

    let question = prompts::question(next.state, &next);
    Ok(TransitionResult::new(next)
        .with_effect(Effect::PersistSession)
        .with_effect(Effect::prompt(question)))
}

/// Party message after intake: forward to operators unless filtered.
/// The session is still written back so its expiry slides.
fn relay_from_party(current: &Session, flow: &FlowConfig, input: &str) -> TransitionResult {
    let unchanged = TransitionResult::new(current.clone());
    if input.is_empty() || (!flow.forward_reply_syntax && relay::is_reply_syntax(input)) {
        return unchanged;
    }
    unchanged.with_effects([
        Effect::PersistSession,
        Effect::ForwardToOperators {
            text: relay::format_party_message(current, input),
        },
    ])
}
