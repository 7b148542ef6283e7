//! Events that can occur in a party's dialog

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Text typed (or a keyboard caption tapped) by the party
    PartyText { text: String },

    /// Operator reply addressed to this party
    OperatorReply {
        /// Chat the command came from; acknowledgements go back here
        origin_chat: i64,
        text: String,
    },
}

impl Event {
    pub fn party_text(text: impl Into<String>) -> Self {
        Event::PartyText { text: text.into() }
    }
}
