//! Effects produced by state transitions

use crate::transport::Outbound;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write the full session record back to the store
    PersistSession,

    /// Send a prompt to the party
    SendToParty { message: Outbound },

    /// Deliver the intake summary to the operator channel
    DispatchSummary,

    /// Post an already formatted party message to the operator channel
    ForwardToOperators { text: String },

    /// Deliver an operator reply to the party, then acknowledge to `ack_chat`
    RelayToParty { text: String, ack_chat: i64 },
}

impl Effect {
    pub fn prompt(message: Outbound) -> Self {
        Effect::SendToParty { message }
    }
}
