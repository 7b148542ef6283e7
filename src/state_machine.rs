//! Intake dialog state machine
//!
//! Elm-style: a pure transition function maps (session, event) to the next
//! session and a list of effects for the runtime to execute.

mod effect;
pub mod event;
mod prompts;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    CaseType, ContactMethod, DialogState, FlowConfig, PartyContext, PartyId, Role, Session,
};
pub use transition::{transition, TransitionError, TransitionResult};
