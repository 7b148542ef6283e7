//! Runtime for executing party dialogs
//!
//! One actor per active party, fed by an mpsc queue, so a party's turns run
//! strictly one at a time while different parties proceed independently.

mod executor;
pub mod traits;


pub use executor::PartyRuntime;
pub use traits::*;

use crate::relay::{CommandError, OperatorChannel, OperatorCommand};
use crate::state_machine::{Event, FlowConfig, PartyContext, PartyId};
use crate::transport::telegram::TelegramTransport;
use crate::transport::Inbound;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Type alias for the production manager with concrete implementations
pub type ProductionManager = RuntimeManager<DatabaseStore, TelegramTransport>;

/// Timing knobs shared by every party runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Sliding session expiry applied on every write
    pub session_ttl: Duration,
    /// Upper bound on any single store call
    pub store_timeout: Duration,
    /// A party runtime with no traffic for this long retires
    pub idle_timeout: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(30 * 60),
            store_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Handle to interact with a running party runtime
pub struct PartyHandle {
    pub event_tx: mpsc::Sender<Event>,
    task: JoinHandle<()>,
}

/// Manager for all party runtimes
pub struct RuntimeManager<S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    operators: OperatorChannel<T>,
    flow: FlowConfig,
    settings: RuntimeSettings,
    parties: RwLock<HashMap<PartyId, PartyHandle>>,
}

impl<S, T> RuntimeManager<S, T>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
{
    pub fn new(
        store: Arc<S>,
        transport: Arc<T>,
        operator_chat: Option<i64>,
        flow: FlowConfig,
        settings: RuntimeSettings,
    ) -> Self {
        let operators = OperatorChannel::new(Arc::clone(&transport), operator_chat);
        Self {
            store,
            transport,
            operators,
            flow,
            settings,
            parties: RwLock::new(HashMap::new()),
        }
    }

    /// Route one inbound message to the runtime that owns it
    pub async fn dispatch(&self, inbound: Inbound) {
        match inbound {
            Inbound::Party { party_id, text } => {
                tracing::debug!(party_id = %party_id, "Party message received");
                self.send_event(party_id, Event::party_text(text)).await;
            }
            Inbound::Operator { chat_id, text } => self.handle_operator_text(chat_id, &text).await,
        }
    }

    async fn handle_operator_text(&self, chat_id: i64, text: &str) {
        match OperatorCommand::parse(text) {
            Ok(command) => {
                tracing::info!(target_party = %command.target, "Operator reply received");
                self.send_event(
                    command.target,
                    Event::OperatorReply {
                        origin_chat: chat_id,
                        text: command.text,
                    },
                )
                .await;
            }
            Err(CommandError::NotACommand) => {}
            Err(e) => {
                tracing::info!(chat_id, error = %e, "Malformed operator command");
                if let Err(e) = self.transport.send(chat_id, &e.operator_message()).await {
                    tracing::warn!(chat_id, error = %e, "Failed to send command usage");
                }
            }
        }
    }

    /// Queue an event for a party, starting its runtime if needed
    pub async fn send_event(&self, party_id: PartyId, event: Event) {
        let mut event = event;
        // A runtime can retire between lookup and send; the event comes back
        // and the second attempt lands on its successor.
        for _ in 0..2 {
            let event_tx = self.get_or_create(party_id).await;
            match event_tx.send(event).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => event = returned,
            }
        }
        tracing::error!(party_id = %party_id, "Failed to hand event to party runtime");
    }

    async fn get_or_create(&self, party_id: PartyId) -> mpsc::Sender<Event> {
        // Check if already running
        {
            let parties = self.parties.read().await;
            if let Some(handle) = parties.get(&party_id) {
                if !handle.event_tx.is_closed() {
                    return handle.event_tx.clone();
                }
            }
        }

        let mut parties = self.parties.write().await;
        if let Some(handle) = parties.get(&party_id) {
            if !handle.event_tx.is_closed() {
                return handle.event_tx.clone();
            }
        }

        // A retiring runtime may still be draining; its successor waits for it
        let predecessor = parties.remove(&party_id).map(|handle| handle.task);

        let (event_tx, event_rx) = mpsc::channel(32);
        let runtime = PartyRuntime::new(
            PartyContext::new(party_id, self.flow.clone()),
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            self.operators.clone(),
            self.settings,
            event_rx,
        );

        let task = tokio::spawn(async move {
            if let Some(predecessor) = predecessor {
                let _ = predecessor.await;
            }
            runtime.run().await;
        });

        parties.insert(
            party_id,
            PartyHandle {
                event_tx: event_tx.clone(),
                task,
            },
        );
        event_tx
    }

    /// Forget runtimes that have fully stopped
    pub async fn prune_idle(&self) -> usize {
        let mut parties = self.parties.write().await;
        let before = parties.len();
        parties.retain(|_, handle| !handle.task.is_finished());
        before - parties.len()
    }

    /// Parties with a runtime currently accepting events
    #[cfg(test)]
    pub async fn active_parties(&self) -> usize {
        self.parties
            .read()
            .await
            .values()
            .filter(|handle| !handle.event_tx.is_closed())
            .count()
    }

    /// Periodic housekeeping: purge expired sessions and forget idle runtimes
    pub async fn sweep(&self) {
        match tokio::time::timeout(self.settings.store_timeout, self.store.purge_expired()).await {
            Ok(Ok(removed)) if removed > 0 => {
                tracing::info!(removed, "Purged expired sessions");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
            Err(_) => tracing::warn!("Timed out purging expired sessions"),
        }

        let pruned = self.prune_idle().await;
        if pruned > 0 {
            tracing::debug!(pruned, "Forgot retired party runtimes");
        }
    }
}
