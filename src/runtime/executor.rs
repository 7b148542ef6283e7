//! Party runtime executor

use super::traits::{SessionStore, Transport};
use super::RuntimeSettings;

use crate::notify;
use crate::relay::{self, OperatorChannel};
use crate::state_machine::{transition, Effect, Event, PartyContext, Session};
use crate::transport::Outbound;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Serialized turn loop for one party, generic over store and transport
pub struct PartyRuntime<S, T>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
{
    context: PartyContext,
    store: Arc<S>,
    transport: Arc<T>,
    operators: OperatorChannel<T>,
    settings: RuntimeSettings,
    event_rx: mpsc::Receiver<Event>,
}

impl<S, T> PartyRuntime<S, T>
where
    S: SessionStore + 'static,
    T: Transport + 'static,
{
    pub fn new(
        context: PartyContext,
        store: Arc<S>,
        transport: Arc<T>,
        operators: OperatorChannel<T>,
        settings: RuntimeSettings,
        event_rx: mpsc::Receiver<Event>,
    ) -> Self {
        Self {
            context,
            store,
            transport,
            operators,
            settings,
            event_rx,
        }
    }

    pub async fn run(mut self) {
        let party_id = self.context.party_id;
        tracing::debug!(party_id = %party_id, "Starting party runtime");

        // Process events in a loop - no recursion
        loop {
            match tokio::time::timeout(self.settings.idle_timeout, self.event_rx.recv()).await {
                Ok(Some(event)) => self.process_event(event).await,
                Ok(None) => break,
                Err(_) => {
                    // Refuse new events, then finish what is already queued
                    self.event_rx.close();
                    while let Some(event) = self.event_rx.recv().await {
                        self.process_event(event).await;
                    }
                    break;
                }
            }
        }

        tracing::debug!(party_id = %party_id, "Party runtime stopped");
    }

    async fn process_event(&mut self, event: Event) {
        let party_id = self.context.party_id;
        let reply_chat = match &event {
            Event::OperatorReply { origin_chat, .. } => *origin_chat,
            Event::PartyText { .. } => party_id.chat_id(),
        };

        let session = self.load_session().await;
        let from = session.as_ref().map(|s| s.state);

        match transition(session.as_ref(), &self.context, event, Utc::now()) {
            Ok(result) => {
                tracing::debug!(
                    party_id = %party_id,
                    from = ?from,
                    to = %result.session.state,
                    effects = result.effects.len(),
                    "Transition"
                );
                for effect in result.effects {
                    self.execute_effect(&result.session, effect).await;
                }
            }
            Err(e) => {
                tracing::info!(party_id = %party_id, state = ?from, error = %e, "Input rejected");
                self.deliver(reply_chat, &e.prompt()).await;
            }
        }
    }

    /// Read the party's session; failures and timeouts read as absent
    async fn load_session(&self) -> Option<Session> {
        let party_id = self.context.party_id;
        match tokio::time::timeout(self.settings.store_timeout, self.store.get(party_id)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::error!(party_id = %party_id, error = %e, "Failed to load session");
                None
            }
            Err(_) => {
                tracing::error!(party_id = %party_id, "Timed out loading session");
                None
            }
        }
    }

    async fn execute_effect(&self, session: &Session, effect: Effect) {
        let party_id = self.context.party_id;
        match effect {
            Effect::PersistSession => {
                let write = self.store.put(session, self.settings.session_ttl);
                match tokio::time::timeout(self.settings.store_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(party_id = %party_id, error = %e, "Failed to persist session");
                    }
                    Err(_) => tracing::warn!(party_id = %party_id, "Timed out persisting session"),
                }
            }

            Effect::SendToParty { message } => {
                self.deliver(party_id.chat_id(), &message).await;
            }

            Effect::DispatchSummary => {
                notify::dispatch(&self.operators, session).await;
            }

            Effect::ForwardToOperators { text } => {
                self.operators.post(&text).await;
            }

            Effect::RelayToParty { text, ack_chat } => {
                let ack = match self
                    .transport
                    .send(party_id.chat_id(), &Outbound::new(text))
                    .await
                {
                    Ok(()) => {
                        tracing::info!(party_id = %party_id, "Operator reply delivered");
                        relay::reply_delivered()
                    }
                    Err(e) => {
                        tracing::warn!(party_id = %party_id, error = %e, "Failed to deliver operator reply");
                        relay::reply_failed(&e)
                    }
                };
                self.deliver(ack_chat, &ack).await;
            }
        }
    }

    /// Send without retry; failures are logged and the turn goes on
    async fn deliver(&self, chat_id: i64, message: &Outbound) {
        if let Err(e) = self.transport.send(chat_id, message).await {
            tracing::warn!(chat_id, error = %e, "Failed to deliver message");
        }
    }
}
