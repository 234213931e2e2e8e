use tracing::{debug, info, warn};

use crate::client::executor::{Dispatch, Executor};
use crate::transport::{Envelope, MessageHandler, Operation, Outbound};

/// Turns command envelopes into local operations.
///
/// Status envelopes and envelopes without an operation are ignored, so a
/// tester never reacts to the notices it (or anyone else) publishes.
pub struct CommandRouter<E: Executor> {
    tester: String,
    broadcast: String,
    executor: E,
}

impl<E: Executor> CommandRouter<E> {
    pub fn new(tester: impl Into<String>, broadcast: impl Into<String>, executor: E) -> Self {
        Self {
            tester: tester.into(),
            broadcast: broadcast.into(),
            executor,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn route(&self, topic: &str, envelope: Envelope) -> Option<Outbound> {
        let operation = match &envelope.operation {
            None => {
                debug!(topic = %topic, "envelope without operation");
                return None;
            }
            Some(Operation::Status) => {
                debug!(topic = %topic, tester = ?envelope.tester, "status notice ignored");
                return None;
            }
            Some(operation) => operation.clone(),
        };

        info!(topic = %topic, operation = %operation, tester = ?envelope.tester, "command received");
        match self
            .executor
            .execute(&operation, envelope.tester.as_deref(), &envelope)
        {
            Dispatch::Launched(_) => Some(Outbound::new(
                self.broadcast.clone(),
                Envelope::status(&operation, &self.tester),
            )),
            Dispatch::Skipped(reason) => {
                warn!(operation = %operation, reason = ?reason, "command skipped");
                None
            }
        }
    }
}

impl<E: Executor> MessageHandler for CommandRouter<E> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) -> Vec<Outbound> {
        match Envelope::decode(payload) {
            Ok(envelope) => self.route(topic, envelope).into_iter().collect(),
            Err(e) => {
                warn!(topic = %topic, error = %e, "dropping undecodable payload");
                Vec::new()
            }
        }
    }
}
