use tracing::{debug, info, warn};

use crate::topics::TopicTree;
use crate::transport::{Envelope, MessageHandler, Operation, Outbound};

/// What the server made of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Status { tester: Option<String>, message: Option<String> },
    Command { topic: String, operation: Operation },
    Ignored,
    Malformed,
}

/// Server-side handler: logs fleet traffic and never answers it.
#[derive(Debug, Clone)]
pub struct StatusObserver {
    tree: TopicTree,
}

impl StatusObserver {
    pub fn new(tree: TopicTree) -> Self {
        Self { tree }
    }

    pub fn classify(&self, topic: &str, payload: &[u8]) -> Observation {
        let envelope = match Envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(_) => return Observation::Malformed,
        };
        match envelope.operation {
            Some(Operation::Status) => Observation::Status {
                tester: envelope.tester,
                message: envelope.message,
            },
            Some(operation) if self.tree.is_tester_topic(topic) => Observation::Command {
                topic: topic.to_string(),
                operation,
            },
            _ => Observation::Ignored,
        }
    }
}

impl MessageHandler for StatusObserver {
    fn on_message(&mut self, topic: &str, payload: &[u8]) -> Vec<Outbound> {
        match self.classify(topic, payload) {
            Observation::Status { tester, message } => {
                info!(
                    tester = tester.as_deref().unwrap_or("-"),
                    "{}",
                    message.as_deref().unwrap_or("status without message")
                );
            }
            Observation::Command { topic, operation } => {
                info!(topic = %topic, operation = %operation, "command seen");
            }
            Observation::Ignored => debug!(topic = %topic, "message ignored"),
            Observation::Malformed => warn!(topic = %topic, "undecodable message"),
        }
        Vec::new()
    }
}
