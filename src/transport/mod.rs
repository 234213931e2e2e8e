//! Broker connectivity.
//!
//! A [`Session`] wraps one [`Link`] to the MQTT broker and keeps it alive:
//! it connects, applies the node's subscriptions, hands every inbound
//! message to a [`MessageHandler`] in arrival order, and reconnects with
//! backoff whenever the connection drops. The wire format shared by every
//! fleet topic lives in [`message`].

pub mod backoff;
pub mod link;
pub mod message;
pub mod mqtt;
pub mod probe;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use backoff::Backoff;
pub use link::{BrokerTarget, Link, LinkEvent};
pub use message::{Envelope, Operation, Outbound};
pub use mqtt::MqttLink;
pub use session::{MessageHandler, Session, SessionHandle, SessionState};
