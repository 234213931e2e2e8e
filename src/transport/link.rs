use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::MqttSettings;
use crate::topics::Subscription;
use crate::utils::TransportError;

/// Reason code a link reports for a disconnect the client asked for.
pub const CLEAN_DISCONNECT: u8 = 0;

/// What a link pushes back to the session while connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Message { topic: String, payload: Vec<u8> },
    Disconnected { reason_code: u8, reason: String },
}

/// Broker address plus the credentials reused on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

impl BrokerTarget {
    pub fn from_settings(settings: &MqttSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            keep_alive: settings.keep_alive(),
            connect_timeout: settings.connect_timeout(),
        }
    }

    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

/// One connection to the broker.
///
/// A link knows nothing about retries: the session decides when to call
/// `connect` again. Inbound traffic is pushed into the sender given to
/// `connect`, in the order the broker delivers it.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    async fn connect(
        &self,
        target: &BrokerTarget,
        events: UnboundedSender<LinkEvent>,
    ) -> Result<(), TransportError>;

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), TransportError>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Human-readable meaning of a disconnect reason code.
pub fn describe_disconnect(reason_code: u8) -> &'static str {
    match reason_code {
        CLEAN_DISCONNECT => "disconnected by client",
        1 => "protocol error",
        2 => "network issue",
        3 => "closed by broker",
        4 => "bad username or password",
        5 => "not authorized",
        _ => "unknown reason",
    }
}
