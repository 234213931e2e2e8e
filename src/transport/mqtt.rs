use async_trait::async_trait;
use mqtt5::{
    ConnectOptions, ConnectionEvent, DisconnectReason, Message, MqttClient, MqttError, QoS,
    SubscribeOptions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::topics::Subscription;
use crate::transport::link::{BrokerTarget, CLEAN_DISCONNECT, Link, LinkEvent};
use crate::utils::TransportError;

/// MQTT v5 link backed by `mqtt5`.
///
/// Every `connect` builds a fresh client so callbacks registered by an
/// earlier connection can never fire twice. The library's own reconnect
/// logic stays off; the session owns retries.
pub struct MqttLink {
    client_id: String,
    current: Mutex<Option<Connection>>,
}

struct Connection {
    client: MqttClient,
    events: UnboundedSender<LinkEvent>,
    live: Arc<AtomicBool>,
}

impl MqttLink {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            current: Mutex::new(None),
        }
    }

    /// Link with a fresh `fleet-<uuid>` client id.
    pub fn with_random_id() -> Self {
        Self::new(format!("fleet-{}", uuid::Uuid::new_v4()))
    }

    async fn teardown(&self) {
        let Some(previous) = self.current.lock().await.take() else {
            return;
        };
        previous.live.store(false, Ordering::SeqCst);
        if previous.client.is_connected().await {
            if let Err(e) = previous.client.disconnect().await {
                debug!(error = %e, "disconnect of stale client failed");
            }
        }
    }
}

#[async_trait]
impl Link for MqttLink {
    async fn connect(
        &self,
        target: &BrokerTarget,
        events: UnboundedSender<LinkEvent>,
    ) -> Result<(), TransportError> {
        self.teardown().await;

        let client = MqttClient::new(self.client_id.clone());
        let live = Arc::new(AtomicBool::new(true));

        let notify = events.clone();
        let notify_live = Arc::clone(&live);
        client
            .on_connection_event(move |event| {
                if !notify_live.load(Ordering::SeqCst) {
                    return;
                }
                if let ConnectionEvent::Disconnected { reason } = event {
                    let _ = notify.send(LinkEvent::Disconnected {
                        reason_code: reason_code(&reason),
                        reason: format!("{reason:?}"),
                    });
                }
            })
            .await
            .map_err(connect_error)?;

        let mut options = ConnectOptions::new(self.client_id.clone())
            .with_clean_start(true)
            .with_keep_alive(target.keep_alive)
            .with_automatic_reconnect(false);
        if let Some(username) = &target.username {
            let password = target.password.clone().unwrap_or_default();
            options = options.with_credentials(username.clone(), password.as_bytes());
        }

        client
            .connect_with_options(&target.url(), options)
            .await
            .map_err(connect_error)?;

        *self.current.lock().await = Some(Connection {
            client,
            events,
            live,
        });
        Ok(())
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), TransportError> {
        let guard = self.current.lock().await;
        let connection = guard.as_ref().ok_or(TransportError::NotConnected)?;

        let events = connection.events.clone();
        let live = Arc::clone(&connection.live);
        let options = SubscribeOptions {
            qos: qos(subscription.qos),
            ..Default::default()
        };

        connection
            .client
            .subscribe_with_options(subscription.topic.clone(), options, move |message: Message| {
                if live.load(Ordering::SeqCst) {
                    let _ = events.send(LinkEvent::Message {
                        topic: message.topic,
                        payload: message.payload,
                    });
                }
            })
            .await
            .map(|_| ())
            .map_err(|e| TransportError::SubscribeFailed {
                topic: subscription.topic.clone(),
                reason: e.to_string(),
            })
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let guard = self.current.lock().await;
        let connection = guard.as_ref().ok_or(TransportError::NotConnected)?;
        connection
            .client
            .publish_qos(topic.to_string(), payload, QoS::AtMostOnce)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::PublishFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn is_connected(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(connection) => connection.client.is_connected().await,
            None => false,
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.teardown().await;
        Ok(())
    }
}

fn qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn connect_error(error: MqttError) -> TransportError {
    match error {
        MqttError::Timeout => TransportError::Timeout,
        other => TransportError::ConnectionFailed(other.to_string()),
    }
}

fn reason_code(reason: &DisconnectReason) -> u8 {
    match reason {
        DisconnectReason::ClientInitiated => CLEAN_DISCONNECT,
        DisconnectReason::ProtocolError(_) => 1,
        DisconnectReason::NetworkError(_) | DisconnectReason::KeepAliveTimeout => 2,
        DisconnectReason::ServerClosed => 3,
        // authentication rejected
        #[allow(unreachable_patterns)]
        _ => 4,
    }
}
