//! In-memory link used by the session, client and server tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

use crate::topics::Subscription;
use crate::transport::link::{BrokerTarget, Link, LinkEvent};
use crate::transport::message::Envelope;
use crate::utils::TransportError;

#[derive(Debug, Default)]
struct Inner {
    connected: bool,
    connect_calls: u32,
    failing_connects: u32,
    hang_connects: bool,
    subscriptions: Vec<(String, u8)>,
    published: Vec<(String, Vec<u8>)>,
    events: Option<UnboundedSender<LinkEvent>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockLink {
    inner: Arc<Mutex<Inner>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().unwrap().failing_connects = n;
    }

    /// Makes connect attempts never complete.
    pub fn hang_connects(&self, hang: bool) {
        self.inner.lock().unwrap().hang_connects = hang;
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().unwrap().connect_calls
    }

    /// Every subscribe call ever made, across reconnects.
    pub fn subscriptions(&self) -> Vec<(String, u8)> {
        self.inner.lock().unwrap().subscriptions.clone()
    }

    pub fn published(&self) -> Vec<(String, Envelope)> {
        self.inner
            .lock()
            .unwrap()
            .published
            .iter()
            .map(|(topic, payload)| (topic.clone(), Envelope::decode(payload).unwrap()))
            .collect()
    }

    pub fn inject(&self, topic: &str, payload: &[u8]) {
        let inner = self.inner.lock().unwrap();
        if let Some(events) = &inner.events {
            let _ = events.send(LinkEvent::Message {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
        }
    }

    /// Simulates the broker going away with a non-clean reason.
    pub fn drop_connection(&self, reason_code: u8) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        if let Some(events) = inner.events.take() {
            let _ = events.send(LinkEvent::Disconnected {
                reason_code,
                reason: "connection reset".to_string(),
            });
        }
    }
}

#[async_trait]
impl Link for MockLink {
    async fn connect(
        &self,
        _target: &BrokerTarget,
        events: UnboundedSender<LinkEvent>,
    ) -> Result<(), TransportError> {
        let hang = {
            let mut inner = self.inner.lock().unwrap();
            inner.connect_calls += 1;
            if inner.failing_connects > 0 {
                inner.failing_connects -= 1;
                return Err(TransportError::ConnectionFailed("refused".into()));
            }
            inner.hang_connects
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.connected = true;
        inner.events = Some(events);
        Ok(())
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        inner
            .subscriptions
            .push((subscription.topic.clone(), subscription.qos));
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        inner.published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.events = None;
        Ok(())
    }
}
