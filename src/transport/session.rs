use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::ReconnectSettings;
use crate::topics::SubscriptionSet;
use crate::transport::backoff::Backoff;
use crate::transport::link::{BrokerTarget, CLEAN_DISCONNECT, Link, LinkEvent, describe_disconnect};
use crate::transport::message::Outbound;
use crate::transport::probe;
use crate::utils::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Consumer of inbound messages.
///
/// Called once per message, in arrival order. Whatever it returns is
/// published before the next message is handled.
pub trait MessageHandler: Send {
    fn on_message(&mut self, topic: &str, payload: &[u8]) -> Vec<Outbound>;
}

/// A broker connection that keeps itself alive.
///
/// `run` owns the connect, subscribe and reconnect cycle until shutdown is
/// requested. Publishing from outside the loop goes through a
/// [`SessionHandle`].
pub struct Session<L: Link> {
    link: Arc<L>,
    target: BrokerTarget,
    subscriptions: SubscriptionSet,
    backoff: Backoff,
    liveness_interval: Duration,
    state: watch::Sender<SessionState>,
}

enum Ended {
    Shutdown,
    Lost(String),
}

impl<L: Link> Session<L> {
    pub fn new(
        link: Arc<L>,
        target: BrokerTarget,
        subscriptions: SubscriptionSet,
        reconnect: &ReconnectSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            link,
            target,
            subscriptions,
            backoff: Backoff::from_settings(reconnect),
            liveness_interval: Duration::from_millis(reconnect.liveness_interval_ms.max(1)),
            state,
        }
    }

    pub fn handle(&self) -> SessionHandle<L> {
        SessionHandle {
            link: Arc::clone(&self.link),
            state: self.state.subscribe(),
            ready_within: self.target.connect_timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Runs until `shutdown` resolves.
    ///
    /// Connection loss never ends the loop: the first retry is immediate,
    /// later ones back off exponentially up to the configured cap.
    pub async fn run<H, F>(&mut self, handler: &mut H, shutdown: F) -> Result<(), TransportError>
    where
        H: MessageHandler + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut failures: u32 = 0;
        self.set_state(SessionState::Connecting);

        loop {
            let (tx, mut rx) = mpsc::unbounded_channel();

            let attempt = tokio::select! {
                _ = shutdown.as_mut() => None,
                result = self.establish(tx) => Some(result),
            };
            let attempt = match attempt {
                Some(attempt) => attempt,
                None => break,
            };

            if let Err(e) = attempt {
                let delay = self.backoff.delay(failures);
                failures = failures.saturating_add(1);
                error!(broker = %self.target.url(), error = %e, attempt = failures, "broker connection failed");
                if matches!(e, TransportError::Timeout) {
                    self.report_reachability().await;
                }
                self.set_state(SessionState::Reconnecting);
                info!(retry_in = ?delay, "retrying broker connection");

                let stop = tokio::select! {
                    _ = shutdown.as_mut() => true,
                    _ = sleep(delay) => false,
                };
                if stop {
                    break;
                }
                continue;
            }

            failures = 0;
            match self.pump(handler, &mut rx, shutdown.as_mut()).await {
                Ended::Shutdown => break,
                Ended::Lost(reason) => {
                    warn!(reason = %reason, "broker connection lost, reconnecting");
                    self.set_state(SessionState::Reconnecting);
                }
            }
        }

        self.close().await;
        Ok(())
    }

    async fn establish(&self, events: mpsc::UnboundedSender<LinkEvent>) -> Result<(), TransportError> {
        info!(broker = %self.target.url(), "connecting to broker");
        timeout(self.target.connect_timeout, self.link.connect(&self.target, events))
            .await
            .map_err(|_| TransportError::Timeout)??;

        self.set_state(SessionState::Connected);
        for subscription in self.subscriptions.iter() {
            self.link.subscribe(subscription).await?;
            debug!(topic = %subscription.topic, qos = subscription.qos, "subscribed");
        }
        info!(
            broker = %self.target.url(),
            subscriptions = self.subscriptions.len(),
            "connected to broker"
        );
        Ok(())
    }

    async fn pump<H, F>(
        &self,
        handler: &mut H,
        rx: &mut mpsc::UnboundedReceiver<LinkEvent>,
        mut shutdown: Pin<&mut F>,
    ) -> Ended
    where
        H: MessageHandler + ?Sized,
        F: Future<Output = ()>,
    {
        let mut liveness = interval(self.liveness_interval);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
        liveness.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.as_mut() => return Ended::Shutdown,
                event = rx.recv() => match event {
                    Some(LinkEvent::Message { topic, payload }) => {
                        self.deliver(handler, &topic, &payload).await;
                    }
                    Some(LinkEvent::Disconnected { reason_code: CLEAN_DISCONNECT, .. }) => {
                        debug!("client initiated disconnect");
                    }
                    Some(LinkEvent::Disconnected { reason_code, reason }) => {
                        return Ended::Lost(format!(
                            "{} (code {reason_code}: {reason})",
                            describe_disconnect(reason_code)
                        ));
                    }
                    None => return Ended::Lost("event stream closed".to_string()),
                },
                _ = liveness.tick() => {
                    if !self.link.is_connected().await {
                        return Ended::Lost("link reports not connected".to_string());
                    }
                }
            }
        }
    }

    async fn deliver<H>(&self, handler: &mut H, topic: &str, payload: &[u8])
    where
        H: MessageHandler + ?Sized,
    {
        debug!(topic = %topic, bytes = payload.len(), "message received");
        for outbound in handler.on_message(topic, payload) {
            if let Err(e) = publish(self.link.as_ref(), &outbound).await {
                warn!(topic = %outbound.topic, error = %e, "reply publish failed");
            }
        }
    }

    async fn report_reachability(&self) {
        let reachable =
            probe::host_reachable(&self.target.host, self.target.port, self.target.connect_timeout)
                .await;
        if reachable {
            warn!(host = %self.target.host, "broker host is ONLINE but MQTT did not answer");
        } else {
            error!(host = %self.target.host, "broker host is OFFLINE");
        }
    }

    async fn close(&self) {
        if let Err(e) = self.link.disconnect().await {
            debug!(error = %e, "disconnect failed");
        }
        self.set_state(SessionState::Disconnected);
        info!("session closed");
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "session state changed");
        }
    }
}

/// Cloneable view of a running session.
pub struct SessionHandle<L: Link> {
    link: Arc<L>,
    state: watch::Receiver<SessionState>,
    ready_within: Duration,
}

impl<L: Link> Clone for SessionHandle<L> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            state: self.state.clone(),
            ready_within: self.ready_within,
        }
    }
}

impl<L: Link> SessionHandle<L> {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Publishes once the session is connected.
    ///
    /// While the session is reconnecting this waits up to the connect
    /// timeout, then fails with `NotConnected`. Nothing is retried.
    pub async fn publish(&self, outbound: &Outbound) -> Result<(), TransportError> {
        if self.state() != SessionState::Connected {
            let mut state = self.state.clone();
            timeout(
                self.ready_within,
                state.wait_for(|s| *s == SessionState::Connected),
            )
            .await
            .map_err(|_| TransportError::NotConnected)?
            .map(|_| ())
            .map_err(|_| TransportError::NotConnected)?;
        }
        publish(self.link.as_ref(), outbound).await
    }

    /// Resolves once the session reaches `wanted`.
    pub async fn wait_for(&mut self, wanted: SessionState) -> Result<(), TransportError> {
        self.state
            .wait_for(|state| *state == wanted)
            .await
            .map(|_| ())
            .map_err(|_| TransportError::NotConnected)
    }
}

async fn publish<L: Link + ?Sized>(link: &L, outbound: &Outbound) -> Result<(), TransportError> {
    let payload = outbound.envelope.encode()?;
    link.publish(&outbound.topic, payload).await?;
    debug!(topic = %outbound.topic, "published");
    Ok(())
}
