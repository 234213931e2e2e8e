use crate::config::ReconnectSettings;
use crate::topics::{Subscription, SubscriptionSet};
use crate::transport::mock::MockLink;
use crate::transport::{
    BrokerTarget, Envelope, MessageHandler, Operation, Outbound, Session, SessionHandle,
    SessionState,
};
use crate::utils::TransportError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

fn target() -> BrokerTarget {
    BrokerTarget {
        host: "127.0.0.1".to_string(),
        port: 1,
        username: Some("fleet".to_string()),
        password: Some("secret".to_string()),
        keep_alive: Duration::from_secs(60),
        connect_timeout: Duration::from_millis(50),
    }
}

fn reconnect(initial_delay_ms: u64) -> ReconnectSettings {
    ReconnectSettings {
        initial_delay_ms,
        max_delay_ms: initial_delay_ms * 4,
        liveness_interval_ms: 20,
    }
}

fn subscriptions() -> SubscriptionSet {
    SubscriptionSet::from(vec![
        Subscription::new("global/status", 0),
        Subscription::new("cmd/tester/AR", 0),
    ])
}

/// Records payloads and answers each one with a status notice.
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl MessageHandler for Recorder {
    fn on_message(&mut self, topic: &str, payload: &[u8]) -> Vec<Outbound> {
        let text = String::from_utf8_lossy(payload).to_string();
        self.seen.lock().unwrap().push(format!("{topic}:{text}"));
        vec![Outbound::new(
            "global/status",
            Envelope {
                message: Some(text),
                ..Envelope::status(&Operation::Start, "AR")
            },
        )]
    }
}

struct Running {
    handle: SessionHandle<MockLink>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), TransportError>>,
}

fn spawn(link: &MockLink, settings: ReconnectSettings, mut handler: Recorder) -> Running {
    let mut session = Session::new(Arc::new(link.clone()), target(), subscriptions(), &settings);
    let handle = session.handle();
    let (stop, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        session
            .run(&mut handler, async {
                let _ = stop_rx.await;
            })
            .await
    });
    Running { handle, stop, task }
}

async fn reach(handle: &mut SessionHandle<MockLink>, state: SessionState) {
    timeout(Duration::from_secs(2), handle.wait_for(state))
        .await
        .expect("state not reached in time")
        .unwrap();
}

async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !check() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn shut_down(running: Running) {
    let Running { handle, stop, task } = running;
    stop.send(()).unwrap();
    let result = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(handle.state(), SessionState::Disconnected);
}

#[test]
fn test_envelope_omits_absent_fields() {
    let bytes = Envelope::stop("AR").encode().unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"{"operation":"stop","tester":"AR"}"#
    );
}

#[test]
fn test_envelope_keeps_unknown_operation() {
    let envelope = Envelope::decode(br#"{"operation":"delete","tester":"AR"}"#).unwrap();
    assert_eq!(envelope.operation, Some(Operation::Other("delete".into())));

    let upper = Envelope::decode(br#"{"operation":"START"}"#).unwrap();
    assert_eq!(upper.operation, Some(Operation::Other("START".into())));
}

#[test]
fn test_envelope_rejects_non_json() {
    assert!(Envelope::decode(b"hello there").is_err());
    assert!(Envelope::decode(br#"["start"]"#).is_err());
}

#[test]
fn test_status_message_text() {
    let status = Envelope::status(&Operation::Update, "JS");
    assert!(status.is_status());
    assert_eq!(status.tester.as_deref(), Some("JS"));
    assert_eq!(
        status.message.as_deref(),
        Some("UPDATE Operation performed by JS")
    );
}

#[tokio::test]
async fn test_connect_subscribes_in_order() {
    let link = MockLink::new();
    let mut running = spawn(&link, reconnect(50), Recorder::default());

    reach(&mut running.handle, SessionState::Connected).await;
    eventually(|| link.subscriptions().len() == 2).await;
    assert_eq!(
        link.subscriptions(),
        vec![
            ("global/status".to_string(), 0),
            ("cmd/tester/AR".to_string(), 0)
        ]
    );

    shut_down(running).await;
}

#[tokio::test]
async fn test_messages_handled_in_order_and_replies_published() {
    let link = MockLink::new();
    let recorder = Recorder::default();
    let mut running = spawn(&link, reconnect(50), recorder.clone());
    reach(&mut running.handle, SessionState::Connected).await;

    for n in 1..=3 {
        link.inject("cmd/tester/AR", format!("m{n}").as_bytes());
    }
    eventually(|| link.published().len() == 3).await;

    assert_eq!(
        *recorder.seen.lock().unwrap(),
        vec!["cmd/tester/AR:m1", "cmd/tester/AR:m2", "cmd/tester/AR:m3"]
    );
    let messages: Vec<_> = link
        .published()
        .into_iter()
        .map(|(topic, envelope)| {
            assert_eq!(topic, "global/status");
            envelope.message.unwrap()
        })
        .collect();
    assert_eq!(messages, vec!["m1", "m2", "m3"]);

    shut_down(running).await;
}

#[tokio::test]
async fn test_reconnects_after_loss_and_resubscribes() {
    let link = MockLink::new();
    let mut running = spawn(&link, reconnect(200), Recorder::default());
    reach(&mut running.handle, SessionState::Connected).await;
    eventually(|| link.subscriptions().len() == 2).await;

    // The immediate retry fails, so the session sits in backoff for a while.
    link.fail_next_connects(1);
    link.drop_connection(2);
    reach(&mut running.handle, SessionState::Reconnecting).await;
    assert!(!running.task.is_finished());

    reach(&mut running.handle, SessionState::Connected).await;
    eventually(|| link.subscriptions().len() == 4).await;
    assert_eq!(link.connect_calls(), 3);
    let subs = link.subscriptions();
    assert_eq!(subs[..2], subs[2..]);

    shut_down(running).await;
}

#[tokio::test]
async fn test_liveness_check_detects_silent_loss() {
    let link = MockLink::new();
    let mut running = spawn(&link, reconnect(10), Recorder::default());
    reach(&mut running.handle, SessionState::Connected).await;

    // The notice itself is ignored; the dead link is still noticed.
    link.drop_connection(0);
    eventually(|| link.connect_calls() >= 2).await;
    reach(&mut running.handle, SessionState::Connected).await;

    shut_down(running).await;
}

#[tokio::test]
async fn test_connect_timeout_keeps_retrying() {
    let link = MockLink::new();
    link.hang_connects(true);
    let mut running = spawn(&link, reconnect(10), Recorder::default());

    eventually(|| link.connect_calls() >= 3).await;
    assert!(!running.task.is_finished());
    assert_eq!(running.handle.state(), SessionState::Reconnecting);

    link.hang_connects(false);
    reach(&mut running.handle, SessionState::Connected).await;

    shut_down(running).await;
}

#[tokio::test]
async fn test_shutdown_during_backoff() {
    let link = MockLink::new();
    link.fail_next_connects(u32::MAX);
    let mut running = spawn(&link, reconnect(10_000), Recorder::default());

    reach(&mut running.handle, SessionState::Reconnecting).await;
    assert_eq!(link.connect_calls(), 1);

    shut_down(running).await;
}

#[tokio::test]
async fn test_publish_without_connection_fails() {
    let link = MockLink::new();
    let session = Session::new(
        Arc::new(link.clone()),
        target(),
        subscriptions(),
        &reconnect(10),
    );
    let result = session
        .handle()
        .publish(&Outbound::new("cmd/tester/AR", Envelope::stop("AR")))
        .await;
    assert!(matches!(result, Err(TransportError::NotConnected)));
    assert_eq!(session.state(), SessionState::Disconnected);
}
