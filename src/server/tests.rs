use super::testname::{batch_label, iteration_label};
use super::*;
use crate::config::ReconnectSettings;
use crate::transport::mock::MockLink;
use crate::transport::{Envelope, MessageHandler, Operation, Session};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn tree() -> TopicTree {
    TopicTree::new("fleet", "fleet/status", "fleet/cmd/tester").unwrap()
}

fn publisher() -> CommandPublisher {
    CommandPublisher::new(tree())
}

/// Connected session over a mock link; the session task lives until the test ends.
async fn connected(link: &MockLink) -> SessionHandle<MockLink> {
    let mut session = Session::new(
        Arc::new(link.clone()),
        BrokerTarget {
            host: "127.0.0.1".into(),
            port: 1,
            username: None,
            password: None,
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_millis(500),
        },
        SubscriptionSet::for_node(&NodeIdentity::server("203.0.113.7"), &tree()),
        &ReconnectSettings {
            initial_delay_ms: 10,
            max_delay_ms: 40,
            liveness_interval_ms: 1_000,
        },
    );
    let mut handle = session.handle();
    let mut observer = StatusObserver::new(tree());
    tokio::spawn(async move { session.run(&mut observer, std::future::pending()).await });
    timeout(Duration::from_secs(2), handle.wait_for(SessionState::Connected))
        .await
        .unwrap()
        .unwrap();
    handle
}

fn console(input: &str) -> Operator<Vec<u8>> {
    let lines: Vec<&str> = input.lines().collect();
    let (tx, rx) = mpsc::channel(lines.len().max(1));
    for line in lines {
        tx.try_send(line.to_string()).unwrap();
    }
    Operator::new(rx, Vec::new())
}

#[test]
fn test_start_and_stop_address_one_tester() {
    let start = publisher().start("AR", "BASE-XSS-B01-I01-TEST-AR");
    assert_eq!(start.topic, "fleet/cmd/tester/AR");
    assert_eq!(start.envelope, Envelope::start("AR", "BASE-XSS-B01-I01-TEST-AR"));

    let stop = publisher().stop("JS");
    assert_eq!(stop.topic, "fleet/cmd/tester/JS");
    assert_eq!(stop.envelope.testname, None);
}

#[test]
fn test_update_always_goes_to_broadcast() {
    let update = publisher().update();
    assert_eq!(update.topic, "fleet/status");
    assert_eq!(update.envelope.operation, Some(Operation::Update));
    assert_eq!(update.envelope.tester, None);
}

#[test]
fn test_tester_from_testname() {
    assert_eq!(tester_from_testname("BASE-XSS-B01-I01-TEST-AR"), "AR");
    assert_eq!(tester_from_testname("single"), "single");
    assert_eq!(tester_from_testname("BASE-XSS-"), "TEST");
}

#[test]
fn test_labels_and_composition() {
    assert_eq!(batch_label(1), "B01");
    assert_eq!(batch_label(9), "B09");
    assert_eq!(batch_label(10), "B10");
    assert_eq!(iteration_label(42), "I42");

    let mut name = TestName {
        vendor: "BASE".into(),
        category: "XSS".into(),
        batch: 1,
        iteration: 12,
        test_type: Some("TEST".into()),
        tester: "AR".into(),
    };
    assert_eq!(name.compose(), "BASE-XSS-B01-I12-TEST-AR");
    name.test_type = None;
    assert_eq!(name.compose(), "BASE-XSS-B01-I12-AR");
}

#[test]
fn test_observer_classifies_traffic() {
    let observer = StatusObserver::new(tree());
    let status = json!({"operation": "status", "tester": "AR", "message": "START Operation performed by AR"});
    assert_eq!(
        observer.classify("fleet/status", status.to_string().as_bytes()),
        Observation::Status {
            tester: Some("AR".into()),
            message: Some("START Operation performed by AR".into())
        }
    );
    assert_eq!(
        observer.classify("fleet/cmd/tester/AR", br#"{"operation":"stop","tester":"AR"}"#),
        Observation::Command {
            topic: "fleet/cmd/tester/AR".into(),
            operation: Operation::Stop
        }
    );
    assert_eq!(
        observer.classify("fleet/status", br#"{"operation":"update"}"#),
        Observation::Ignored
    );
    assert_eq!(observer.classify("fleet/status", b"garbage"), Observation::Malformed);
}

#[test]
fn test_observer_never_replies() {
    let mut observer = StatusObserver::new(tree());
    let out = observer.on_message("fleet/cmd/tester/AR", br#"{"operation":"start","testname":"X"}"#);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_prompt_composes_name_after_confirmation() {
    let mut operator = console("ar\nbase\n\nxss\n1\nzero\n12\ntest\nno\nar\nfp\nsqli\n3\n4\n\nyes\n");
    let name = operator.read_test_name().await.unwrap().unwrap();
    assert_eq!(name.compose(), "FP-SQLI-B03-I04-AR");

    let transcript = String::from_utf8(operator.into_output()).unwrap();
    assert!(transcript.contains("Test Name >>> BASE-XSS-B01-I12-TEST-AR"));
    assert!(transcript.contains("TEST INFORMATION DISCARDED"));
    assert!(transcript.contains("Please enter a positive number"));
}

#[tokio::test]
async fn test_prompt_gives_up_on_closed_input() {
    let mut operator = console("ar\nbase\n");
    assert_eq!(operator.read_test_name().await.unwrap(), None);
}

#[tokio::test]
async fn test_stop_needs_double_confirmation() {
    let mut operator = console("n\ny\nn\ny\nyes\n");
    assert_eq!(operator.confirm_stop().await.unwrap(), StopRequest::Confirmed);

    let mut operator = console("y\n");
    assert_eq!(operator.confirm_stop().await.unwrap(), StopRequest::InputClosed);
}

#[tokio::test]
async fn test_drive_update_publishes_once_to_broadcast() {
    let link = MockLink::new();
    let handle = connected(&link).await;
    let mut operator = console("");

    drive(&handle, &publisher(), Request::Update, &mut operator, std::future::pending())
        .await
        .unwrap();

    assert_eq!(link.published(), vec![("fleet/status".to_string(), Envelope::update())]);
}

#[tokio::test]
async fn test_drive_named_test_start_then_confirmed_stop() {
    let link = MockLink::new();
    let handle = connected(&link).await;
    let mut operator = console("y\ny\n");

    let request = Request::Start {
        testname: Some("BASE-XSS-B01-I01-TEST-AR".into()),
    };
    drive(&handle, &publisher(), request, &mut operator, std::future::pending())
        .await
        .unwrap();

    assert_eq!(
        link.published(),
        vec![
            (
                "fleet/cmd/tester/AR".to_string(),
                Envelope::start("AR", "BASE-XSS-B01-I01-TEST-AR")
            ),
            ("fleet/cmd/tester/AR".to_string(), Envelope::stop("AR")),
        ]
    );
}

#[tokio::test]
async fn test_drive_interrupt_still_stops_tester() {
    let link = MockLink::new();
    let handle = connected(&link).await;
    let mut operator = console("");

    let request = Request::Start {
        testname: Some("FP-SQLI-B02-I01-JS".into()),
    };
    drive(&handle, &publisher(), request, &mut operator, async {})
        .await
        .unwrap();

    let published = link.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1], ("fleet/cmd/tester/JS".to_string(), Envelope::stop("JS")));
}

#[tokio::test]
async fn test_drive_prompted_test_uses_entered_tester() {
    let link = MockLink::new();
    let handle = connected(&link).await;
    let mut operator = console("mk\nbase\nxss\n2\n1\n\ny\ny\ny\n");

    drive(&handle, &publisher(), Request::Start { testname: None }, &mut operator, std::future::pending())
        .await
        .unwrap();

    let published = link.published();
    assert_eq!(published[0].0, "fleet/cmd/tester/MK");
    assert_eq!(published[0].1.testname.as_deref(), Some("BASE-XSS-B02-I01-MK"));
    assert_eq!(published[1].1, Envelope::stop("MK"));
}

#[tokio::test]
async fn test_drive_closed_prompt_publishes_nothing() {
    let link = MockLink::new();
    let handle = connected(&link).await;
    let mut operator = console("");

    drive(&handle, &publisher(), Request::Start { testname: None }, &mut operator, std::future::pending())
        .await
        .unwrap();

    assert!(link.published().is_empty());
}

#[tokio::test]
async fn test_drive_survives_broker_outage() {
    let link = MockLink::new();
    let mut handle = connected(&link).await;
    link.fail_next_connects(u32::MAX);
    link.drop_connection(2);
    timeout(Duration::from_secs(2), handle.wait_for(SessionState::Reconnecting))
        .await
        .unwrap()
        .unwrap();

    let mut operator = console("y\ny\n");
    let request = Request::Start {
        testname: Some("BASE-XSS-B01-I01-TEST-AR".into()),
    };
    drive(&handle, &publisher(), request, &mut operator, std::future::pending())
        .await
        .unwrap();

    assert!(link.published().is_empty());
    let transcript = String::from_utf8(operator.into_output()).unwrap();
    assert!(transcript.contains("Are you sure"));
}

#[tokio::test]
async fn test_publish_waits_for_reconnect() {
    let link = MockLink::new();
    let mut handle = connected(&link).await;
    link.fail_next_connects(u32::MAX);
    link.drop_connection(2);
    timeout(Duration::from_secs(2), handle.wait_for(SessionState::Reconnecting))
        .await
        .unwrap()
        .unwrap();

    link.fail_next_connects(0);
    let mut operator = console("");
    drive(&handle, &publisher(), Request::Update, &mut operator, std::future::pending())
        .await
        .unwrap();

    assert_eq!(link.published(), vec![("fleet/status".to_string(), Envelope::update())]);
}
