//! Operator side of the fleet.
//!
//! The server watches every tester topic plus the broadcast topic, and
//! issues `start`, `stop` and `update` commands on the operator's behalf.

pub mod observer;
pub mod operator;
pub mod publisher;
pub mod testname;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::identity::NodeIdentity;
use crate::topics::{SubscriptionSet, TopicTree};
use crate::transport::{BrokerTarget, Link, MqttLink, Session, SessionHandle, SessionState};
use crate::utils::FleetError;

pub use observer::{Observation, StatusObserver};
pub use operator::{Operator, StopRequest, stdin_lines};
pub use publisher::CommandPublisher;
pub use testname::{TestName, tester_from_testname};

/// What the operator asked for on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Broadcast an update to every tester, then exit.
    Update,
    /// Start a test, prompting for its name when none is given.
    Start { testname: Option<String> },
}

/// Runs the operator flow against the configured broker.
pub async fn run(
    settings: &Settings,
    identity: &NodeIdentity,
    tree: &TopicTree,
    request: Request,
) -> Result<(), FleetError> {
    let link = Arc::new(MqttLink::with_random_id());
    let mut session = Session::new(
        link,
        BrokerTarget::from_settings(&settings.mqtt),
        SubscriptionSet::for_node(identity, tree),
        &settings.reconnect,
    );
    let mut handle = session.handle();

    let (stop_session, stopped) = oneshot::channel::<()>();
    let mut observer = StatusObserver::new(tree.clone());
    let session_task = tokio::spawn(async move {
        session
            .run(&mut observer, async {
                let _ = stopped.await;
            })
            .await
    });

    let connected = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received before the broker answered");
            false
        }
        result = handle.wait_for(SessionState::Connected) => result.is_ok(),
    };

    let outcome = if connected {
        let mut operator = Operator::new(stdin_lines(), tokio::io::stdout());
        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
            warn!("interrupt received, stopping the test");
        };
        let publisher = CommandPublisher::new(tree.clone());
        drive(&handle, &publisher, request, &mut operator, interrupt).await
    } else {
        Ok(())
    };

    let _ = stop_session.send(());
    match session_task.await {
        Ok(result) => result?,
        Err(e) => error!(error = %e, "session task failed"),
    }
    info!("cleaning up resources and exiting");
    outcome
}

/// Carries out one operator request over a connected session.
///
/// An interrupt while a test runs still sends `stop` for its tester.
/// Publishing is best-effort: a failed publish is logged and the flow
/// carries on.
pub async fn drive<L, W, I>(
    session: &SessionHandle<L>,
    publisher: &CommandPublisher,
    request: Request,
    operator: &mut Operator<W>,
    interrupt: I,
) -> Result<(), FleetError>
where
    L: Link,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    let (tester, testname) = match request {
        Request::Update => {
            if let Err(e) = publisher.publish_update(session).await {
                error!(error = %e, "update not published");
            }
            return Ok(());
        }
        Request::Start {
            testname: Some(testname),
        } => (tester_from_testname(&testname), testname),
        Request::Start { testname: None } => {
            let entered = tokio::select! {
                _ = interrupt.as_mut() => return Ok(()),
                entered = operator.read_test_name() => entered?,
            };
            match entered {
                Some(name) => (name.tester.clone(), name.compose()),
                None => {
                    warn!("no test information entered, nothing published");
                    return Ok(());
                }
            }
        }
    };

    if let Err(e) = publisher.publish_start(session, &tester, &testname).await {
        error!(tester = %tester, error = %e, "start not published");
    }
    info!(tester = %tester, testname = %testname, "TEST IN PROGRESS");

    let stop = tokio::select! {
        _ = interrupt.as_mut() => None,
        request = operator.confirm_stop() => Some(request?),
    };
    if stop == Some(StopRequest::InputClosed) {
        info!(tester = %tester, "operator input closed, interrupt to stop the test");
        interrupt.as_mut().await;
    }

    match publisher.publish_stop(session, &tester).await {
        Ok(()) => info!(tester = %tester, testname = %testname, "test stopped"),
        Err(e) => error!(tester = %tester, error = %e, "stop not published"),
    }
    Ok(())
}
