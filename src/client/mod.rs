//! Tester side of the fleet.
//!
//! A client listens on the broadcast topic and its own command topic,
//! launches the requested operation locally, and announces what it did on
//! the broadcast topic.

pub mod executor;
pub mod router;


use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::identity::{NodeIdentity, Roster};
use crate::platform::Platform;
use crate::topics::{SubscriptionSet, TopicTree};
use crate::transport::{BrokerTarget, MqttLink, Session};
use crate::utils::{FleetError, ResolutionError};

pub use executor::{Dispatch, Executor, ProcessExecutor, SkipReason, resolve_workdir};
pub use router::CommandRouter;

/// Runs the tester until interrupted.
pub async fn run(
    settings: &Settings,
    identity: &NodeIdentity,
    tree: &TopicTree,
    roster: &Roster,
    platform: Arc<dyn Platform>,
) -> Result<(), FleetError> {
    let tester = identity
        .tester_id
        .clone()
        .ok_or_else(|| ResolutionError::UnknownHost(identity.network_address.clone()))?;

    let workdir = resolve_workdir(
        settings.paths.script_root.as_deref(),
        platform.as_ref(),
        roster.script_paths(),
    );
    info!(tester = %tester, workdir = %workdir.display(), platform = platform.name(), "starting tester");

    let executor = ProcessExecutor::new(platform, workdir);
    let mut router = CommandRouter::new(tester, tree.broadcast.clone(), executor);

    let link = Arc::new(MqttLink::with_random_id());
    let mut session = Session::new(
        link,
        BrokerTarget::from_settings(&settings.mqtt),
        SubscriptionSet::for_node(identity, tree),
        &settings.reconnect,
    );

    session
        .run(&mut router, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, disconnecting");
        })
        .await?;
    Ok(())
}
