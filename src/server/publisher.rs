use tracing::info;

use crate::topics::TopicTree;
use crate::transport::{Envelope, Link, Outbound, SessionHandle};
use crate::utils::TransportError;

/// Builds and sends operator commands.
///
/// `start` and `stop` go to one tester's command topic. `update` always
/// goes to the broadcast topic so every tester updates itself. Nothing is
/// acknowledged; delivery is whatever QoS 0 gives.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    tree: TopicTree,
}

impl CommandPublisher {
    pub fn new(tree: TopicTree) -> Self {
        Self { tree }
    }

    pub fn start(&self, tester: &str, testname: &str) -> Outbound {
        Outbound::new(self.tree.tester_topic(tester), Envelope::start(tester, testname))
    }

    pub fn stop(&self, tester: &str) -> Outbound {
        Outbound::new(self.tree.tester_topic(tester), Envelope::stop(tester))
    }

    pub fn update(&self) -> Outbound {
        Outbound::new(self.tree.broadcast.clone(), Envelope::update())
    }

    pub async fn publish_start<L: Link>(
        &self,
        session: &SessionHandle<L>,
        tester: &str,
        testname: &str,
    ) -> Result<(), TransportError> {
        let outbound = self.start(tester, testname);
        session.publish(&outbound).await?;
        info!(topic = %outbound.topic, tester = %tester, testname = %testname, "start published");
        Ok(())
    }

    pub async fn publish_stop<L: Link>(
        &self,
        session: &SessionHandle<L>,
        tester: &str,
    ) -> Result<(), TransportError> {
        let outbound = self.stop(tester);
        session.publish(&outbound).await?;
        info!(topic = %outbound.topic, tester = %tester, "stop published");
        Ok(())
    }

    pub async fn publish_update<L: Link>(&self, session: &SessionHandle<L>) -> Result<(), TransportError> {
        let outbound = self.update();
        session.publish(&outbound).await?;
        info!(topic = %outbound.topic, "fleet-wide update published");
        Ok(())
    }
}
