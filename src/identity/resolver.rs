use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::identity::{NodeIdentity, Roster};
use crate::platform::Platform;
use crate::utils::ResolutionError;

/// Sources of the two addresses role detection needs.
#[async_trait]
pub trait AddressProbe: Send + Sync {
    /// Address the outside world sees, if it can be discovered.
    async fn public_address(&self) -> Option<String>;

    /// Primary routable local IPv4 address.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Production probe: an HTTP echo service for the public address and the
/// platform primitive for the local one.
#[derive(Debug)]
pub struct SystemProbe {
    http: reqwest::Client,
    public_ip_url: String,
    platform: Arc<dyn Platform>,
}

impl SystemProbe {
    pub fn new(public_ip_url: impl Into<String>, platform: Arc<dyn Platform>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            public_ip_url: public_ip_url.into(),
            platform,
        }
    }
}

#[async_trait]
impl AddressProbe for SystemProbe {
    async fn public_address(&self) -> Option<String> {
        let response = match self.http.get(&self.public_ip_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.public_ip_url, error = %e, "public address lookup failed");
                return None;
            }
        };
        match response.error_for_status() {
            Ok(response) => response
                .text()
                .await
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty()),
            Err(e) => {
                warn!(url = %self.public_ip_url, error = %e, "public address lookup rejected");
                None
            }
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.platform.local_interface_address()
    }
}

/// Works out this node's role from the roster.
///
/// A public address listed among the servers makes the node a server.
/// Otherwise the local address must map to exactly one tester.
pub async fn resolve<P>(roster: &Roster, probe: &P) -> Result<NodeIdentity, ResolutionError>
where
    P: AddressProbe + ?Sized,
{
    match probe.public_address().await {
        Some(public) if roster.is_server(&public) => {
            info!(address = %public, "public address is in the server roster");
            return Ok(NodeIdentity::server(public));
        }
        Some(public) => debug!(address = %public, "public address is not a server"),
        None => warn!("public address unavailable, trying tester lookup"),
    }

    let local = probe
        .local_address()
        .ok_or(ResolutionError::NoLocalAddress)?
        .to_string();

    match roster.testers_for(&local).as_slice() {
        [] => Err(ResolutionError::UnknownHost(local)),
        [tester] => {
            info!(address = %local, tester = %tester, "resolved tester identity");
            Ok(NodeIdentity::client(local.clone(), *tester))
        }
        many => Err(ResolutionError::AmbiguousHost {
            address: local.clone(),
            testers: many.iter().map(|t| t.to_string()).collect(),
        }),
    }
}
