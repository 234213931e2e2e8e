//! Identity resolution.
//!
//! A node decides once, at startup, whether it is an operator server or a
//! tester client, and which tester it is. The result never changes for the
//! lifetime of the process.

pub mod resolver;
pub mod roster;


use std::fmt;

pub use resolver::{AddressProbe, SystemProbe, resolve};
pub use roster::{Roster, ScriptPaths, TesterEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Issues commands and watches every tester.
    Server,
    /// Executes commands addressed to one tester.
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => f.write_str("server"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// Who this node is on the fleet network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub network_address: String,
    pub tester_id: Option<String>,
    pub role: Role,
}

impl NodeIdentity {
    pub fn server(network_address: impl Into<String>) -> Self {
        Self {
            network_address: network_address.into(),
            tester_id: None,
            role: Role::Server,
        }
    }

    pub fn client(network_address: impl Into<String>, tester_id: impl Into<String>) -> Self {
        Self {
            network_address: network_address.into(),
            tester_id: Some(tester_id.into()),
            role: Role::Client,
        }
    }
}
