//! # testfleet
//!
//! `testfleet` distributes test commands across a fleet of tester machines
//! over MQTT. An operator server publishes `start`, `stop` and `update`
//! commands; every tester runs a long-lived client that launches the
//! matching local script and announces what it did.
//!
//! ## Core Modules
//!
//! - `config`: Layered settings and the startup file check.
//! - `identity`: Works out whether this node is the server or which tester it is.
//! - `topics`: The topic tree and the subscriptions each role needs.
//! - `transport`: The command envelope and the self-healing broker session.
//! - `client`: Command routing and process launching on testers.
//! - `server`: Command publishing and the operator console.
//! - `platform`: Host differences between Windows and Unix testers.
//! - `utils`: Error types and logging setup.

pub mod client;
pub mod config;
pub mod identity;
pub mod platform;
pub mod server;
pub mod topics;
pub mod transport;
pub mod utils;
