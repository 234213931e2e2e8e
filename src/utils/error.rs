//! The `error` module defines the error types used within `testfleet`.
//!
//! Errors fall into the same buckets the process treats differently at
//! runtime: configuration and identity problems are fatal at startup,
//! transport problems are retried by the session, and decode problems only
//! ever cost a single message.

use std::path::PathBuf;

/// Top-level error returned by the startup and run paths.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("identity resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or missing local configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("missing or empty required files: {}", display_paths(.0))]
    MissingFiles(Vec<PathBuf>),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{file}: required key `{key}` is absent")]
    MissingKey { file: &'static str, key: &'static str },

    #[error("`{key}` has invalid value `{value}`")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid topic tree: {0}")]
    InvalidTopics(String),
}

/// The node could not work out which role it plays.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("no routable local IPv4 address found")]
    NoLocalAddress,

    #[error("local address {0} is not listed in the tester roster")]
    UnknownHost(String),

    #[error("local address {address} maps to several testers: {}", .testers.join(", "))]
    AmbiguousHost {
        address: String,
        testers: Vec<String>,
    },
}

/// An inbound payload that is not a command envelope.
#[derive(Debug, thiserror::Error)]
#[error("malformed envelope: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

/// Broker link failures. Recoverable: the session retries them.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection timed out")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("subscribe to {topic} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    #[error("publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("envelope encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
