use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::DecodeError;

/// What an envelope asks a tester to do.
///
/// Anything that is not one of the four known words is kept verbatim so it
/// can be logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Start,
    Stop,
    Update,
    /// Progress notice. Never triggers an operation.
    Status,
    Other(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Update => "update",
            Operation::Status => "status",
            Operation::Other(other) => other,
        }
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        match value.as_str() {
            "start" => Operation::Start,
            "stop" => Operation::Stop,
            "update" => Operation::Update,
            "status" => Operation::Status,
            _ => Operation::Other(value),
        }
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        match value {
            Operation::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON object exchanged on every fleet topic.
///
/// Absent fields are omitted on the wire, so a `stop` command is just
/// `{"operation":"stop","tester":"AR"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn start(tester: impl Into<String>, testname: impl Into<String>) -> Self {
        Self {
            operation: Some(Operation::Start),
            tester: Some(tester.into()),
            testname: Some(testname.into()),
            message: None,
        }
    }

    pub fn stop(tester: impl Into<String>) -> Self {
        Self {
            operation: Some(Operation::Stop),
            tester: Some(tester.into()),
            ..Default::default()
        }
    }

    pub fn update() -> Self {
        Self {
            operation: Some(Operation::Update),
            ..Default::default()
        }
    }

    /// "Who did what" notice published after a dispatch.
    pub fn status(performed: &Operation, tester: &str) -> Self {
        Self {
            operation: Some(Operation::Status),
            tester: Some(tester.to_string()),
            testname: None,
            message: Some(format!(
                "{} Operation performed by {tester}",
                performed.as_str().to_uppercase()
            )),
        }
    }

    pub fn is_status(&self) -> bool {
        matches!(self.operation, Some(Operation::Status))
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// An envelope together with the topic it is headed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub envelope: Envelope,
}

impl Outbound {
    pub fn new(topic: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            topic: topic.into(),
            envelope,
        }
    }
}
