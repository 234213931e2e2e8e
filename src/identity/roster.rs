use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::utils::ConfigError;

const ROSTER_FILE: &str = "vmInfo.json";

/// Static map of which hosts are operator servers and which are testers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    server_hosts: BTreeSet<String>,
    testers: Vec<TesterEntry>,
    script_paths: ScriptPaths,
}

/// One tester and every address its machine may present.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TesterEntry {
    pub tester: String,
    #[serde(default)]
    pub hosts: Vec<String>,
}

/// Per-platform location of the operation scripts.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ScriptPaths {
    #[serde(rename = "WIN_SCRIPT_PATH")]
    pub windows: Option<String>,
    #[serde(rename = "LIN_SCRIPT_PATH")]
    pub unix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(rename = "VMINFO")]
    vm_info: Option<Vec<ServerGroup>>,
    #[serde(rename = "PATHINFO", default)]
    path_info: ScriptPaths,
    #[serde(rename = "TESTERINFO")]
    tester_info: Option<Vec<TesterEntry>>,
}

#[derive(Debug, Deserialize)]
struct ServerGroup {
    #[serde(default)]
    info: Vec<HostGroup>,
}

#[derive(Debug, Deserialize)]
struct HostGroup {
    #[serde(default)]
    hosts: Vec<String>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: RosterFile = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_file(file)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: RosterFile = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: ROSTER_FILE.into(),
            source,
        })?;
        Self::from_file(file)
    }

    pub fn new(
        server_hosts: impl IntoIterator<Item = impl Into<String>>,
        testers: Vec<TesterEntry>,
    ) -> Self {
        Self {
            server_hosts: server_hosts.into_iter().map(Into::into).collect(),
            testers,
            script_paths: ScriptPaths::default(),
        }
    }

    fn from_file(file: RosterFile) -> Result<Self, ConfigError> {
        let vm_info = file.vm_info.ok_or(ConfigError::MissingKey {
            file: ROSTER_FILE,
            key: "VMINFO",
        })?;
        let testers = file.tester_info.ok_or(ConfigError::MissingKey {
            file: ROSTER_FILE,
            key: "TESTERINFO",
        })?;

        let server_hosts = vm_info
            .into_iter()
            .flat_map(|group| group.info)
            .flat_map(|info| info.hosts)
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            server_hosts,
            testers,
            script_paths: file.path_info,
        })
    }

    pub fn is_server(&self, address: &str) -> bool {
        self.server_hosts.contains(address.trim())
    }

    /// Every tester whose host list contains `address`.
    pub fn testers_for(&self, address: &str) -> Vec<&str> {
        let address = address.trim();
        self.testers
            .iter()
            .filter(|entry| entry.hosts.iter().any(|h| h.trim() == address))
            .map(|entry| entry.tester.as_str())
            .collect()
    }

    pub fn script_paths(&self) -> &ScriptPaths {
        &self.script_paths
    }
}
