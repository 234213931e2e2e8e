use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration settings for a fleet node.
///
/// Built once at startup and handed to each component; nothing reads
/// configuration from ambient state after this point.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub mqtt: MqttSettings,
    pub reconnect: ReconnectSettings,
    pub paths: PathSettings,
    pub identity: IdentitySettings,
    pub log: LogSettings,
}

/// Broker address and the static credential pair.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
}

impl MqttSettings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Reconnect pacing for the transport session.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReconnectSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub liveness_interval_ms: u64,
}

/// Where the static files and the operation scripts live.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PathSettings {
    pub credentials_dir: PathBuf,
    pub script_root: Option<PathBuf>,
}

impl PathSettings {
    pub fn topics_file(&self) -> PathBuf {
        self.credentials_dir.join("topics.json")
    }

    pub fn roster_file(&self) -> PathBuf {
        self.credentials_dir.join("vmInfo.json")
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IdentitySettings {
    /// Endpoint that answers with the caller's public address as plain text.
    pub public_ip_url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; `load_config` fills the gaps from defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub mqtt: Option<PartialMqttSettings>,
    pub reconnect: Option<PartialReconnectSettings>,
    pub paths: Option<PartialPathSettings>,
    pub identity: Option<PartialIdentitySettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialMqttSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialReconnectSettings {
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub liveness_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialPathSettings {
    pub credentials_dir: Option<PathBuf>,
    pub script_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialIdentitySettings {
    pub public_ip_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt: MqttSettings {
                host: "localhost".to_string(),
                port: 1883,
                username: None,
                password: None,
                keep_alive_secs: 60,
                connect_timeout_secs: 10,
            },
            reconnect: ReconnectSettings {
                initial_delay_ms: 1_000,
                max_delay_ms: 30_000,
                liveness_interval_ms: 5_000,
            },
            paths: PathSettings {
                credentials_dir: PathBuf::from("credentials"),
                script_root: None,
            },
            identity: IdentitySettings {
                public_ip_url: "https://ifconfig.me/ip".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
