//! Startup configuration.
//!
//! Settings are layered, lowest priority first: built-in defaults, the
//! legacy variables older deployments put in `.env` (`BROKER`, `PORT`,
//! `MQTT_USER`, `MQTT_PASS`), `config/default.toml`, and finally
//! `FLEET__SECTION__KEY` environment variables.

mod settings;


use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::error;

use crate::config::settings::PartialSettings;
use crate::utils::ConfigError;

pub use settings::{
    IdentitySettings, LogSettings, MqttSettings, PathSettings, ReconnectSettings, Settings,
};

/// Loads `.env`, then merges file and environment sources over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("FLEET")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let partial: PartialSettings = builder.build()?.try_deserialize()?;
    merge(partial, Settings::default())
}

/// Fills every gap in `partial` from the legacy variables, then `default`.
fn merge(partial: PartialSettings, default: Settings) -> Result<Settings, ConfigError> {
    let mqtt = partial.mqtt.unwrap_or_default();
    let reconnect = partial.reconnect.unwrap_or_default();
    let paths = partial.paths.unwrap_or_default();
    let identity = partial.identity.unwrap_or_default();
    let log = partial.log.unwrap_or_default();

    let port = match mqtt.port {
        Some(port) => port,
        None => match legacy_var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: raw.clone(),
            })?,
            None => default.mqtt.port,
        },
    };

    Ok(Settings {
        mqtt: MqttSettings {
            host: mqtt
                .host
                .or_else(|| legacy_var("BROKER"))
                .unwrap_or(default.mqtt.host),
            port,
            username: mqtt
                .username
                .or_else(|| legacy_var("MQTT_USER"))
                .or(default.mqtt.username),
            password: mqtt
                .password
                .or_else(|| legacy_var("MQTT_PASS"))
                .or(default.mqtt.password),
            keep_alive_secs: mqtt
                .keep_alive_secs
                .unwrap_or(default.mqtt.keep_alive_secs),
            connect_timeout_secs: mqtt
                .connect_timeout_secs
                .unwrap_or(default.mqtt.connect_timeout_secs),
        },
        reconnect: ReconnectSettings {
            initial_delay_ms: reconnect
                .initial_delay_ms
                .unwrap_or(default.reconnect.initial_delay_ms),
            max_delay_ms: reconnect
                .max_delay_ms
                .unwrap_or(default.reconnect.max_delay_ms),
            liveness_interval_ms: reconnect
                .liveness_interval_ms
                .unwrap_or(default.reconnect.liveness_interval_ms),
        },
        paths: PathSettings {
            credentials_dir: paths
                .credentials_dir
                .unwrap_or(default.paths.credentials_dir),
            script_root: paths.script_root.or(default.paths.script_root),
        },
        identity: IdentitySettings {
            public_ip_url: identity
                .public_ip_url
                .unwrap_or(default.identity.public_ip_url),
        },
        log: LogSettings {
            level: log.level.unwrap_or(default.log.level),
        },
    })
}

fn legacy_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Checks that every required file exists and is non-empty.
///
/// All offenders are logged and returned together so an operator can fix
/// them in one pass.
pub fn check_dependencies<P: AsRef<Path>>(required: &[P]) -> Result<(), ConfigError> {
    let missing: Vec<PathBuf> = required
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| match std::fs::metadata(p) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        })
        .map(Path::to_path_buf)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    for path in &missing {
        error!(path = %path.display(), "required file is missing or empty");
    }
    Err(ConfigError::MissingFiles(missing))
}
