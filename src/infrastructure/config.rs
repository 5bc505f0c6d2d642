use crate::domain::threshold::UnknownTagPolicy;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub feed: FeedSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub thresholds: ThresholdSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    /// Steady-state telemetry feed, e.g. `ws://localhost:1880/ws/opcua`.
    pub live_url: String,
    /// History backfill and threshold push channel.
    pub control_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    #[serde(default = "default_idle_minutes")]
    pub session_idle_minutes: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_idle_minutes: default_idle_minutes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ThresholdSettings {
    #[serde(default)]
    pub unknown_tag_policy: UnknownTagPolicy,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_idle_minutes() -> u64 {
    30
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
