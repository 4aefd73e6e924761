use crate::application::animation::SmoothingSettings;
use crate::application::coordinator::SessionSettings;
use crate::application::error::SessionError;
use crate::application::reconnect::ReconnectSettings;
use crate::application::transport::TransportMode;
use crate::domain::gauge::GaugeRanges;
use crate::domain::history::DEFAULT_HISTORY_CAPACITY;
use anyhow::Context;
use config::builder::DefaultState;
use config::ConfigBuilder;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 2000;

/// Local settings, read from `config/dashboard.*` and `ENGINE_DASHBOARD__*`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    /// Origin of the engine backend, the equivalent of the page origin
    pub origin: String,
    pub streaming_port: u16,
    pub streaming_path: String,
    pub config_path: String,
    pub request_timeout_ms: u64,
    /// Pins the transport and skips the remote configuration lookup
    pub transport: Option<RuntimeConfig>,
    pub history: HistorySettings,
    pub reconnect: ReconnectSettings,
    pub smoothing: SmoothingSettings,
    pub gauges: GaugeRanges,
    pub server: ServerSettings,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            streaming_port: 8000,
            streaming_path: "/ws".to_string(),
            config_path: "/api/config".to_string(),
            request_timeout_ms: 10_000,
            transport: None,
            history: HistorySettings::default(),
            reconnect: ReconnectSettings::default(),
            smoothing: SmoothingSettings::default(),
            gauges: GaugeRanges::default(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistorySettings {
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_settings(&self, runtime: &RuntimeConfig) -> SessionSettings {
        SessionSettings {
            history_capacity: runtime.history_capacity.unwrap_or(self.history.capacity).max(1),
            reconnect: self.reconnect,
            smoothing: self.smoothing,
            gauges: self.gauges,
        }
    }

    /// `ws(s)://<origin host>:<streaming_port><streaming_path>`
    pub fn same_origin_streaming_url(&self) -> String {
        let (scheme, host) = match Url::parse(&self.origin) {
            Ok(url) => {
                let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
                (scheme, url.host_str().unwrap_or("localhost").to_string())
            }
            Err(e) => {
                tracing::warn!("Invalid origin {:?} ({}); assuming localhost", self.origin, e);
                ("ws", "localhost".to_string())
            }
        };
        format!("{}://{}:{}{}", scheme, host, self.streaming_port, self.streaming_path)
    }
}

/// Transport selection, read once at startup.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: TransportMode,
    #[serde(default)]
    pub streaming_url: Option<String>,
    #[serde(default)]
    pub rest_base_url: Option<String>,
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    #[serde(default)]
    pub history_capacity: Option<usize>,
    /// Polling mode: command name to request path, on top of the bridge routes
    #[serde(default)]
    pub command_paths: BTreeMap<String, String>,
}

fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL_MS
}

impl RuntimeConfig {
    /// Streaming against the backend origin; used whenever nothing better is known.
    pub fn same_origin(config: &DashboardConfig) -> Self {
        Self {
            mode: TransportMode::Streaming,
            streaming_url: Some(config.same_origin_streaming_url()),
            rest_base_url: Some(config.origin.clone()),
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
            history_capacity: None,
            command_paths: BTreeMap::new(),
        }
    }

    pub fn streaming_url(&self, config: &DashboardConfig) -> String {
        self.streaming_url
            .clone()
            .unwrap_or_else(|| config.same_origin_streaming_url())
    }

    pub fn rest_base_url(&self, config: &DashboardConfig) -> String {
        self.rest_base_url
            .as_deref()
            .unwrap_or(&config.origin)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms.max(1))
    }
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("ENGINE_DASHBOARD")
                .separator("__")
                .try_parsing(true),
        );
    build_dashboard_config(builder)
}

fn build_dashboard_config(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<DashboardConfig> {
    let settings = builder.build()?;
    let config: DashboardConfig = settings.try_deserialize()?;

    config
        .smoothing
        .spring()
        .validate()
        .context("invalid smoothing settings")?;

    Ok(config)
}

/// Pick the transport: local override, then the backend's configuration
/// endpoint, then streaming on the same origin. Never fails.
pub async fn resolve_runtime_config(
    config: &DashboardConfig,
    client: &reqwest::Client,
) -> RuntimeConfig {
    if let Some(pinned) = &config.transport {
        tracing::info!("Using locally configured {} transport", pinned.mode);
        return pinned.clone();
    }

    match fetch_runtime_config(config, client).await {
        Ok(remote) => {
            tracing::info!("Backend selected {} transport", remote.mode);
            remote
        }
        Err(e) => {
            let fallback = RuntimeConfig::same_origin(config);
            tracing::warn!(
                "{}; falling back to streaming at {}",
                e,
                fallback.streaming_url.as_deref().unwrap_or_default()
            );
            fallback
        }
    }
}

async fn fetch_runtime_config(
    config: &DashboardConfig,
    client: &reqwest::Client,
) -> Result<RuntimeConfig, SessionError> {
    let url = format!("{}{}", config.origin.trim_end_matches('/'), config.config_path);
    let unavailable = |e: reqwest::Error| SessionError::ConfigurationUnavailable(e.to_string());

    let response = client.get(&url).send().await.map_err(unavailable)?;
    if !response.status().is_success() {
        return Err(SessionError::ConfigurationUnavailable(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }
    response.json::<RuntimeConfig>().await.map_err(unavailable)
}
