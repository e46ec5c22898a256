//! Client configuration, built once at startup and passed down explicitly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{OmixError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Sent as `Authorization: Token <token>`.
    pub token: Option<String>,
    /// Sent as `X-CSRFToken`.
    pub csrf_token: Option<String>,
    /// Sent as the `sessionid` cookie.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { max_delay_secs: 30 }
    }
}

/// Backend paths, relative to `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub experiments: String,
    pub stop_experiment: String,
    pub results: String,
    pub statistical_properties: String,
    pub correlation_graph: String,
    pub survival: String,
    pub mirna_target_interactions: String,
    pub mirna_interactions: String,
    pub mirna_diseases: String,
    pub mirna_drugs: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            experiments: "/api-service/user-experiments".into(),
            stop_experiment: "/api-service/stop-experiment".into(),
            results: "/api-service/experiment-result".into(),
            statistical_properties: "/api-service/statistical-properties".into(),
            correlation_graph: "/api-service/correlation-graph".into(),
            survival: "/api-service/survival".into(),
            mirna_target_interactions: "/api-service/mirna-target-interactions".into(),
            mirna_interactions: "/api-service/mirna-interactions".into(),
            mirna_diseases: "/api-service/mirna-diseases".into(),
            mirna_drugs: "/api-service/mirna-drugs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Defaults to `base_url` with a `ws`/`wss` scheme.
    pub ws_url: Option<String>,
    pub user_id: Option<u64>,
    pub auth: AuthConfig,
    pub request_timeout_secs: u64,
    /// Quiet period before a table change or a pushed command takes effect.
    pub debounce_ms: u64,
    pub max_tabs: usize,
    pub page_size: u32,
    /// CNA correlations with at most this many distinct GEM values are drawn
    /// as box plots.
    pub cna_boxplot_max_distinct: usize,
    pub reconnect: ReconnectConfig,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            ws_url: None,
            user_id: None,
            auth: AuthConfig::default(),
            request_timeout_secs: 30,
            debounce_ms: 300,
            max_tabs: 5,
            page_size: 10,
            cna_boxplot_max_distinct: 5,
            reconnect: ReconnectConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    /// Loads a YAML config file. Missing keys take their defaults; a missing
    /// file yields the default config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), base_url = %config.base_url, "Loaded client config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(OmixError::Config(format!(
                "base_url must be http or https, got {}",
                base.scheme()
            )));
        }
        if self.max_tabs == 0 {
            return Err(OmixError::Config("max_tabs must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(OmixError::Config("page_size must be at least 1".into()));
        }
        Ok(())
    }

    fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| OmixError::Config(format!("invalid base_url {}: {}", self.base_url, e)))
    }

    /// Absolute URL of a backend path.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        self.base()?
            .join(path)
            .map_err(|e| OmixError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// `/ws/users/{user_id}/` on the websocket host.
    pub fn websocket_url(&self, user_id: u64) -> Result<Url> {
        let mut root = match &self.ws_url {
            Some(raw) => Url::parse(raw)
                .map_err(|e| OmixError::Config(format!("invalid ws_url {}: {}", raw, e)))?,
            None => {
                let mut url = self.base()?;
                let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
                url.set_scheme(scheme)
                    .map_err(|_| OmixError::Config("cannot derive websocket url".into()))?;
                url
            }
        };
        root.set_path(&format!("/ws/users/{}/", user_id));
        Ok(root)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
