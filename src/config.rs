use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Startup faults. These abort the process before any scenario executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A named credential pair used as scenario input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

/// Harness configuration
///
/// Layering: built-in defaults, then a YAML config file, then `API_SMOKE_*`
/// environment variables, then CLI flags (applied by the caller).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Base URL all scenario paths are joined against
    pub base_url: String,

    /// Per-request timeout (ms)
    pub timeout_ms: u64,

    /// Dispatch session-independent scenarios concurrently
    pub concurrent: bool,

    /// Output directory for generated reports
    pub output_dir: PathBuf,

    /// Named credential pairs, referenced from suites as ${<name>.email}
    /// and ${<name>.password}
    pub credentials: HashMap<String, Credential>,
}

impl Default for Config {
    fn default() -> Self {
        let mut credentials = HashMap::new();
        // Seeded demo account of the target platform; override via config
        // file or environment for any other deployment.
        credentials.insert(
            "demo".to_string(),
            Credential {
                email: "demo.user.2025@kairo.test".to_string(),
                password: "DemoAccess2025!".to_string(),
            },
        );

        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
            concurrent: false,
            output_dir: PathBuf::from("./output"),
            credentials,
        }
    }
}

impl Config {
    /// Load configuration: defaults, overlaid by `file` (when given),
    /// overlaid by environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
                        path: path.to_path_buf(),
                        source,
                    })?;
                serde_yaml::from_str(&content).map_err(|source| ConfigError::Malformed {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Overlay `API_SMOKE_*` environment variables
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("API_SMOKE_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(timeout) = std::env::var("API_SMOKE_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.timeout_ms = ms,
                Err(_) => log::warn!("ignoring non-numeric API_SMOKE_TIMEOUT_MS: {timeout}"),
            }
        }
        if let Ok(dir) = std::env::var("API_SMOKE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }

    /// Validate and parse the base URL. Called once at startup; a failure
    /// here is fatal (exit 2) before any scenario runs.
    pub fn validated_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(url)
    }
}
