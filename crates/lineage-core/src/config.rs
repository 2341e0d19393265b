use config as cfg;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::{LineageError, Result};

/// Connection and fetch settings for a lineage session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Base URL of the metadata service.
    #[serde(default = "LineageConfig::default_base_url")]
    pub base_url: String,
    /// Optional bearer token for the metadata service.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<SecretString>,
    /// Client-side fetch timeout. A hung fetch is converted into an error
    /// state instead of blocking other expand/collapse actions.
    #[serde(default = "LineageConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Symmetric depth of the initial fetch.
    #[serde(default = "LineageConfig::default_initial_depth")]
    pub initial_depth: u32,
    /// Depth of a single-direction incremental expand.
    #[serde(default = "LineageConfig::default_expand_depth")]
    pub expand_depth: u32,
}

impl LineageConfig {
    fn default_base_url() -> String {
        "http://localhost:8585".to_string()
    }

    fn default_request_timeout_secs() -> u64 {
        30
    }

    fn default_initial_depth() -> u32 {
        2
    }

    fn default_expand_depth() -> u32 {
        2
    }

    /// Load configuration from an optional `lineage.toml` in the working
    /// directory, overridden by `LINEAGE_*` environment variables.
    pub fn load() -> Result<Self> {
        let settings = cfg::Config::builder()
            .add_source(cfg::File::with_name("lineage").required(false))
            .add_source(cfg::Environment::with_prefix("LINEAGE"))
            .build()
            .map_err(|e| LineageError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| LineageError::Config(e.to_string()))
    }
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            auth_token: None,
            request_timeout_secs: Self::default_request_timeout_secs(),
            initial_depth: Self::default_initial_depth(),
            expand_depth: Self::default_expand_depth(),
        }
    }
}
