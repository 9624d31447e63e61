//! Serializable endpoint configuration.
//!
//! # Design
//! Only plain data lives here: base URL, default headers, encoding, URL
//! mode and stubbing defaults. Transports, adapters and executors are code
//! and are supplied to [`EndpointBuilder`](crate::EndpointBuilder) directly.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::ParameterEncoding;
use crate::stub::DEFAULT_STUB_DELAY;
use crate::url_builder::UrlMode;

pub const ENV_BASE_URL: &str = "TYPED_HTTP_BASE_URL";
pub const ENV_STUBBING: &str = "TYPED_HTTP_STUBBING";
pub const ENV_STUB_DELAY_MS: &str = "TYPED_HTTP_STUB_DELAY_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no transport configured and the `reqwest` feature is disabled")]
    MissingTransport,

    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidVar { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub encoding: ParameterEncoding,
    pub url_behavior: UrlMode,
    pub stubbing_enabled: bool,
    pub stub_delay_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: BTreeMap::new(),
            encoding: ParameterEncoding::default(),
            url_behavior: UrlMode::default(),
            stubbing_enabled: false,
            stub_delay_ms: DEFAULT_STUB_DELAY.as_millis() as u64,
        }
    }
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read the base URL and stubbing defaults from `TYPED_HTTP_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_BASE_URL).ok_or(ConfigError::MissingVar(ENV_BASE_URL))?;
        let mut config = Self::new(base_url);

        if let Some(value) = lookup(ENV_STUBBING) {
            config.stubbing_enabled = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidVar { var: ENV_STUBBING, value }),
            };
        }
        if let Some(value) = lookup(ENV_STUB_DELAY_MS) {
            config.stub_delay_ms = value
                .parse()
                .map_err(|_| ConfigError::InvalidVar { var: ENV_STUB_DELAY_MS, value })?;
        }
        Ok(config)
    }

    pub fn stub_delay(&self) -> Duration {
        Duration::from_millis(self.stub_delay_ms)
    }
}
