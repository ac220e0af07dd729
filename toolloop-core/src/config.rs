// toolloop-core/src/config.rs

//! Handles configuration structures and parsing for the agent library.
//!
//! Configuration is plain data. Secrets are referenced by environment variable
//! name and resolved by the host ([`ProviderInstanceConfig::resolve_api_key`]),
//! never from inside the loop.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAX_ROUNDS: usize = 8;
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 60;

#[derive(Deserialize, Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    pub default_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderInstanceConfig>,
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProviderInstanceConfig {
    // Use `type` in TOML, map to `provider_type`
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub api_key_env_var: String,
    pub model_config: ModelConfig,
}

impl ProviderInstanceConfig {
    /// Reads the API key named by `api_key_env_var` from the process
    /// environment. Returns an empty key when no variable is configured.
    pub fn resolve_api_key(&self) -> Result<String> {
        if self.api_key_env_var.is_empty() {
            return Ok(String::new());
        }
        std::env::var(&self.api_key_env_var).with_context(|| {
            format!(
                "API key environment variable '{}' is not set",
                self.api_key_env_var
            )
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default)]
    pub parameters: Option<toml::Value>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Bounds on a single run of the tool loop.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    /// Maximum number of oracle round-trips before `ToolLoopExceeded`.
    pub max_rounds: usize,
    pub oracle_timeout_secs: u64,
    /// Extra attempts for an oracle call that timed out. 0 = surface at once.
    pub timeout_retries: u32,
    /// Base delay before a timeout retry; doubles on each further attempt.
    pub timeout_retry_delay_ms: u64,
    pub parallel_tool_calls: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            oracle_timeout_secs: DEFAULT_ORACLE_TIMEOUT_SECS,
            timeout_retries: 0,
            timeout_retry_delay_ms: 500,
            parallel_tool_calls: true,
        }
    }
}

impl LoopConfig {
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn timeout_retry_delay(&self) -> Duration {
        Duration::from_millis(self.timeout_retry_delay_ms)
    }
}

/// HTTP-level retry policy for 429, 5xx and network errors.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl AgentConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<AgentConfig> {
        let config: AgentConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        // --- Basic Checks ---
        if config.system_prompt.trim().is_empty() {
            return Err(anyhow!("'system_prompt' in config content is empty."));
        }
        if config.default_provider.trim().is_empty() {
            return Err(anyhow!("'default_provider' key in config content is empty."));
        }
        if !config.providers.contains_key(&config.default_provider) {
            return Err(anyhow!(
                "Default provider '{}' not found in [providers] map.",
                config.default_provider
            ));
        }

        // --- Provider Validation ---
        for (key, provider) in &config.providers {
            if provider.provider_type.trim().is_empty() {
                return Err(anyhow!("Provider '{}' is missing 'type'.", key));
            }
            if provider.provider_type != "openai" {
                return Err(anyhow!(
                    "Provider '{}' has unsupported type '{}'. Supported: openai.",
                    key,
                    provider.provider_type
                ));
            }
            if provider.model_config.model_name.trim().is_empty() {
                return Err(anyhow!(
                    "Provider '{}' is missing 'model_config.model_name'.",
                    key
                ));
            }
            if let Some(endpoint) = &provider.model_config.endpoint {
                if endpoint.trim().is_empty() {
                    return Err(anyhow!(
                        "Provider '{}' has an empty 'model_config.endpoint'.",
                        key
                    ));
                }
                Url::parse(endpoint).with_context(|| {
                    format!(
                        "Invalid URL format for endpoint ('{}') in provider '{}'.",
                        endpoint, key
                    )
                })?;
            }
            if let Some(params) = &provider.model_config.parameters {
                if !params.is_table() {
                    return Err(anyhow!(
                        "Provider '{}' has invalid 'model_config.parameters'. Expected a TOML table.",
                        key
                    ));
                }
            }
        }

        // --- Loop Validation ---
        if config.loop_settings.max_rounds == 0 {
            return Err(anyhow!("'loop.max_rounds' must be at least 1."));
        }
        if config.loop_settings.oracle_timeout_secs == 0 {
            return Err(anyhow!("'loop.oracle_timeout_secs' must be at least 1."));
        }
        if config.retry.initial_delay_ms > config.retry.max_delay_ms {
            return Err(anyhow!(
                "'retry.initial_delay_ms' ({}) exceeds 'retry.max_delay_ms' ({}).",
                config.retry.initial_delay_ms,
                config.retry.max_delay_ms
            ));
        }

        tracing::info!("Successfully parsed and validated agent configuration.");
        Ok(config)
    }
}
