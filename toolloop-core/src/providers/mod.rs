// toolloop-core/src/providers/mod.rs

//! The oracle seam: anything that turns a conversation plus tool declarations
//! into an [`ApiResponse`].

use crate::config::{AgentConfig, ProviderInstanceConfig};
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub mod openai;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn get_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse>;
    fn name(&self) -> &str;
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new(default_provider: String) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
        }
    }

    /// Builds one provider per `[providers.<id>]` entry. API keys come from
    /// `resolve_key`, so the caller decides where secrets live.
    pub fn from_config<F>(config: &AgentConfig, http_client: Client, mut resolve_key: F) -> Result<Self>
    where
        F: FnMut(&str, &ProviderInstanceConfig) -> Result<String>,
    {
        let mut registry = Self::new(config.default_provider.clone());
        for (id, provider_conf) in &config.providers {
            let api_key = resolve_key(id, provider_conf)?;
            let provider: Arc<dyn Provider> = match provider_conf.provider_type.as_str() {
                "openai" => Arc::new(openai::OpenAIProvider::new(
                    provider_conf.model_config.clone(),
                    http_client.clone(),
                    api_key,
                    config.retry.clone(),
                )),
                other => return Err(anyhow!("Unsupported provider type: {}", other)),
            };
            registry.register(id.clone(), provider);
        }
        Ok(registry)
    }

    pub fn register(&mut self, id: String, provider: Arc<dyn Provider>) {
        debug!(provider_id = %id, "Registering provider");
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Provider not found: {}", id))
    }

    pub fn default(&self) -> Result<Arc<dyn Provider>> {
        self.get(&self.default_provider)
    }

    pub fn default_provider_id(&self) -> &str {
        &self.default_provider
    }
}
