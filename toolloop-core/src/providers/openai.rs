// toolloop-core/src/providers/openai.rs
use super::Provider;
use crate::api;
use crate::config::{ModelConfig, RetryConfig};
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, trace, warn};

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Provider for any gateway speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAIProvider {
    config: ModelConfig,
    http_client: Client,
    api_key: String,
    retry: RetryConfig,
}

impl OpenAIProvider {
    pub fn new(config: ModelConfig, http_client: Client, api_key: String, retry: RetryConfig) -> Self {
        Self {
            config,
            http_client,
            api_key,
            retry,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_ENDPOINT)
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.model_name
    }

    async fn get_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse> {
        if self.config.endpoint.is_none() {
            trace!(
                model = %self.config.model_name,
                "No endpoint configured, using default: {}",
                DEFAULT_OPENAI_ENDPOINT
            );
        }
        if self.api_key.is_empty() && self.endpoint() == DEFAULT_OPENAI_ENDPOINT {
            warn!(
                "API key is empty for OpenAI provider model {}. The API call will likely fail.",
                self.config.model_name
            );
        }

        let result = api::call_chat_completion_api(
            &self.http_client,
            self.endpoint(),
            &self.api_key,
            &self.config.model_name,
            messages,
            tools,
            self.config.parameters.as_ref(),
            &self.retry,
        )
        .await;

        if let Err(e) = &result {
            error!(error = %e, model = %self.config.model_name, "Chat completion failed");
        }
        result
    }
}
