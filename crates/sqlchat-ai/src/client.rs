//! LLM API client for SQL generation

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GenerationError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";

/// Anything that can turn a system + user prompt into query text.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(
        &self,
        system_message: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError>;
}

/// LLM provider configuration
#[derive(Clone)]
pub enum LlmProvider {
    OpenAI {
        api_key: String,
        model: String,
        base_url: String,
    },
    Anthropic {
        api_key: String,
        model: String,
        base_url: String,
    },
}

/// Provider credentials and model names as read at startup.
#[derive(Clone)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_api_base: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_api_base: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            anthropic_api_key: None,
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            anthropic_api_base: DEFAULT_ANTHROPIC_API_BASE.to_string(),
        }
    }
}

impl LlmProvider {
    /// Pick a provider from settings. OpenAI wins when both keys are present.
    pub fn from_settings(settings: &LlmSettings) -> Option<Self> {
        let non_empty = |k: &Option<String>| k.as_ref().filter(|k| !k.is_empty()).cloned();

        if let Some(api_key) = non_empty(&settings.openai_api_key) {
            Some(LlmProvider::OpenAI {
                api_key,
                model: settings.openai_model.clone(),
                base_url: settings.openai_api_base.trim_end_matches('/').to_string(),
            })
        } else {
            non_empty(&settings.anthropic_api_key).map(|api_key| LlmProvider::Anthropic {
                api_key,
                model: settings.anthropic_model.clone(),
                base_url: settings.anthropic_api_base.trim_end_matches('/').to_string(),
            })
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI { .. } => "OpenAI",
            LlmProvider::Anthropic { .. } => "Anthropic",
        }
    }
}

// API keys never appear in debug output.
impl fmt::Debug for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (model, base_url) = match self {
            LlmProvider::OpenAI { model, base_url, .. }
            | LlmProvider::Anthropic { model, base_url, .. } => (model, base_url),
        };
        f.debug_struct(self.name())
            .field("api_key", &"****")
            .field("model", model)
            .field("base_url", base_url)
            .finish()
    }
}

/// LLM client for generating SQL
///
/// A client without a provider is valid; every call on it fails with
/// [`GenerationError::MissingCredential`].
#[derive(Debug)]
pub struct LlmClient {
    provider: Option<LlmProvider>,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: Option<LlmProvider>) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(LlmProvider::from_settings(settings))
    }

    /// Name of the configured provider, if any.
    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(LlmProvider::name)
    }

    /// Generate a response from the LLM
    pub async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        match &self.provider {
            Some(LlmProvider::OpenAI {
                api_key,
                model,
                base_url,
            }) => {
                self.call_openai(api_key, model, base_url, system_prompt, user_prompt)
                    .await
            }
            Some(LlmProvider::Anthropic {
                api_key,
                model,
                base_url,
            }) => {
                self.call_anthropic(api_key, model, base_url, system_prompt, user_prompt)
                    .await
            }
            None => Err(GenerationError::MissingCredential),
        }
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        base_url: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<OpenAIMessage<'a>>,
            temperature: f32,
        }

        #[derive(Serialize)]
        struct OpenAIMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageContent,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageContent {
            content: Option<String>,
        }

        let request = OpenAIRequest {
            model,
            messages: vec![
                OpenAIMessage {
                    role: "system",
                    content: system_prompt,
                },
                OpenAIMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.1,
        };

        debug!(
            "Calling OpenAI-compatible API at {} with model: {}",
            base_url, model
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response: OpenAIResponse = read_json("OpenAI", response).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(GenerationError::EmptyResponse("OpenAI"))?;

        info!("Received response from OpenAI");
        Ok(content)
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        base_url: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            system: &'a str,
            messages: Vec<AnthropicMessage<'a>>,
        }

        #[derive(Serialize)]
        struct AnthropicMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: Option<String>,
        }

        let request = AnthropicRequest {
            model,
            max_tokens: 4096,
            system: system_prompt,
            messages: vec![AnthropicMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        debug!("Calling Anthropic API at {} with model: {}", base_url, model);

        let response = self
            .client
            .post(format!("{}/v1/messages", base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response: AnthropicResponse = read_json("Anthropic", response).await?;
        let content = response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or(GenerationError::EmptyResponse("Anthropic"))?;

        info!("Received response from Anthropic");
        Ok(content)
    }
}

#[async_trait]
impl SqlGenerator for LlmClient {
    async fn generate_sql(
        &self,
        system_message: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        self.generate(system_message, user_prompt).await
    }
}

/// Check the status, then decode the body.
async fn read_json<T: DeserializeOwned>(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<T, GenerationError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(GenerationError::Provider {
            provider,
            status,
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| GenerationError::Decode {
        provider,
        message: e.to_string(),
    })
}
