//! Completion forwarding: one provider call per request, failures mapped
//! into [`ForwardError`] instead of escaping.

use crate::composer::ComposedPrompt;
use nexus_core::error::ProviderError;
use nexus_core::provider::{Provider, ProviderRequest, Usage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reply sent when no provider credential is configured.
pub const MISSING_CREDENTIAL_MESSAGE: &str = "The completion provider is not configured. \
     Set GLM_API_KEY (or provider.api_key in config.toml) to enable chat.";

/// User-visible failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigurationError,
    ProviderError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConfigurationError => "configuration_error",
            FailureKind::ProviderError => "provider_error",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForwardError {
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ForwardError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ForwardError::Configuration(_) => FailureKind::ConfigurationError,
            ForwardError::Provider(_) => FailureKind::ProviderError,
        }
    }
}

/// A successful provider reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reply: String,
    /// Model reported by the provider
    pub model: String,
    pub usage: Option<Usage>,
}

pub type CompletionResult = Result<Completion, ForwardError>;

/// Sends composed prompts to the configured provider.
pub struct CompletionForwarder {
    provider: Arc<dyn Provider>,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
}

impl CompletionForwarder {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            temperature: 0.7,
            max_tokens: None,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Overall deadline for the provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply temperature, token limit and deadline from `[provider]`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &nexus_config::ProviderConfig) -> Self {
        Self::new(provider)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Forward `prompt` to the provider as a single attempt.
    ///
    /// Without a credential this returns [`ForwardError::Configuration`]
    /// and performs no I/O.
    pub async fn forward(&self, prompt: ComposedPrompt, model: &str) -> CompletionResult {
        if !self.provider.is_configured() {
            warn!(provider = %self.provider.name(), "Chat request rejected: no API key configured");
            return Err(ForwardError::Configuration(MISSING_CREDENTIAL_MESSAGE.into()));
        }

        let request = ProviderRequest {
            model: model.to_string(),
            messages: prompt.into_messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            provider = %self.provider.name(),
            model = %model,
            messages = request.messages.len(),
            "Forwarding prompt"
        );

        let call = self.provider.complete(request);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "no response within {}s",
                    limit.as_secs()
                ))),
            },
            None => call.await,
        };

        let response = outcome.map_err(|e| {
            warn!(
                provider = %self.provider.name(),
                model = %model,
                category = e.category(),
                error = %e,
                "Completion provider call failed"
            );
            ForwardError::Provider(e)
        })?;

        Ok(Completion {
            reply: response.message.content,
            model: response.model,
            usage: response.usage,
        })
    }
}
