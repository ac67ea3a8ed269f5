//! Error types shared across the NEXUS crates.
//!
//! Uses `thiserror` for ergonomic error definitions. Bounded contexts with
//! their own failure modes (knowledge sync, configuration, forwarding)
//! define their enums next to the code that raises them.

use thiserror::Error;

/// Failures talking to a remote completion provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Short machine-readable category, used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            ProviderError::ApiError { .. } => "api",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::AuthenticationFailed(_) => "auth",
            ProviderError::MalformedResponse(_) => "malformed",
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Network(_) => "network",
        }
    }
}
