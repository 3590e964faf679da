use http::StatusCode;
use relay_core::HttpError;
use thiserror::Error;

/// Classified failure from a provider call
///
/// The classification drives the orchestrator's retry policy, so getting
/// it right matters more than the message text.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider-reported exhaustion: rate limit, quota, billing,
    /// insufficient funds. Never retried on the same provider within a
    /// turn.
    #[error("quota exhausted: {0}")]
    Quota(String),

    /// Timeout, connection failure, or upstream 5xx. Retried with
    /// failover, bounded attempts.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Malformed request or rejected credentials. Not retried.
    #[error("permanent provider failure: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub const fn is_quota(&self) -> bool {
        matches!(self, Self::Quota(_))
    }

    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failure at the conversation-store boundary
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or lost the operation
    #[error("conversation store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a whole user turn
///
/// Quota exhaustion across all providers is deliberately NOT represented
/// here — it degrades to a fallback outcome instead of an error.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Prompt was empty or whitespace
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// Named provider does not exist in configuration
    #[error("unknown provider: {provider}")]
    UnknownProvider { provider: String },

    /// Named provider is currently quota-flagged
    #[error("provider unavailable until quota reset: {provider}")]
    ProviderUnavailable { provider: String },

    /// A provider failed permanently, or transient retries were spent
    #[error(transparent)]
    Provider(ProviderError),

    /// Conversation persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HttpError for TurnError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyPrompt | Self::UnknownProvider { .. } | Self::ProviderUnavailable { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::EmptyPrompt => "invalid_request_error",
            Self::UnknownProvider { .. } => "not_found_error",
            Self::ProviderUnavailable { .. } => "provider_unavailable_error",
            Self::Provider(_) => "upstream_error",
            Self::Store(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Provider(_) => "the AI provider could not complete this request".to_owned(),
            Self::Store(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
