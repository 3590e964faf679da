//! Error classification for provider responses
//!
//! Providers disagree wildly about how they report exhaustion, so the
//! string heuristics live here in one place where they can be unit-tested
//! against captured payloads instead of being scattered through adapters.

use http::StatusCode;

use crate::error::ProviderError;

/// Substrings that mark a body as a quota/billing failure regardless of
/// status code. The provider's own signal beats our internal counters.
const QUOTA_MARKERS: &[&str] = &["quota", "billing", "limit", "exceeded", "insufficient"];

/// Classify a non-success HTTP response from a provider
pub fn classify_http_failure(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = format!("{provider} returned {status}: {body}");

    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PAYMENT_REQUIRED {
        return ProviderError::Quota(message);
    }

    let lowered = body.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return ProviderError::Quota(message);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::Permanent(message);
    }

    if status.is_server_error() {
        return ProviderError::Transient(message);
    }

    ProviderError::Permanent(message)
}

/// Classify a transport-level failure (no HTTP response received)
///
/// Timeouts follow the transient-retry path, never the quota path.
pub fn classify_transport_error(provider: &str, error: &reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        return ProviderError::Transient(format!("{provider} request timed out"));
    }
    ProviderError::Transient(format!("{provider} request failed: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_is_quota() {
        let body = r#"{"error":{"message":"Rate limit reached for model","type":"tokens"}}"#;
        let err = classify_http_failure("groq", StatusCode::TOO_MANY_REQUESTS, body);
        assert!(err.is_quota());
    }

    #[test]
    fn resource_exhausted_body_is_quota() {
        // Gemini reports exhaustion as a 429 with a RESOURCE_EXHAUSTED status
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for quota metric","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_http_failure("gemini", StatusCode::TOO_MANY_REQUESTS, body);
        assert!(err.is_quota());
    }

    #[test]
    fn billing_marker_beats_status_code() {
        let body = r#"{"error":"insufficient funds, check your billing settings"}"#;
        let err = classify_http_failure("groq", StatusCode::FORBIDDEN, body);
        assert!(err.is_quota());
    }

    #[test]
    fn server_error_is_transient() {
        let err = classify_http_failure("gemini", StatusCode::BAD_GATEWAY, "upstream connect error");
        assert!(err.is_transient());
    }

    #[test]
    fn unauthorized_is_permanent() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        let err = classify_http_failure("groq", StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[test]
    fn bad_request_is_permanent() {
        let body = r#"{"error":{"message":"messages must not be empty"}}"#;
        let err = classify_http_failure("groq", StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[test]
    fn message_carries_provider_and_status() {
        let err = classify_http_failure("tavily", StatusCode::BAD_GATEWAY, "boom");
        assert!(err.to_string().contains("tavily"));
        assert!(err.to_string().contains("502"));
    }
}
