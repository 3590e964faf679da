use http::StatusCode;

/// Trait for domain errors that map onto HTTP responses
///
/// Each feature crate implements this for its own error type. The route
/// layer turns implementations into wire responses, so domain errors stay
/// decoupled from axum.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    ///
    /// Upstream provider errors and internal details must never leak
    /// through this method.
    fn client_message(&self) -> String;
}
