use http::StatusCode;

/// Error that knows how it should look on the wire
///
/// Crates that fail requests implement this; only `mosaic-server` turns it
/// into an axum response.
pub trait HttpError: std::error::Error {
    fn status_code(&self) -> StatusCode;

    /// Stable machine tag such as `rate_limit_error`
    fn error_type(&self) -> &str;

    /// Text shown to the caller, free of upstream internals
    fn client_message(&self) -> String;
}
