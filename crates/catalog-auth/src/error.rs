//! Error types for session authentication

use transport::TransportError;

/// Errors from login, refresh and authenticated requests.
///
/// `Clone` because a single refresh failure is delivered to every request
/// queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error("refresh token expired")]
    RefreshExpired,

    #[error("refresh token rejected: {0}")]
    RefreshInvalid(String),

    #[error("request still unauthorized after token refresh")]
    Unauthorized,

    #[error("network failure: {0}")]
    Network(String),

    #[error("unexpected response ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("token decode failed: {0}")]
    TokenDecode(String),

    #[error("token storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether this error ended the session (the UI should show the login surface).
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Error::NoRefreshToken | Error::RefreshExpired | Error::RefreshInvalid(_)
        )
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Network(e.to_string())
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
