//! Error types for collection and books API operations

/// Errors from collection, reorder and books API operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("book not found: {0}")]
    NotFound(String),

    #[error("reorder conflict: {0}")]
    ReorderConflict(String),

    #[error("invalid book: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("unexpected response ({status}): {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Auth(#[from] catalog_auth::Error),
}

/// Result alias for books operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_pass_through_display() {
        let err: Error = catalog_auth::Error::RefreshExpired.into();
        assert_eq!(err.to_string(), "refresh token expired");
        assert!(matches!(err, Error::Auth(catalog_auth::Error::RefreshExpired)));
    }

    #[test]
    fn not_found_names_the_id() {
        assert_eq!(Error::NotFound("42".into()).to_string(), "book not found: 42");
    }
}
