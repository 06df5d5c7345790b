//! Unified error types for shellcache.
//!
//! Display strings carry a stable uppercase prefix so log lines and CLI
//! output can be grepped by category.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request URL could not be parsed or canonicalized.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Control message was not valid JSON or had an unexpected shape.
    #[error("INVALID_MESSAGE: {0}")]
    InvalidMessage(String),

    /// The network could not be reached or the transfer broke off.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// The network answered, but not with a usable response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored response could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(String),

    /// App shell could not be seeded; this controller version is discarded.
    #[error("INSTALL_FAILED: {path}: {reason}")]
    InstallFailed { path: String, reason: String },

    /// Lifecycle operation called from the wrong state.
    #[error("NOT_ACTIVE: {0}")]
    NotActive(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether the error came from the network side rather than local storage.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::HttpError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Network("connection refused".to_string());
        assert!(err.to_string().contains("NETWORK_ERROR"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_install_failed_display() {
        let err = Error::InstallFailed { path: "/favicon.ico".into(), reason: "status 404".into() };
        assert_eq!(err.to_string(), "INSTALL_FAILED: /favicon.ico: status 404");
    }

    #[test]
    fn test_is_network() {
        assert!(Error::Network("x".into()).is_network());
        assert!(Error::HttpError("x".into()).is_network());
        assert!(!Error::MigrationFailed("x".into()).is_network());
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
