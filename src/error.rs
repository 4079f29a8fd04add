use thiserror::Error;

/// Unified error type for the LinkPeek library.
#[derive(Debug, Error)]
pub enum LinkPeekError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config references unset environment variable: {0}")]
    ConfigEnvVar(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Risk scorer error: {0}")]
    Scorer(String),

    #[error("Alert delivery error: {0}")]
    Alert(String),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, LinkPeekError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LinkPeekError = io_err.into();
        assert!(matches!(err, LinkPeekError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn scorer_error_displays_message() {
        let err = LinkPeekError::Scorer("scoring backend unavailable".to_string());
        assert_eq!(
            err.to_string(),
            "Risk scorer error: scoring backend unavailable"
        );
    }

    #[test]
    fn config_parse_error_converts() {
        let bad_toml = "[invalid";
        let toml_err = toml::from_str::<toml::Value>(bad_toml).unwrap_err();
        let err: LinkPeekError = toml_err.into();
        assert!(matches!(err, LinkPeekError::ConfigParse(_)));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LinkPeekError>();
    }
}
