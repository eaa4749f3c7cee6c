//! Error types for catalog fetches.

use thiserror::Error;

/// Everything that can go wrong between us and the catalog service.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Short message for the error view.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Transport(_) => "Could not reach MangaDex. Check your connection.".to_string(),
            FetchError::Status { status, .. } => format!("MangaDex answered with {status}."),
            FetchError::Malformed(_) => "MangaDex sent data we could not understand.".to_string(),
            FetchError::InvalidId(_) => "The requested manga or chapter ID is not valid.".to_string(),
            FetchError::Exhausted { .. } => "Failed to load chapter - please try again later".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Rejects ids that look like file paths before any request is made.
pub fn validate_id(id: &str) -> Result<&str> {
    if id.is_empty() || id.contains('.') || id.contains('/') {
        return Err(FetchError::InvalidId(id.to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_like_ids_are_rejected() {
        assert!(validate_id("a96676e5-8ae2-425e-b549-7f15dd34a6d8").is_ok());
        assert!(matches!(validate_id("favicon.ico"), Err(FetchError::InvalidId(_))));
        assert!(matches!(validate_id("../etc"), Err(FetchError::InvalidId(_))));
        assert!(matches!(validate_id(""), Err(FetchError::InvalidId(_))));
    }

    #[test]
    fn exhausted_keeps_the_last_cause() {
        let err = FetchError::Exhausted {
            attempts: 4,
            source: Box::new(FetchError::Malformed("no chapter".into())),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 4 attempts: malformed response: no chapter"
        );
        assert_eq!(err.user_message(), "Failed to load chapter - please try again later");
    }
}
