#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// Rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network failure (`status` is None) or non-2xx response.
    #[error("transport error: {message}")]
    Transport {
        status: Option<u16>,
        detail: Option<String>,
        message: String,
    },

    /// 2xx response that still failed semantically.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SearchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(status: u16, detail: Option<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: format!("backend responded with {status}"),
            detail,
        }
    }

    /// The one string the user sees, whatever the error kind.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Validation(message) | SearchError::Backend(message) => {
                format!("Oops! {message}")
            }
            SearchError::Transport {
                status: Some(_),
                detail: Some(detail),
                ..
            } if !detail.is_empty() => format!("Oops! {detail}"),
            SearchError::Transport {
                status: Some(_), ..
            } => "Oops! Unexpected error.".to_string(),
            SearchError::Transport { status: None, .. } => {
                "Oops! An unexpected error occurred.".to_string()
            }
        }
    }

    /// Error kinds only differ in the log, never in what the user sees.
    pub fn log(&self) {
        match self {
            SearchError::Validation(_) => log::warn!("{self}"),
            SearchError::Transport { .. } | SearchError::Backend(_) => log::error!("{self:?}"),
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return SearchError::Backend(format!("malformed response: {err}"));
        }

        SearchError::Transport {
            status: err.status().map(|s| s.as_u16()),
            detail: None,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Validation(format!("could not read file: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_surfaced() {
        let err = SearchError::status(500, Some("index unavailable".to_string()));
        assert_eq!(err.user_message(), "Oops! index unavailable");
    }

    #[test]
    fn test_response_without_detail() {
        let err = SearchError::status(502, None);
        assert_eq!(err.user_message(), "Oops! Unexpected error.");
    }

    #[test]
    fn test_network_failure() {
        let err = SearchError::Transport {
            status: None,
            detail: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.user_message(), "Oops! An unexpected error occurred.");
    }

    #[test]
    fn test_validation_message() {
        let err = SearchError::validation("The query text cannot be empty");
        assert_eq!(err.user_message(), "Oops! The query text cannot be empty");
    }
}
