use thiserror::Error;

/// Typed error hierarchy for the crate.
///
/// The conversational layer picks a user-facing message from the error
/// *variant*, never from substring-matching the error text, so rewording a
/// message here cannot silently break the chat output.
#[derive(Debug, Error)]
pub enum FinchError {
    /// Bad input (file type, file size, query parameters). Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A dependency hiccuped (rate limit, timeout, transient 5xx). Retried a
    /// bounded number of times at the client layer before surfacing.
    #[error("{service} temporarily unavailable: {message}")]
    Transient { service: String, message: String },

    /// Credentials rejected or malformed. Surfaced immediately, no retry.
    #[error("{service} authentication failed: {message}")]
    Auth { service: String, message: String },

    /// Vector store failures that survived retries.
    #[error("vector store error: {0}")]
    Store(String),

    /// Embeddings or completions failures that survived retries.
    #[error("model error: {0}")]
    Model(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },
}

impl FinchError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FinchError::Transient { .. } | FinchError::Timeout { .. }
        )
    }

    /// Coarse failure category shown to chat users in place of raw error text.
    pub fn user_facing_category(&self) -> &'static str {
        match self {
            FinchError::Validation(_) => "the request itself",
            FinchError::Store(_) => "the document database",
            FinchError::Model(_) => "the AI service",
            FinchError::Transient { .. } | FinchError::Timeout { .. } => "an external data service",
            FinchError::Auth { .. } => "service credentials",
            FinchError::Config(_) => "the application configuration",
        }
    }

    /// The full sentence the conversational layer hands back when this error
    /// is the best answer it has.
    pub fn user_facing_message(&self) -> String {
        format!(
            "I ran into trouble with {}. Please try again in a moment. ({})",
            self.user_facing_category(),
            self
        )
    }
}

pub type Result<T> = std::result::Result<T, FinchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_timeout_are_retryable() {
        assert!(
            FinchError::Transient {
                service: "fdic".into(),
                message: "429".into()
            }
            .is_transient()
        );
        assert!(
            FinchError::Timeout {
                what: "probe".into(),
                secs: 5
            }
            .is_transient()
        );
        assert!(!FinchError::Validation("bad".into()).is_transient());
        assert!(
            !FinchError::Auth {
                service: "azure".into(),
                message: "401".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn categories_do_not_depend_on_message_text() {
        let a = FinchError::Store("connection refused".into());
        let b = FinchError::Store("completely different wording".into());
        assert_eq!(a.user_facing_category(), b.user_facing_category());
    }
}
