//! Model client abstraction
//!
//! A `ModelClient` turns the ordered dialogue so far plus one new user
//! text into a single reply. Implementations block the calling thread; the
//! orchestrator only ever calls them from worker threads.

use crate::messages::Utterance;
use thiserror::Error;

/// Failure of one model request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Transport-level failure: connect, timeout, unreadable body
    #[error("request failed: {0}")]
    Request(String),

    /// The API answered with a non-success status
    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The API refused to answer the prompt
    #[error("prompt blocked: {0}")]
    Blocked(String),

    /// The call succeeded but carried no reply text
    #[error("model returned an empty reply")]
    EmptyReply,

    /// The response body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether the call itself failed, as opposed to completing without usable text
    pub fn is_transport(&self) -> bool {
        matches!(self, ModelError::Request(_) | ModelError::Api { .. })
    }
}

/// Chat-style text generation with caller-supplied context
pub trait ModelClient: Send + Sync {
    /// Generate a reply to `new_text` given the prior `history`, oldest first.
    fn send(&self, history: &[Utterance], new_text: &str) -> Result<String, ModelError>;

    /// Identifier of the backing model, for logs
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::Api {
            status: 429,
            message: "quota".to_string(),
        };
        assert_eq!(err.to_string(), "API returned HTTP 429: quota");
        assert_eq!(ModelError::EmptyReply.to_string(), "model returned an empty reply");
    }

    #[test]
    fn test_transport_classification() {
        assert!(ModelError::Request("timeout".into()).is_transport());
        assert!(!ModelError::EmptyReply.is_transport());
        assert!(!ModelError::Blocked("SAFETY".into()).is_transport());
    }
}
