//! The contract between a conversation and whatever produces answers for it.

use async_trait::async_trait;

use crate::message::Message;
use crate::model::ModelConfig;

/// A generated reply plus the monetary cost of the call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// USD attributable to this single call. Never negative.
    pub cost: f64,
}

/// Failures an answer service may report.
///
/// `Timeout`, `RateLimited`, `Network` and `Server` are transient and may
/// succeed on retry. The rest need reconfiguration before a retry can work.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnswerServiceError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl AnswerServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnswerServiceError::Timeout
                | AnswerServiceError::RateLimited(_)
                | AnswerServiceError::Network(_)
                | AnswerServiceError::Server { .. }
        )
    }
}

/// Performs one remote call for a transcript.
///
/// Implementations receive the transcript read-only, with roles and order
/// preserved, and must not keep any state about the conversation.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(
        &self,
        messages: &[Message],
        config: &ModelConfig,
    ) -> Result<Answer, AnswerServiceError>;
}
