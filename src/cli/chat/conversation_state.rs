//! Conversation state for one chat: the transcript sent to the model and the
//! ledger of what each answer cost.
//!
//! The transcript always starts with exactly one System message. Every
//! Assistant message has exactly one matching entry in the cost ledger, in
//! the same order. Asking for an answer and recording it are separate steps,
//! so a failed call leaves nothing behind and can be retried as-is.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::answer_service::{Answer, AnswerService, AnswerServiceError};
use crate::message::{Message, Role};
use crate::model::ModelConfig;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("input is empty")]
    EmptyInput,
    #[error("an answer is already being requested for this conversation")]
    Busy,
    #[error("cost must be a finite, non-negative amount, got {0}")]
    InvalidCost(f64),
    #[error(transparent)]
    AnswerService(#[from] AnswerServiceError),
    #[error("cost ledger out of sync: {costs} costs for {assistant_turns} assistant turns")]
    InvariantViolation { costs: usize, assistant_turns: usize },
}

pub struct ConversationState {
    system_prompt: String,
    messages: Vec<Message>,
    costs: Vec<f64>,
    in_flight: AtomicBool,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![Message::system(system_prompt.clone())],
            costs: Vec::new(),
            system_prompt,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Start over with only the System message and an empty ledger.
    pub fn reset(&mut self) {
        debug!(
            messages = self.messages.len(),
            costs = self.costs.len(),
            "Resetting conversation"
        );
        self.messages = vec![Message::system(self.system_prompt.clone())];
        self.costs = Vec::new();
    }

    pub fn append_user_turn(&mut self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        self.messages.push(Message::user(text));
        Ok(())
    }

    /// Ask `service` to answer the current transcript. Nothing is recorded;
    /// pass the result to [`commit_answer`](Self::commit_answer).
    pub async fn request_answer(
        &self,
        service: &dyn AnswerService,
        config: &ModelConfig,
    ) -> Result<Answer, SessionError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        debug!(
            model = config.model_identifier(),
            messages = self.messages.len(),
            "Requesting answer"
        );

        match service.answer(&self.messages, config).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!(transient = e.is_transient(), "Answer request failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Record an answer as the next Assistant turn together with its cost.
    pub fn commit_answer(
        &mut self,
        text: impl Into<String>,
        cost: f64,
    ) -> Result<(), SessionError> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(SessionError::InvalidCost(cost));
        }
        self.check_invariants()?;

        self.messages.push(Message::assistant(text));
        self.costs.push(cost);
        Ok(())
    }

    /// Verify that the ledger has one entry per Assistant turn.
    pub fn check_invariants(&self) -> Result<(), SessionError> {
        let assistant_turns = self.assistant_turns();
        if self.costs.len() != assistant_turns {
            return Err(SessionError::InvariantViolation {
                costs: self.costs.len(),
                assistant_turns,
            });
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// An owned copy of the transcript, unaffected by later changes.
    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    /// Sum of the ledger. An empty ledger totals exactly `0.0`.
    pub fn total_cost(&self) -> f64 {
        self.costs.iter().fold(0.0, |total, cost| total + cost)
    }

    /// The last User turn, if it has not been answered yet.
    pub fn pending_user_turn(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }

    #[cfg(test)]
    pub fn is_awaiting_answer(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn assistant_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| match message.role {
                Role::Assistant => true,
                Role::System | Role::User => false,
            })
            .count()
    }
}

/// Marks a request as in flight and clears the mark on drop, including when
/// the request future is dropped early.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        if flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
