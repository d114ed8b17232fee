//! Conversational query session.
//!
//! Owns the ordered dialogue for one conversation. A question is committed to
//! history only together with its answer, so history holds exactly the
//! exchanges that succeeded. At most one question is outstanding per session.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::config::{Config, DEFAULT_HISTORY_WINDOW, DEFAULT_TOP_K, MAX_TOP_K};
use crate::error::{ClientError, ClientResult, TransportError, ValidationError};
use crate::models::{ChatRequest, ChatResponse, ChatTurn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub top_k: u32,
    /// Most recent prior turns sent with a question; `None` sends all.
    pub history_window: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            history_window: Some(DEFAULT_HISTORY_WINDOW),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            history_window: config.history_window,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    history: Vec<ChatTurn>,
    last_exchange: Option<ChatResponse>,
    draft: String,
    error: Option<TransportError>,
    in_flight: bool,
}

pub struct ChatSession {
    backend: Arc<dyn Backend>,
    options: SessionOptions,
    state: Mutex<SessionState>,
}

/// Releases the in-flight slot even if the `ask` future is dropped mid-request.
struct InFlight<'a> {
    session: &'a ChatSession,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.lock().in_flight = false;
    }
}

impl ChatSession {
    /// Fails when `options.top_k` is outside what the backend accepts.
    pub fn new(backend: Arc<dyn Backend>, options: SessionOptions) -> ClientResult<Self> {
        if !(1..=MAX_TOP_K).contains(&options.top_k) {
            return Err(ValidationError::InvalidTopK { max: MAX_TOP_K }.into());
        }
        Ok(Self {
            backend,
            options,
            state: Mutex::new(SessionState::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // State is only touched in short synchronous sections, so a poisoned
        // lock still holds a consistent value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Asks `question`, carrying the prior history as context.
    ///
    /// Blank questions are rejected without a request. While another question
    /// is outstanding the call fails with [`ClientError::Busy`] and changes
    /// nothing. On success the user and assistant turns are appended in that
    /// order and the draft is cleared; on failure history is untouched, the
    /// draft keeps the question, and the error is recorded.
    pub async fn ask(&self, question: impl Into<String>) -> ClientResult<ChatResponse> {
        let question = question.into();
        if question.trim().is_empty() {
            debug!("ignoring blank question");
            return Err(ValidationError::EmptyQuestion.into());
        }

        let request = {
            let mut state = self.lock();
            if state.in_flight {
                debug!("question rejected, another one is in flight");
                return Err(ClientError::Busy);
            }
            state.in_flight = true;
            state.draft = question.clone();
            ChatRequest {
                question: question.clone(),
                history: window(&state.history, self.options.history_window).to_vec(),
                top_k: self.options.top_k,
            }
        };
        let _guard = InFlight { session: self };

        debug!(history = request.history.len(), "asking question");
        let result = self.backend.ask_question(&request).await;

        let mut state = self.lock();
        match result {
            Ok(response) => {
                state.history.push(ChatTurn::user(question));
                state.history.push(ChatTurn::assistant(response.answer.clone()));
                state.last_exchange = Some(response.clone());
                state.draft.clear();
                state.error = None;
                info!(
                    turns = state.history.len(),
                    citations = response.citations.len(),
                    confidence = response.confidence,
                    "question answered"
                );
                Ok(response)
            }
            Err(err) => {
                warn!(error = %err, "question failed");
                if let ClientError::Transport(transport) = &err {
                    state.error = Some(transport.clone());
                }
                Err(err)
            }
        }
    }

    /// Re-asks whatever is left in the draft, typically after a failure.
    pub async fn retry(&self) -> ClientResult<ChatResponse> {
        let draft = self.draft();
        self.ask(draft).await
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        self.lock().history.clone()
    }

    pub fn last_exchange(&self) -> Option<ChatResponse> {
        self.lock().last_exchange.clone()
    }

    pub fn error(&self) -> Option<TransportError> {
        self.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Starts a fresh conversation. Refused while a question is outstanding.
    pub fn reset(&self) -> ClientResult<()> {
        let mut state = self.lock();
        if state.in_flight {
            return Err(ClientError::Busy);
        }
        *state = SessionState::default();
        info!("conversation reset");
        Ok(())
    }
}

/// The most recent `limit` turns, cut on a user turn so exchanges stay whole.
fn window(history: &[ChatTurn], limit: Option<usize>) -> &[ChatTurn] {
    let Some(limit) = limit else {
        return history;
    };
    if history.len() <= limit {
        return history;
    }
    let mut start = history.len() - limit;
    if start % 2 == 1 {
        start += 1;
    }
    &history[start..]
}
