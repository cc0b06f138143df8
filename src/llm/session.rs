//! Conversation session: ordered dialogue history and single-flight exchanges
//!
//! The history is append-only. At most one exchange may be outstanding at a
//! time; a second one is rejected with [`SessionError::Busy`] instead of
//! being interleaved.
//!
//! An exchange can run in one call ([`ConversationSession::exchange`]) or in
//! two phases so history mutation stays on the owning thread while the
//! network call runs elsewhere:
//!
//! ```rust,ignore
//! let pending = session.begin("hello")?;          // owning thread
//! let reply = pending.request(client.as_ref());   // any thread
//! session.complete(pending, reply?);              // owning thread
//! ```

use crate::llm::client::{ModelClient, ModelError};
use crate::messages::Utterance;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("session busy: a reply is already being generated")]
    Busy,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Releases the session's single-flight slot when dropped
#[derive(Debug)]
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An exchange whose user text is already in history and whose reply is
/// still outstanding. Dropping it without completing leaves the user text in
/// history and frees the session for the next exchange.
#[derive(Debug)]
pub struct PendingExchange {
    user_text: String,
    context: Vec<Utterance>,
    guard: InFlightGuard,
}

impl PendingExchange {
    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    /// History as it was before this exchange's user text was appended
    pub fn context(&self) -> &[Utterance] {
        &self.context
    }

    /// Ask `client` for the reply. Blank replies count as [`ModelError::EmptyReply`].
    pub fn request(&self, client: &dyn ModelClient) -> Result<String, ModelError> {
        let reply = client.send(&self.context, &self.user_text)?;
        if reply.trim().is_empty() {
            return Err(ModelError::EmptyReply);
        }
        Ok(reply)
    }
}

pub struct ConversationSession {
    client: Arc<dyn ModelClient>,
    history: Mutex<Vec<Utterance>>,
    in_flight: Arc<AtomicBool>,
}

impl ConversationSession {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            history: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The client this session sends its exchanges to
    pub fn client(&self) -> Arc<dyn ModelClient> {
        Arc::clone(&self.client)
    }

    /// Claim the single-flight slot and append the user text.
    pub fn begin(&self, user_text: impl Into<String>) -> Result<PendingExchange, SessionError> {
        self.begin_with(Utterance::user(user_text))
    }

    /// Like [`begin`](Self::begin), appending an utterance the caller built,
    /// so the same value can also be shown in a transcript.
    pub fn begin_with(&self, utterance: Utterance) -> Result<PendingExchange, SessionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("exchange rejected, session busy");
            return Err(SessionError::Busy);
        }
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let user_text = utterance.text.clone();
        let mut history = self.history.lock();
        let context = history.clone();
        history.push(utterance);

        Ok(PendingExchange {
            user_text,
            context,
            guard,
        })
    }

    /// Append the reply for `pending` and release the slot.
    pub fn complete(&self, pending: PendingExchange, reply: impl Into<String>) -> Utterance {
        debug_assert!(
            Arc::ptr_eq(&pending.guard.0, &self.in_flight),
            "pending exchange belongs to another session"
        );
        let utterance = Utterance::assistant(reply);
        self.history.lock().push(utterance.clone());
        drop(pending);
        utterance
    }

    /// Append `user_text`, fetch the reply, and append it.
    ///
    /// On a model failure the user text stays in history so the next
    /// exchange carries it as context.
    pub fn exchange(&self, user_text: impl Into<String>) -> Result<String, SessionError> {
        let pending = self.begin(user_text)?;
        let reply = pending.request(self.client.as_ref())?;
        self.complete(pending, reply.clone());
        Ok(reply)
    }

    /// Snapshot of the history, oldest first
    pub fn history(&self) -> Vec<Utterance> {
        self.history.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}
