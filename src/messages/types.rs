use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Assistant,
}

/// What an utterance represents in the transcript.
///
/// Only `Message` utterances ever reach the model; the rest are
/// display-only lines produced by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtteranceKind {
    /// Regular dialogue from the user or the model
    Message,
    /// The fixed crisis response
    Helpline,
    /// Transient status such as "Listening..." or "please wait"
    Status,
    /// Error-flavored line shown in place of a reply
    Diagnostic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub kind: UtteranceKind,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>, kind: UtteranceKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text, UtteranceKind::Message)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text, UtteranceKind::Message)
    }

    pub fn helpline(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text, UtteranceKind::Helpline)
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text, UtteranceKind::Status)
    }

    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text, UtteranceKind::Diagnostic)
    }

    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_speaker_and_kind() {
        let u = Utterance::user("hi");
        assert_eq!(u.speaker, Speaker::User);
        assert_eq!(u.kind, UtteranceKind::Message);
        assert!(u.is_user());

        let h = Utterance::helpline("call");
        assert_eq!(h.speaker, Speaker::Assistant);
        assert_eq!(h.kind, UtteranceKind::Helpline);

        let s = Utterance::status("Listening...");
        assert_eq!(s.kind, UtteranceKind::Status);
        assert!(!s.is_user());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Utterance::user("same");
        let b = Utterance::user("same");
        assert_ne!(a.id, b.id);
    }
}
