pub mod storage;
pub mod types;

pub use storage::{TranscriptCursor, TranscriptStore};
pub use types::{Speaker, Utterance, UtteranceKind};
