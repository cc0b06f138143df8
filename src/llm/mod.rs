//! Hosted language model integration
//!
//! # Architecture
//!
//! - **client**: the `ModelClient` seam and its error type
//! - **config**: model id, endpoint, timeout, and prompt settings
//! - **gemini**: `ModelClient` over the Gemini `generateContent` API
//! - **prompts**: the supportive-listener system prompt
//! - **session**: ordered history with single-flight exchanges
//!
//! # Usage
//!
//! ```rust,ignore
//! use amica::llm::{ConversationSession, GeminiClient, ModelConfig};
//! use std::sync::Arc;
//!
//! let client = Arc::new(GeminiClient::from_config(&ModelConfig::default())?);
//! let session = ConversationSession::new(client);
//! let reply = session.exchange("I feel anxious today")?;
//! ```

pub mod client;
pub mod config;
pub mod gemini;
pub mod prompts;
pub mod session;

// Re-export commonly used types
pub use client::{ModelClient, ModelError};
pub use config::ModelConfig;
pub use gemini::GeminiClient;
pub use prompts::{build_system_prompt, SYSTEM_PROMPT};
pub use session::{ConversationSession, PendingExchange, SessionError};
