pub mod integration;
pub mod llm;
pub mod messages;
pub mod safety;
pub mod speech;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AmicaError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model client error: {0}")]
    ClientError(String),

    #[error("Speech error: {0}")]
    SpeechError(String),

    #[error("Voice input unavailable: {0}")]
    VoiceUnavailable(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for AmicaError {
    fn from(e: std::io::Error) -> Self {
        AmicaError::IOError(e.to_string())
    }
}

impl AmicaError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Bad settings need the user to edit the config file
            AmicaError::ConfigError(_) => false,
            AmicaError::ClientError(_) => false,
            // Synthesis is best-effort, the transcript keeps flowing
            AmicaError::SpeechError(_) => true,
            AmicaError::VoiceUnavailable(_) => true,
            AmicaError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            AmicaError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            AmicaError::ClientError(_) => {
                "Could not connect to the assistant service. Please check your API key.".to_string()
            }
            AmicaError::SpeechError(_) => {
                "Text-to-speech failed. Response will be shown as text.".to_string()
            }
            AmicaError::VoiceUnavailable(_) => {
                "Voice input is not available. Please type your message instead.".to_string()
            }
            AmicaError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AmicaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(AmicaError::SpeechError("503".into()).is_recoverable());
        assert!(AmicaError::VoiceUnavailable("no mic".into()).is_recoverable());
        assert!(!AmicaError::ConfigError("bad".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AmicaError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AmicaError::IOError(ref m) if m.contains("gone")));
        assert_eq!(err.user_message(), "File system error occurred.");
    }
}
