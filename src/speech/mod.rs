//! Speech input and output
//!
//! Both directions are optional host capabilities. At startup
//! [`SpeechCapabilities::detect`] decides, per direction, whether an adapter
//! is available; controls depending on a missing one are shown disabled
//! instead of failing.

mod command;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SpeechConfig;

pub use command::{find_program, CommandRecognizer, CommandSynthesizer};

/// Label for the microphone control when speech input is missing
pub const VOICE_INPUT_UNSUPPORTED: &str = "Voice input not supported";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech process failed: {0}")]
    Process(#[from] std::io::Error),

    #[error("Recognizer exited with {status}: {stderr}")]
    RecognizerFailed { status: String, stderr: String },

    #[error("No speech detected")]
    NoSpeech,
}

/// One-shot speech-to-text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture a single utterance and return its transcript
    async fn transcribe_once(&self) -> Result<String, SpeechError>;
}

/// Text-to-speech playback. At most one utterance plays at a time.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, cancelling whatever is still playing
    fn speak(&self, text: &str) -> Result<(), SpeechError>;

    fn is_speaking(&self) -> bool;

    fn cancel(&self);
}

/// A host capability that may be absent
#[derive(Clone)]
pub enum Capability<T> {
    Supported(T),
    Unsupported(&'static str),
}

impl<T> Capability<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Capability::Supported(inner) => Some(inner),
            Capability::Unsupported(_) => None,
        }
    }
}

/// Speech adapters available to the controller
#[derive(Clone)]
pub struct SpeechCapabilities {
    pub input: Capability<Arc<dyn SpeechRecognizer>>,
    pub output: Capability<Arc<dyn SpeechSynthesizer>>,
}

impl SpeechCapabilities {
    /// No speech in either direction
    pub fn unsupported() -> Self {
        Self {
            input: Capability::Unsupported(VOICE_INPUT_UNSUPPORTED),
            output: Capability::Unsupported("Speech output not supported"),
        }
    }

    /// Probe the configured commands
    pub fn detect(config: &SpeechConfig) -> Self {
        let input = match config.recognizer_command.as_deref() {
            Some([program, args @ ..]) if find_program(program).is_some() => {
                tracing::info!("🎤 Speech input via {}", program);
                let recognizer: Arc<dyn SpeechRecognizer> =
                    Arc::new(CommandRecognizer::new(program, args.to_vec(), &config.lang));
                Capability::Supported(recognizer)
            }
            Some([program, ..]) => {
                tracing::warn!("Speech input command not found: {}", program);
                Capability::Unsupported(VOICE_INPUT_UNSUPPORTED)
            }
            _ => Capability::Unsupported(VOICE_INPUT_UNSUPPORTED),
        };

        let output = match config.synthesizer_command.as_deref() {
            Some([program, args @ ..]) if find_program(program).is_some() => {
                tracing::info!("🔊 Speech output via {}", program);
                let synthesizer: Arc<dyn SpeechSynthesizer> =
                    Arc::new(CommandSynthesizer::new(program, args.to_vec(), &config.lang));
                Capability::Supported(synthesizer)
            }
            Some([program, ..]) => {
                tracing::warn!("Speech output command not found: {}", program);
                Capability::Unsupported("Speech output not supported")
            }
            _ => Capability::Unsupported("Speech output not supported"),
        };

        Self { input, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_configured() {
        let caps = SpeechCapabilities::detect(&SpeechConfig::default());
        assert!(!caps.input.is_supported());
        assert!(!caps.output.is_supported());
    }

    #[test]
    fn test_missing_program_is_unsupported() {
        let config = SpeechConfig {
            recognizer_command: Some(vec!["talkback-no-such-stt".into()]),
            synthesizer_command: Some(vec!["talkback-no-such-tts".into(), "-q".into()]),
            ..SpeechConfig::default()
        };

        let caps = SpeechCapabilities::detect(&config);
        assert!(matches!(caps.input, Capability::Unsupported(VOICE_INPUT_UNSUPPORTED)));
        assert!(caps.output.get().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_present_program_is_supported() {
        let config = SpeechConfig {
            recognizer_command: Some(vec!["echo".into(), "hello".into()]),
            ..SpeechConfig::default()
        };

        let caps = SpeechCapabilities::detect(&config);
        assert!(caps.input.is_supported());
    }
}
