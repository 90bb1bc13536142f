//! Application configuration
//!
//! Settings come from an optional TOML file (path in `TALKBACK_CONFIG`) and
//! are then overridden by environment variables.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 3000
//! data_dir = "./data"
//!
//! [reply_delay]
//! min_ms = 600
//! max_ms = 1200
//!
//! [speech]
//! lang = "en-US"
//! synthesizer_command = ["espeak"]
//! ```

pub mod replies;

use std::env;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::conversation::Persona;

/// Storage key the conversation list lives under
pub const DEFAULT_STORAGE_KEY: &str = "lg_online_convos";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Directory holding the SQLite database
    pub data_dir: PathBuf,

    pub storage_key: String,

    /// Persona selected at startup
    pub persona: Persona,

    pub reply_delay: ReplyDelay,

    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            storage_key: DEFAULT_STORAGE_KEY.into(),
            persona: Persona::Professional,
            reply_delay: ReplyDelay::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    /// Load the TOML file named by `TALKBACK_CONFIG` (if any), then apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var("TALKBACK_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(host) = env::var("HOST") {
            self.host = host;
        }
        if let Some(port) = env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Ok(dir) = env::var("TALKBACK_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(key) = env::var("TALKBACK_STORAGE_KEY") {
            self.storage_key = key;
        }
        if let Ok(persona) = env::var("TALKBACK_PERSONA") {
            self.persona = Persona::from(persona);
        }
        if let Some(ms) = env_millis("TALKBACK_REPLY_DELAY_MIN_MS") {
            self.reply_delay.min_ms = ms;
        }
        if let Some(ms) = env_millis("TALKBACK_REPLY_DELAY_MAX_MS") {
            self.reply_delay.max_ms = ms;
        }
        if let Ok(lang) = env::var("TALKBACK_LANG") {
            self.speech.lang = lang;
        }
        if let Some(command) = env_command("TALKBACK_STT_COMMAND") {
            self.speech.recognizer_command = Some(command);
        }
        if let Some(command) = env_command("TALKBACK_TTS_COMMAND") {
            self.speech.synthesizer_command = Some(command);
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reply_delay.min_ms > self.reply_delay.max_ms {
            return Err(ConfigError::Validation(format!(
                "reply_delay.min_ms ({}) exceeds reply_delay.max_ms ({})",
                self.reply_delay.min_ms, self.reply_delay.max_ms
            )));
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::Validation("storage_key must not be empty".into()));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("talkback.db")
    }
}

fn env_millis(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_command(name: &str) -> Option<Vec<String>> {
    let value = env::var(name).ok()?;
    let parts: Vec<String> = value.split_whitespace().map(str::to_string).collect();
    (!parts.is_empty()).then_some(parts)
}

/// Window for the artificial "thinking" pause before a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyDelay {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for ReplyDelay {
    fn default() -> Self {
        Self {
            min_ms: 600,
            max_ms: 1200,
        }
    }
}

impl ReplyDelay {
    /// Uniform sample from `[min_ms, max_ms)`, or exactly `min_ms` when the
    /// window is empty
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let window: Range<u64> = self.min_ms..self.max_ms;
        let ms = if window.is_empty() {
            self.min_ms
        } else {
            rng.gen_range(window)
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Language handed to the speech programs
    pub lang: String,

    /// Program and arguments printing one transcribed utterance on stdout
    pub recognizer_command: Option<Vec<String>>,

    /// Program and arguments; the text to speak is appended as last argument
    pub synthesizer_command: Option<Vec<String>>,

    /// Whether replies are spoken at startup
    pub speak_replies: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            lang: "en-US".into(),
            recognizer_command: None,
            synthesizer_command: None,
            speak_replies: true,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SAMPLE_CONFIG: &str = r#"
host = "0.0.0.0"
port = 8080
data_dir = "/var/lib/talkback"
persona = "coder"

[reply_delay]
min_ms = 100
max_ms = 200

[speech]
lang = "en-GB"
synthesizer_command = ["espeak", "-s", "150"]
speak_replies = false
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.persona, Persona::Coder);
        assert_eq!(config.reply_delay, ReplyDelay { min_ms: 100, max_ms: 200 });
        assert_eq!(config.speech.lang, "en-GB");
        assert_eq!(
            config.speech.synthesizer_command,
            Some(vec!["espeak".to_string(), "-s".into(), "150".into()])
        );
        assert!(config.speech.recognizer_command.is_none());
        assert!(!config.speech.speak_replies);
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/talkback/talkback.db"));
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.reply_delay, ReplyDelay::default());
        assert!(config.speech.speak_replies);
    }

    #[test]
    fn test_inverted_delay_rejected() {
        let toml = "[reply_delay]\nmin_ms = 900\nmax_ms = 100\n";
        assert!(matches!(
            Config::from_toml(toml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_delay_sample_in_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let delay = ReplyDelay::default();
        for _ in 0..100 {
            let sampled = delay.sample(&mut rng);
            assert!(sampled >= Duration::from_millis(600));
            assert!(sampled < Duration::from_millis(1200));
        }
    }

    #[test]
    fn test_empty_delay_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let delay = ReplyDelay { min_ms: 0, max_ms: 0 };
        assert_eq!(delay.sample(&mut rng), Duration::ZERO);
    }
}
