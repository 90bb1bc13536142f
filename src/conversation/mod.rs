//! Conversation types and state management

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when a conversation has none
pub const DEFAULT_TITLE: &str = "Chat";

/// Text of the bot message shown while a reply is being prepared
pub const PLACEHOLDER_TEXT: &str = "...";

/// Length of a generated conversation token
const ID_LEN: usize = 10;

/// Opaque conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Generate a fresh random token
    pub fn random() -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self(token[..ID_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reply style of a conversation.
///
/// Stored as a plain string; tags that are not one of the built-in personas
/// survive a load/save cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Persona {
    #[default]
    Professional,
    Friend,
    Coder,
    Other(String),
}

impl Persona {
    pub fn as_str(&self) -> &str {
        match self {
            Persona::Professional => "professional",
            Persona::Friend => "friend",
            Persona::Coder => "coder",
            Persona::Other(tag) => tag,
        }
    }
}

impl From<String> for Persona {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "professional" => Persona::Professional,
            "friend" => Persona::Friend,
            "coder" => Persona::Coder,
            _ => Persona::Other(tag),
        }
    }
}

impl From<&str> for Persona {
    fn from(tag: &str) -> Self {
        Persona::from(tag.to_string())
    }
}

impl From<Persona> for String {
    fn from(persona: Persona) -> Self {
        persona.as_str().to_string()
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    /// CSS class used by the transcript
    pub fn class(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub who: Sender,
    pub text: String,
    pub ts: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Sender::Bot, text)
    }

    /// Bot message standing in for a reply that is not ready yet
    pub fn placeholder() -> Self {
        Self::bot(PLACEHOLDER_TEXT)
    }

    pub fn is_placeholder(&self) -> bool {
        self.who == Sender::Bot && self.text == PLACEHOLDER_TEXT
    }

    fn new(who: Sender, text: impl Into<String>) -> Self {
        Self {
            who,
            text: text.into(),
            ts: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default = "default_title")]
    pub title: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub messages: Vec<Message>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Conversation {
    pub fn new(id: ConversationId, persona: Persona) -> Self {
        Self {
            id,
            title: default_title(),
            created: Utc::now(),
            persona,
            messages: Vec::new(),
        }
    }

    /// Title for display, falling back to the default for blank titles
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            DEFAULT_TITLE
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_shape() {
        let mut conversation = Conversation::new("abc123".into(), Persona::Coder);
        conversation.messages.push(Message::user("hi"));

        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(value["id"], "abc123");
        assert_eq!(value["title"], "Chat");
        assert_eq!(value["persona"], "coder");
        assert_eq!(value["messages"][0]["who"], "user");
        assert_eq!(value["messages"][0]["text"], "hi");
        assert!(value["created"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_decode_browser_record() {
        let json = r#"{
            "id": "k3j9x0q1ab",
            "created": "2024-05-01T10:00:00.000Z",
            "messages": [{"who": "bot", "text": "...", "ts": "2024-05-01T10:00:01.000Z"}]
        }"#;

        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.title, "Chat");
        assert_eq!(conversation.persona, Persona::Professional);
        assert!(conversation.messages[0].is_placeholder());
    }

    #[test]
    fn test_unknown_persona_survives() {
        let persona: Persona = serde_json::from_str("\"pirate\"").unwrap();
        assert_eq!(persona, Persona::Other("pirate".into()));
        assert_eq!(serde_json::to_string(&persona).unwrap(), "\"pirate\"");
    }

    #[test]
    fn test_random_ids() {
        let a = ConversationId::random();
        let b = ConversationId::random();
        assert_eq!(a.as_str().len(), 10);
        assert_ne!(a, b);
    }
}
