//! Conversation registry
//!
//! Holds every conversation in memory, in display order (newest first), and
//! tracks which one is active. Every mutation writes the full list back to
//! the storage port before returning, so the persisted state never lags the
//! in-memory one.

use std::sync::Arc;

use crate::conversation::{Conversation, ConversationId, Message, Persona, DEFAULT_TITLE};
use crate::storage::{KeyValueStore, StorageError};

/// In-memory conversation list mirrored to a key-value store
pub struct ConversationRegistry {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl ConversationRegistry {
    /// Load the registry from `store`.
    ///
    /// A missing or undecodable value is treated as an empty list. An empty
    /// list gets one fresh conversation so there is always something to show.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
        persona: Persona,
    ) -> Result<Self, StorageError> {
        let key = key.into();
        let conversations = match store.get(&key).await? {
            Some(raw) => match serde_json::from_str::<Vec<Conversation>>(&raw) {
                Ok(conversations) => conversations,
                Err(e) => {
                    tracing::warn!("Discarding malformed conversation state: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut registry = Self {
            conversations,
            active: None,
            store,
            key,
        };

        match registry.conversations.first() {
            Some(first) => registry.active = Some(first.id.clone()),
            None => {
                registry.create(persona).await?;
            }
        }

        tracing::info!("Loaded {} conversation(s)", registry.conversations.len());
        Ok(registry)
    }

    /// All conversations, newest first
    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    /// Create a conversation at the front of the list and make it active
    pub async fn create(&mut self, persona: Persona) -> Result<ConversationId, StorageError> {
        let id = self.fresh_id();
        self.conversations
            .insert(0, Conversation::new(id.clone(), persona));
        self.active = Some(id.clone());
        self.persist().await?;

        tracing::info!("Created conversation {}", id);
        Ok(id)
    }

    /// Make `id` active. Returns false and changes nothing if it is unknown.
    pub fn select(&mut self, id: &ConversationId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// Remove a conversation. If it was active, the first remaining one takes
    /// over, or nothing is active when the list is empty.
    pub async fn delete(&mut self, id: &ConversationId) -> Result<bool, StorageError> {
        let before = self.conversations.len();
        self.conversations.retain(|c| &c.id != id);
        if self.conversations.len() == before {
            return Ok(false);
        }

        if self.active.as_ref() == Some(id) {
            self.active = self.conversations.first().map(|c| c.id.clone());
        }
        self.persist().await?;

        tracing::info!("Deleted conversation {}", id);
        Ok(true)
    }

    /// Set the title; an empty title becomes the default
    pub async fn rename(&mut self, id: &ConversationId, title: &str) -> Result<bool, StorageError> {
        let Some(conversation) = self.get_mut(id) else {
            return Ok(false);
        };
        conversation.title = if title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            title.to_string()
        };
        self.persist().await?;
        Ok(true)
    }

    pub async fn set_persona(
        &mut self,
        id: &ConversationId,
        persona: Persona,
    ) -> Result<bool, StorageError> {
        let Some(conversation) = self.get_mut(id) else {
            return Ok(false);
        };
        conversation.persona = persona;
        self.persist().await?;
        Ok(true)
    }

    /// Empty a conversation's messages, keeping the record
    pub async fn clear(&mut self, id: &ConversationId) -> Result<bool, StorageError> {
        let Some(conversation) = self.get_mut(id) else {
            return Ok(false);
        };
        conversation.messages.clear();
        self.persist().await?;
        Ok(true)
    }

    /// Append to the active conversation, creating one first if none is
    /// active. Returns the conversation and the index of the new message.
    pub async fn append_message(
        &mut self,
        message: Message,
        persona: Persona,
    ) -> Result<(ConversationId, usize), StorageError> {
        let id = match self.active.clone() {
            Some(id) => id,
            None => self.create(persona).await?,
        };

        let index = match self.get_mut(&id) {
            Some(conversation) => {
                conversation.messages.push(message);
                conversation.messages.len() - 1
            }
            None => return Err(StorageError::Unavailable(format!("conversation {id} vanished"))),
        };
        self.persist().await?;
        Ok((id, index))
    }

    /// Replace the placeholder at `index` with `text`.
    ///
    /// Returns false when the conversation is gone or the message at `index`
    /// is no longer a placeholder (e.g. the conversation was cleared).
    pub async fn overwrite_placeholder(
        &mut self,
        id: &ConversationId,
        index: usize,
        text: &str,
    ) -> Result<bool, StorageError> {
        let Some(message) = self
            .get_mut(id)
            .and_then(|c| c.messages.get_mut(index))
            .filter(|m| m.is_placeholder())
        else {
            return Ok(false);
        };
        message.text = text.to_string();
        self.persist().await?;
        Ok(true)
    }

    /// Pretty-printed JSON of every conversation
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.conversations)
    }

    fn get_mut(&mut self, id: &ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    fn fresh_id(&self) -> ConversationId {
        loop {
            let id = ConversationId::random();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.conversations)?;
        self.store.set(&self.key, &json).await?;
        tracing::debug!("Persisted {} conversation(s)", self.conversations.len());
        Ok(())
    }
}
