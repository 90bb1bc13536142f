//! Interaction controller
//!
//! `ChatController` owns all application state: the conversation registry,
//! the rendered transcript, the unsent draft and the speech toggles. Each UI
//! control maps to one method here.
//!
//! Sending is split in two halves. [`ChatController::send`] appends the user
//! message and a placeholder and hands back a [`PendingReply`];
//! [`ChatController::complete_reply`] fills the placeholder in once the
//! caller has waited out the delay. The waiting itself lives in
//! [`super::service::ChatService`].

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReplyDelay;
use crate::conversation::{ConversationId, Message, Persona};
use crate::render::{self, Transcript};
use crate::speech::{Capability, SpeechCapabilities, SpeechRecognizer, VOICE_INPUT_UNSUPPORTED};
use crate::storage::StorageError;

use super::registry::ConversationRegistry;
use super::reply::generate_reply;

/// File name of the export artifact
pub const EXPORT_FILE_NAME: &str = "conversations.json";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Export failed: {0}")]
    Export(#[from] serde_json::Error),

    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("Deleting a conversation requires confirmation")]
    ConfirmationRequired,

    #[error("{0}")]
    Unsupported(&'static str),
}

/// Send flow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    Idle,
    AwaitingReply,
}

/// A placeholder waiting for its reply
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReply {
    /// Identifies this send; never reused within a controller
    pub ticket: u64,
    pub conversation_id: ConversationId,
    pub placeholder_index: usize,
    pub persona: Persona,
    pub text: String,
    pub delay: Duration,
}

/// What happened to a pending reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Applied { reply: &'static str, spoken: bool },
    /// The conversation or its placeholder disappeared in the meantime
    Dropped,
}

/// State of a toggle-style control as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub enabled: bool,
    pub label: &'static str,
}

/// Downloadable export
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: &'static str,
    pub contents: String,
}

pub struct ChatController {
    registry: ConversationRegistry,
    transcript: Transcript,
    draft: String,
    persona: Persona,
    speech: SpeechCapabilities,
    speak_replies: bool,
    reply_delay: ReplyDelay,
    /// Placeholders still waiting for a reply, by ticket
    outstanding: HashMap<u64, ConversationId>,
    next_ticket: u64,
}

impl ChatController {
    pub fn new(
        registry: ConversationRegistry,
        speech: SpeechCapabilities,
        reply_delay: ReplyDelay,
        speak_replies: bool,
    ) -> Self {
        let mut controller = Self {
            registry,
            transcript: Transcript::new(),
            draft: String::new(),
            persona: Persona::default(),
            speech,
            speak_replies,
            reply_delay,
            outstanding: HashMap::new(),
            next_ticket: 0,
        };
        controller.load_active();
        controller
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn send_state(&self) -> SendState {
        if self.outstanding.is_empty() {
            SendState::Idle
        } else {
            SendState::AwaitingReply
        }
    }

    /// Submit the draft.
    ///
    /// Returns `None` without touching anything when the draft is blank.
    pub async fn send(&mut self) -> Result<Option<PendingReply>, ControllerError> {
        let delay = self.reply_delay.sample(&mut rand::thread_rng());
        self.send_with_delay(delay).await
    }

    async fn send_with_delay(
        &mut self,
        delay: Duration,
    ) -> Result<Option<PendingReply>, ControllerError> {
        let text = self.draft.trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }

        self.push(Message::user(text.clone())).await?;
        self.draft.clear();
        let (conversation_id, placeholder_index) = self.push(Message::placeholder()).await?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.outstanding.insert(ticket, conversation_id.clone());

        tracing::debug!(
            "Reply for {} scheduled in {}ms",
            conversation_id,
            delay.as_millis()
        );
        Ok(Some(PendingReply {
            ticket,
            conversation_id,
            placeholder_index,
            persona: self.persona.clone(),
            text,
            delay,
        }))
    }

    /// Fill in a placeholder created by [`Self::send`].
    ///
    /// Clearing or deleting the conversation revokes its outstanding tickets,
    /// so a late completion never lands on a newer placeholder at the same
    /// index.
    pub async fn complete_reply(
        &mut self,
        pending: PendingReply,
    ) -> Result<ReplyOutcome, ControllerError> {
        if self.outstanding.remove(&pending.ticket).is_none() {
            tracing::debug!(
                "Dropping reply for {}: ticket {} was revoked",
                pending.conversation_id,
                pending.ticket
            );
            return Ok(ReplyOutcome::Dropped);
        }

        let reply = generate_reply(&pending.persona, &pending.text);
        let applied = self
            .registry
            .overwrite_placeholder(&pending.conversation_id, pending.placeholder_index, reply)
            .await?;
        if !applied {
            tracing::debug!(
                "Dropping reply for {}: placeholder is gone",
                pending.conversation_id
            );
            return Ok(ReplyOutcome::Dropped);
        }

        let is_active = self.registry.active_id() == Some(&pending.conversation_id);
        let mut spoken = false;
        if is_active {
            self.load_active();
            spoken = self.speak(reply);
        }
        Ok(ReplyOutcome::Applied { reply, spoken })
    }

    pub async fn new_conversation(&mut self) -> Result<ConversationId, ControllerError> {
        let id = self.registry.create(self.persona.clone()).await?;
        self.load_active();
        Ok(id)
    }

    /// Switch to `id`; unknown ids are ignored
    pub fn select(&mut self, id: &ConversationId) -> bool {
        if !self.registry.select(id) {
            return false;
        }
        self.load_active();
        true
    }

    /// Delete a conversation once the user has confirmed
    pub async fn delete(
        &mut self,
        id: &ConversationId,
        confirmed: bool,
    ) -> Result<(), ControllerError> {
        if !confirmed {
            return Err(ControllerError::ConfirmationRequired);
        }
        if !self.registry.delete(id).await? {
            return Err(ControllerError::NotFound(id.clone()));
        }
        self.revoke_tickets(id);
        self.load_active();
        Ok(())
    }

    /// Empty the active conversation's messages
    pub async fn clear_active(&mut self) -> Result<(), ControllerError> {
        if let Some(id) = self.registry.active_id().cloned() {
            self.registry.clear(&id).await?;
            self.revoke_tickets(&id);
            self.transcript.clear();
        }
        Ok(())
    }

    pub async fn rename_active(&mut self, title: &str) -> Result<(), ControllerError> {
        if let Some(id) = self.registry.active_id().cloned() {
            self.registry.rename(&id, title).await?;
        }
        Ok(())
    }

    /// Change the selected persona; the active conversation follows it
    pub async fn select_persona(&mut self, persona: Persona) -> Result<(), ControllerError> {
        if let Some(id) = self.registry.active_id().cloned() {
            self.registry.set_persona(&id, persona.clone()).await?;
        }
        self.persona = persona;
        Ok(())
    }

    /// Flip reply speaking; returns the new setting
    pub fn toggle_speech_output(&mut self) -> bool {
        self.speak_replies = !self.speak_replies;
        if !self.speak_replies {
            if let Some(synthesizer) = self.speech.output.get() {
                synthesizer.cancel();
            }
        }
        self.speak_replies
    }

    pub fn speech_output_control(&self) -> ControlState {
        ControlState {
            enabled: self.speak_replies,
            label: if self.speak_replies { "🔊" } else { "🔈" },
        }
    }

    pub fn microphone_control(&self) -> ControlState {
        match &self.speech.input {
            Capability::Supported(_) => ControlState {
                enabled: true,
                label: "🎤",
            },
            Capability::Unsupported(reason) => ControlState {
                enabled: false,
                label: *reason,
            },
        }
    }

    /// Recognizer to run for a microphone activation
    pub fn recognizer(&self) -> Result<Arc<dyn SpeechRecognizer>, ControllerError> {
        self.speech
            .input
            .get()
            .cloned()
            .ok_or(ControllerError::Unsupported(VOICE_INPUT_UNSUPPORTED))
    }

    /// Add transcribed speech to the end of the draft
    pub fn append_transcription(&mut self, text: &str) {
        if !self.draft.is_empty() {
            self.draft.push(' ');
        }
        self.draft.push_str(text);
    }

    pub fn export(&self) -> Result<ExportArtifact, ControllerError> {
        Ok(ExportArtifact {
            file_name: EXPORT_FILE_NAME,
            contents: self.registry.export_json()?,
        })
    }

    pub fn conversation_list_html(&self) -> String {
        render::render_conversation_list(self.registry.list())
    }

    async fn push(&mut self, message: Message) -> Result<(ConversationId, usize), ControllerError> {
        let had_active = self.registry.active_id().is_some();
        let (id, index) = self
            .registry
            .append_message(message, self.persona.clone())
            .await?;

        if had_active {
            if let Some(appended) = self.registry.get(&id).and_then(|c| c.messages.get(index)) {
                self.transcript.append(appended);
            }
        } else {
            self.load_active();
        }
        Ok((id, index))
    }

    /// Re-render from the active conversation and adopt its persona
    fn load_active(&mut self) {
        match self.registry.active() {
            Some(conversation) => {
                self.persona = conversation.persona.clone();
                self.transcript.render(&conversation.messages);
            }
            None => self.transcript.clear(),
        }
    }

    fn revoke_tickets(&mut self, id: &ConversationId) {
        self.outstanding.retain(|_, owner| owner != id);
    }

    fn speak(&self, text: &str) -> bool {
        if !self.speak_replies {
            return false;
        }
        let Some(synthesizer) = self.speech.output.get() else {
            return false;
        };
        if synthesizer.is_speaking() {
            tracing::debug!("Interrupting current utterance");
            synthesizer.cancel();
        }
        match synthesizer.speak(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Speech output failed: {}", e);
                false
            }
        }
    }
}
