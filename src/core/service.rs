//! Shared handle around the controller
//!
//! Request handlers and background tasks all go through `ChatService`. The
//! controller sits behind one async mutex; the reply delay and speech
//! recognition run outside of it so other requests keep flowing.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use super::controller::{ChatController, ControllerError, PendingReply, ReplyOutcome};

#[derive(Clone)]
pub struct ChatService {
    controller: Arc<Mutex<ChatController>>,
}

impl ChatService {
    pub fn new(controller: ChatController) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// Exclusive access to the controller
    pub async fn lock(&self) -> MutexGuard<'_, ChatController> {
        self.controller.lock().await
    }

    /// Send the current draft and schedule its reply.
    ///
    /// Returns the handle of the task that completes the reply, or `None` if
    /// the draft was blank.
    pub async fn send(&self) -> Result<Option<JoinHandle<()>>, ControllerError> {
        self.send_text(None).await
    }

    /// Like [`Self::send`], but first replaces the draft with `text` when
    /// given. Both happen under the same lock.
    pub async fn send_text(
        &self,
        text: Option<String>,
    ) -> Result<Option<JoinHandle<()>>, ControllerError> {
        let pending = {
            let mut controller = self.lock().await;
            if let Some(text) = text {
                controller.set_draft(text);
            }
            controller.send().await?
        };
        Ok(pending.map(|pending| self.schedule_reply(pending)))
    }

    fn schedule_reply(&self, pending: PendingReply) -> JoinHandle<()> {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(pending.delay).await;
            let conversation_id = pending.conversation_id.clone();
            match controller.lock().await.complete_reply(pending).await {
                Ok(ReplyOutcome::Applied { .. }) => {
                    tracing::debug!("Reply delivered to {}", conversation_id);
                }
                Ok(ReplyOutcome::Dropped) => {}
                Err(e) => tracing::error!("Failed to deliver reply to {}: {}", conversation_id, e),
            }
        })
    }

    /// Capture one utterance and append it to the draft.
    ///
    /// Fails straight away when there is no speech input. Recognition errors
    /// are only logged.
    pub async fn listen(&self) -> Result<JoinHandle<()>, ControllerError> {
        let recognizer = self.lock().await.recognizer()?;
        let controller = self.controller.clone();

        Ok(tokio::spawn(async move {
            match recognizer.transcribe_once().await {
                Ok(text) => controller.lock().await.append_transcription(&text),
                Err(e) => tracing::warn!("Speech recognition error: {}", e),
            }
        }))
    }
}
