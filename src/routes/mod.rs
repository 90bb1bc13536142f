//! API routes
//!
//! One endpoint per UI control. Every mutating endpoint answers with the
//! fresh [`ViewState`] so a client can redraw without a second request.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationId, Persona};
use crate::core::{ChatController, ControlState, ControllerError, SendState};
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub persona: String,
    pub message_count: usize,
}

/// Everything a client needs to draw the chat window
#[derive(Debug, Serialize)]
pub struct ViewState {
    pub active_id: Option<String>,
    pub title: String,
    pub persona: String,
    pub draft: String,
    pub send_state: SendState,
    pub speech_output: ControlState,
    pub microphone: ControlState,
    pub conversations: Vec<ConversationSummary>,
    pub conversation_list_html: String,
    pub transcript_html: String,
}

impl ViewState {
    fn from_controller(controller: &ChatController) -> Self {
        let active = controller.registry().active();
        Self {
            active_id: active.map(|c| c.id.to_string()),
            title: active.map(|c| c.title.clone()).unwrap_or_default(),
            persona: controller.persona().to_string(),
            draft: controller.draft().to_string(),
            send_state: controller.send_state(),
            speech_output: controller.speech_output_control(),
            microphone: controller.microphone_control(),
            conversations: controller
                .registry()
                .list()
                .iter()
                .map(|c| ConversationSummary {
                    id: c.id.to_string(),
                    title: c.display_title().to_string(),
                    created: c.created,
                    persona: c.persona.to_string(),
                    message_count: c.messages.len(),
                })
                .collect(),
            conversation_list_html: controller.conversation_list_html(),
            transcript_html: controller.transcript().html(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    /// Replaces the draft before sending when present
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PersonaRequest {
    pub persona: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ControllerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ControllerError::NotFound(_) => StatusCode::NOT_FOUND,
            ControllerError::ConfirmationRequired => StatusCode::CONFLICT,
            ControllerError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            ControllerError::Storage(_) | ControllerError::Export(_) => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<ViewState>, ControllerError>;

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn view(State(state): State<AppState>) -> Json<ViewState> {
    let controller = state.chat.lock().await;
    Json(ViewState::from_controller(&controller))
}

async fn set_draft(State(state): State<AppState>, Json(request): Json<DraftRequest>) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller.set_draft(request.text);
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn send(State(state): State<AppState>, body: Option<Json<SendRequest>>) -> ApiResult {
    let text = body.and_then(|Json(request)| request.text);
    state.chat.send_text(text).await?;

    let controller = state.chat.lock().await;
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn new_conversation(State(state): State<AppState>) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller.new_conversation().await?;
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn select_conversation(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller.select(&ConversationId::from(id));
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller
        .delete(&ConversationId::from(id), params.confirm)
        .await?;
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn clear(State(state): State<AppState>) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller.clear_active().await?;
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn rename(State(state): State<AppState>, Json(request): Json<TitleRequest>) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller.rename_active(&request.title).await?;
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn select_persona(
    State(state): State<AppState>,
    Json(request): Json<PersonaRequest>,
) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller
        .select_persona(Persona::from(request.persona))
        .await?;
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn toggle_speech(State(state): State<AppState>) -> ApiResult {
    let mut controller = state.chat.lock().await;
    controller.toggle_speech_output();
    Ok(Json(ViewState::from_controller(&controller)))
}

async fn listen(State(state): State<AppState>) -> Result<StatusCode, ControllerError> {
    state.chat.listen().await?;
    Ok(StatusCode::ACCEPTED)
}

async fn export(State(state): State<AppState>) -> Result<Response, ControllerError> {
    let artifact = state.chat.lock().await.export()?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.contents,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(view))
        .route("/api/draft", put(set_draft))
        .route("/api/send", post(send))
        .route("/api/conversations", post(new_conversation))
        .route("/api/conversations/:id/select", post(select_conversation))
        .route("/api/conversations/:id", delete(delete_conversation))
        .route("/api/clear", post(clear))
        .route("/api/title", put(rename))
        .route("/api/persona", put(select_persona))
        .route("/api/speech/toggle", post(toggle_speech))
        .route("/api/listen", post(listen))
        .route("/api/export", get(export))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{replies, Config};
    use crate::conversation::Conversation;
    use crate::core::{ChatService, ConversationRegistry};
    use crate::speech::SpeechCapabilities;
    use crate::storage::InMemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let config = Config::default();
        let registry = ConversationRegistry::load(
            Arc::new(InMemoryStore::new()),
            config.storage_key.clone(),
            config.persona.clone(),
        )
        .await
        .unwrap();
        let controller = crate::core::ChatController::new(
            registry,
            SpeechCapabilities::unsupported(),
            config.reply_delay,
            true,
        );
        let state = AppState {
            chat: ChatService::new(controller),
        };
        router().with_state(state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = call(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = call_json(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_initial_state() {
        let app = app().await;
        let (_, body) = call_json(&app, "GET", "/api/state", None).await;

        assert_eq!(body["conversations"].as_array().unwrap().len(), 1);
        assert_eq!(body["title"], "Chat");
        assert_eq!(body["persona"], "professional");
        assert_eq!(body["send_state"], "idle");
        assert_eq!(body["speech_output"]["label"], "🔊");
        assert_eq!(body["microphone"]["enabled"], false);
        assert_eq!(body["microphone"]["label"], "Voice input not supported");
    }

    #[tokio::test]
    async fn test_send_shows_placeholder() {
        let app = app().await;
        let (status, body) = call_json(
            &app,
            "POST",
            "/api/send",
            Some(serde_json::json!({ "text": "<b>hi</b>" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["send_state"], "awaiting_reply");
        assert_eq!(body["draft"], "");
        let html = body["transcript_html"].as_str().unwrap();
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(html.contains(r#"<div class="msg bot"><div>...</div></div>"#));
    }

    #[tokio::test]
    async fn test_blank_send_changes_nothing() {
        let app = app().await;
        let (_, body) = call_json(
            &app,
            "POST",
            "/api/send",
            Some(serde_json::json!({ "text": "   " })),
        )
        .await;

        assert_eq!(body["send_state"], "idle");
        assert_eq!(body["transcript_html"], "");
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let app = app().await;
        let (_, state) = call_json(&app, "GET", "/api/state", None).await;
        let id = state["active_id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, "DELETE", &format!("/api/conversations/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call_json(
            &app,
            "DELETE",
            &format!("/api/conversations/{id}?confirm=true"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["active_id"].is_null());
        assert!(body["conversations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_select_and_rename() {
        let app = app().await;
        let (_, first) = call_json(&app, "GET", "/api/state", None).await;
        let first_id = first["active_id"].as_str().unwrap().to_string();

        let (_, created) = call_json(&app, "POST", "/api/conversations", None).await;
        assert_ne!(created["active_id"], first["active_id"]);
        assert_eq!(created["conversations"].as_array().unwrap().len(), 2);

        let (_, renamed) = call_json(
            &app,
            "PUT",
            "/api/title",
            Some(serde_json::json!({ "title": "Ideas" })),
        )
        .await;
        assert_eq!(renamed["title"], "Ideas");

        let (_, selected) = call_json(
            &app,
            "POST",
            &format!("/api/conversations/{first_id}/select"),
            None,
        )
        .await;
        assert_eq!(selected["active_id"], first_id.as_str());
        assert_eq!(selected["title"], "Chat");
    }

    #[tokio::test]
    async fn test_persona_and_speech_toggle() {
        let app = app().await;
        let (_, body) = call_json(
            &app,
            "PUT",
            "/api/persona",
            Some(serde_json::json!({ "persona": "coder" })),
        )
        .await;
        assert_eq!(body["persona"], "coder");
        assert_eq!(body["conversations"][0]["persona"], "coder");

        let (_, body) = call_json(&app, "POST", "/api/speech/toggle", None).await;
        assert_eq!(body["speech_output"]["enabled"], false);
        assert_eq!(body["speech_output"]["label"], "🔈");
    }

    #[tokio::test]
    async fn test_listen_unsupported() {
        let app = app().await;
        let (status, body) = call_json(&app, "POST", "/api/listen", None).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(body["error"], "Voice input not supported");
    }

    #[tokio::test]
    async fn test_export_download() {
        let app = app().await;
        call(
            &app,
            "PUT",
            "/api/draft",
            Some(serde_json::json!({ "text": "hello" })),
        )
        .await;
        call(&app, "POST", "/api/send", None).await;

        let response = app
            .clone()
            .oneshot(Request::get("/api/export").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"conversations.json\""
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let exported: Vec<Conversation> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].messages[0].text, "hello");
        assert!(exported[0].messages[1].is_placeholder());
        assert_ne!(exported[0].messages[1].text, replies::PROFESSIONAL.fallback);
    }
}
