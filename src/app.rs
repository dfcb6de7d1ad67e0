use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use http::header;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::StoryError;
use crate::models::{StoryRequest, ToneOption, tone_options};
use crate::services::export::{self, ExportError};
use crate::services::storyteller::Storyteller;
use crate::session::SessionStore;
use crate::view::{TransitionError, View, ViewController};

#[derive(Clone)]
pub struct AppState {
    pub storyteller: Arc<Storyteller>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(storyteller: Storyteller) -> Self {
        Self {
            storyteller: Arc::new(storyteller),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/tones", get(list_tones))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(show_session).delete(delete_session))
        .route("/sessions/:id/stories", post(submit_story))
        .route("/sessions/:id/open", post(open_book))
        .route("/sessions/:id/pages/:index", post(turn_page))
        .route("/sessions/:id/new", post(new_story))
        .route("/sessions/:id/export", get(export_story))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

#[derive(Debug)]
pub enum ApiError {
    SessionNotFound(Uuid),
    Transition(TransitionError),
    InvalidRequest(String),
    NothingToExport,
    Export(ExportError),
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        ApiError::Transition(e)
    }
}

impl From<StoryError> for ApiError {
    fn from(e: StoryError) -> Self {
        ApiError::InvalidRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("session {} not found", id))
            }
            ApiError::Transition(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::InvalidRequest(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::NothingToExport => (
                StatusCode::CONFLICT,
                "there is no finished story to export".to_string(),
            ),
            ApiError::Export(e) => {
                tracing::error!("Export failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub view: View,
}

impl SessionView {
    fn new(id: Uuid, controller: &ViewController) -> Self {
        Self {
            id,
            view: controller.view().clone(),
        }
    }
}

async fn index() -> Html<String> {
    let tones: String = tone_options()
        .iter()
        .map(|option| {
            format!(
                "<li><code>{}</code> {}</li>",
                option.value.as_str(),
                html_escape::encode_text(option.label)
            )
        })
        .collect();

    let html_content = format!(
        r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Pixel Saga</title>
        <meta charset="utf-8">
        <style>
            body {{ font-family: Arial, sans-serif; margin: 40px; }}
            .info-box {{ background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }}
            .endpoint {{ background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }}
        </style>
    </head>
    <body>
        <h1>Pixel Saga</h1>

        <div class="info-box">
            <h2>Service Information</h2>
            <p>Turns an idea into an illustrated pixel-art storybook of 1 to 15 pages.</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET /health - Health check</div>
        <div class="endpoint">GET /tones - Available tones</div>
        <div class="endpoint">POST /sessions - Start a session</div>
        <div class="endpoint">GET /sessions/{{id}} - Current view</div>
        <div class="endpoint">DELETE /sessions/{{id}} - End a session</div>
        <div class="endpoint">POST /sessions/{{id}}/stories - Submit {{"idea", "tone", "num_pages"}}</div>
        <div class="endpoint">POST /sessions/{{id}}/open - Open the book from its cover</div>
        <div class="endpoint">POST /sessions/{{id}}/pages/{{index}} - Turn to a page</div>
        <div class="endpoint">POST /sessions/{{id}}/new - Discard the story and start over</div>
        <div class="endpoint">GET /sessions/{{id}}/export - Download the story as EPUB</div>

        <h2>Tones:</h2>
        <ul>{}</ul>
    </body>
    </html>
    "#,
        tones
    );

    Html(html_content)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_tones() -> Json<Vec<ToneOption>> {
    Json(tone_options())
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let (id, controller) = state.sessions.create().await;
    tracing::info!("Created session {}", id);
    (StatusCode::CREATED, Json(SessionView::new(id, &controller)))
}

async fn show_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let controller = state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(SessionView::new(id, &controller)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions.remove(id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    tracing::info!("Deleted session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Moves the session to loading and generates in the background. The session
/// is resolved before the body is looked at.
async fn submit_story(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<StoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let (request, controller) = state
        .sessions
        .update(id, |controller| {
            let Json(request) = body?;
            request.validate()?;
            controller.submit()?;
            Ok::<_, ApiError>(request)
        })
        .await
        .ok_or(ApiError::SessionNotFound(id))??;

    tokio::spawn(generate_in_background(state.clone(), id, request));

    Ok((StatusCode::ACCEPTED, Json(SessionView::new(id, &controller))))
}

async fn generate_in_background(state: AppState, id: Uuid, request: StoryRequest) {
    let result = state.storyteller.create_story(&request).await;

    let outcome = match result {
        Ok(story) => {
            tracing::info!("Session {}: story {:?} is ready", id, story.title);
            state
                .sessions
                .update(id, |controller| controller.succeed(story))
                .await
        }
        Err(e) => {
            tracing::error!("Session {}: error creating story: {}", id, e);
            state
                .sessions
                .update(id, |controller| controller.fail(&e))
                .await
        }
    };

    match outcome {
        Some(Ok(_)) => {}
        Some(Err(e)) => tracing::warn!("Session {}: dropping generation result: {}", id, e),
        None => tracing::warn!("Session {} vanished during generation", id),
    }
}

async fn open_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let controller = apply(&state, id, |controller| controller.open()).await?;
    Ok(Json(SessionView::new(id, &controller)))
}

async fn turn_page(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SessionView>, ApiError> {
    let controller = apply(&state, id, |controller| controller.go_to_page(index)).await?;
    Ok(Json(SessionView::new(id, &controller)))
}

async fn new_story(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let controller = apply(&state, id, |controller| controller.new_story()).await?;
    Ok(Json(SessionView::new(id, &controller)))
}

async fn export_story(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let controller = state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))?;
    let story = controller.story().cloned().ok_or(ApiError::NothingToExport)?;

    let disposition = content_disposition(&export::export_file_name(&story.title));
    let bytes = tokio::task::spawn_blocking(move || export::export_epub(&story))
        .await
        .map_err(|e| ApiError::Export(ExportError::Epub(e.to_string())))?
        .map_err(ApiError::Export)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/epub+zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn apply(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut ViewController) -> Result<(), TransitionError>,
) -> Result<ViewController, ApiError> {
    let ((), controller) = state
        .sessions
        .update(id, f)
        .await
        .ok_or(ApiError::SessionNotFound(id))??;
    Ok(controller)
}

/// `attachment` header with an ASCII fallback and the UTF-8 name per RFC 5987.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '_' })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}
