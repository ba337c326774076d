use serde::{Deserialize, Serialize};

use crate::error::DeviceError;
use crate::handlers::SessionView;
use crate::models::{ClassificationOutcome, FrameBuffer};
use crate::services::encoder::{decode_data_url, decode_frame};

/// Frame posted by the browser: a `data:image/...;base64,` URL taken from a canvas.
#[derive(Debug, Deserialize, Serialize)]
pub struct FrameUpload {
    pub image: String,
}

impl FrameUpload {
    pub fn into_frame(self) -> Result<FrameBuffer, DeviceError> {
        let bytes = decode_data_url(&self.image)?;
        log::debug!("📊 Uploaded frame size: {} bytes", bytes.len());
        Ok(FrameBuffer::new(decode_frame(&bytes)?))
    }
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub outcome: ClassificationOutcome,
    pub session: SessionView,
}

/// Parses an optional JSON frame body; an empty body means "use the current frame".
pub fn parse_optional_upload(body: &[u8]) -> Result<Option<FrameUpload>, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some)
}

#[cfg(feature = "web-server")]
pub mod server {
    use super::*;
    use axum::{
        body::Bytes,
        extract::{DefaultBodyLimit, Path, State},
        http::StatusCode,
        response::{Html, IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tower_http::limit::RequestBodyLimitLayer;
    use tower_http::services::ServeDir;

    use crate::error::SessionError;
    use crate::handlers::session;
    use crate::handlers::{SessionStore, WasteClassifier};
    use crate::models::VALID_CATEGORIES;

    pub struct AppState {
        pub classifier: Arc<WasteClassifier>,
        pub sessions: Arc<SessionStore>,
    }

    pub fn create_router(
        classifier: Arc<WasteClassifier>,
        sessions: Arc<SessionStore>,
        max_frame_bytes: usize,
        static_dir: &str,
    ) -> Router {
        let state = Arc::new(AppState {
            classifier,
            sessions,
        });

        Router::new()
            .route("/", get(index_page))
            .route("/health", get(health_check))
            .route("/api/categories", get(list_categories))
            .route("/api/sessions", post(create_session))
            .route("/api/sessions/:id", get(get_session).delete(delete_session))
            .route("/api/sessions/:id/frame", post(upload_frame))
            .route("/api/sessions/:id/classify", post(classify_frame))
            .route("/api/sessions/:id/stop", post(stop_capture))
            .nest_service("/static", ServeDir::new(static_dir))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_frame_bytes))
            .with_state(state)
    }

    /// Errors that reach the browser as a status code plus `{ "error": ... }`.
    /// Classification failures are not among them: they arrive as an
    /// `unavailable` outcome.
    pub enum ApiError {
        Session(SessionError),
        Device(DeviceError),
        BadRequest(String),
    }

    impl From<SessionError> for ApiError {
        fn from(e: SessionError) -> Self {
            ApiError::Session(e)
        }
    }

    impl From<DeviceError> for ApiError {
        fn from(e: DeviceError) -> Self {
            ApiError::Device(e)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let (status, message) = match self {
                ApiError::Session(e @ SessionError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
                ApiError::Session(e @ SessionError::Busy(_)) => (StatusCode::CONFLICT, e.to_string()),
                ApiError::Device(e @ DeviceError::CaptureStopped) => (StatusCode::CONFLICT, e.to_string()),
                ApiError::Device(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
                ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            };

            if status.is_client_error() {
                log::warn!("⚠️ {} {}", status.as_u16(), message);
            }
            (status, Json(json!({ "error": message }))).into_response()
        }
    }

    fn read_upload(body: &[u8]) -> Result<Option<FrameBuffer>, ApiError> {
        let upload = parse_optional_upload(body).map_err(|e| {
            log::error!("❌ Failed to parse frame upload: {}", e);
            ApiError::BadRequest(format!("invalid frame upload: {}", e))
        })?;

        match upload {
            Some(upload) => Ok(Some(upload.into_frame()?)),
            None => Ok(None),
        }
    }

    async fn index_page() -> Html<&'static str> {
        Html(include_str!("../static/index.html"))
    }

    async fn health_check() -> &'static str {
        "OK"
    }

    async fn list_categories() -> Json<Vec<&'static str>> {
        Json(VALID_CATEGORIES.to_vec())
    }

    async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
        (StatusCode::CREATED, Json(state.sessions.create()))
    }

    async fn get_session(
        Path(id): Path<String>,
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<SessionView>, ApiError> {
        Ok(Json(state.sessions.view(&id)?))
    }

    async fn delete_session(
        Path(id): Path<String>,
        State(state): State<Arc<AppState>>,
    ) -> Result<StatusCode, ApiError> {
        state.sessions.remove(&id)?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn upload_frame(
        Path(id): Path<String>,
        State(state): State<Arc<AppState>>,
        body: Bytes,
    ) -> Result<Json<SessionView>, ApiError> {
        let frame = read_upload(&body)?.ok_or(DeviceError::EmptyFrame)?;

        let lease = state.sessions.checkout(&id)?;
        let result = lease.apply(|s| session::record_frame(s, frame));
        result?;

        Ok(Json(state.sessions.view(&id)?))
    }

    async fn classify_frame(
        Path(id): Path<String>,
        State(state): State<Arc<AppState>>,
        body: Bytes,
    ) -> Result<Json<ClassifyResponse>, ApiError> {
        let frame = read_upload(&body)?;
        log::info!("📸 Classify request for session {} (new frame: {})", id, frame.is_some());

        let lease = state.sessions.checkout(&id)?;
        let classifier = state.classifier.clone();
        let outcome = lease
            .run(|s| async move { session::classify(&classifier, s, frame).await })
            .await?;

        Ok(Json(ClassifyResponse {
            outcome,
            session: state.sessions.view(&id)?,
        }))
    }

    async fn stop_capture(
        Path(id): Path<String>,
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<SessionView>, ApiError> {
        state
            .sessions
            .checkout(&id)?
            .apply(|s| (session::stop(s), ()));

        Ok(Json(state.sessions.view(&id)?))
    }

}
