use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{DesignForm, DesignRequest, DesignSession, EditOutcome, EditRequest},
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/health", get(health))
        .route("/api/designs", post(create_designs))
        .route("/api/designs/:id", get(get_designs).delete(reset_designs))
        .route("/api/designs/:id/suggestions/:suggestion_id/edit", post(edit_suggestion))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn create_designs(
    State(state): State<AppState>,
    Json(form): Json<DesignForm>,
) -> Result<Json<DesignSession>, AppError> {
    let request = DesignRequest::try_from(form)?;
    tracing::info!(
        "🚀 New design request: {} / {} on {}m x {}m (plot photo: {})",
        request.house_type,
        request.style,
        request.land_width,
        request.land_length,
        request.image.mime_type()
    );
    let session = state.submit(request).await?;
    Ok(Json(session))
}

pub async fn get_designs(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<DesignSession>, AppError> {
    Ok(Json(state.session(id)?))
}

pub async fn edit_suggestion(
    Path((id, suggestion_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
    Json(body): Json<EditRequest>,
) -> Result<Json<EditOutcome>, AppError> {
    let outcome = state.edit(id, suggestion_id, &body.instruction).await?;
    Ok(Json(outcome))
}

pub async fn reset_designs(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.reset(id)?;
    Ok(StatusCode::NO_CONTENT)
}
