use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::SecondsFormat;
use tracing::{debug, error, info, warn};

use missive_types::api::{
    Claims, CreateMessageRequest, CreateMessageResponse, ListMessagesQuery, ListMessagesResponse,
};
use missive_types::models::Content;

use crate::auth::AppState;
use crate::error::ApiError;

/// Any authenticated user may send as any sender id and read any
/// recipient's messages; the guard only establishes that a session exists.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = Content::try_from(req.content).map_err(|e| {
        warn!("Rejected message content from {}: {}", claims.username, e);
        ApiError::from(e)
    })?;
    let (sender, recipient) = (req.sender, req.recipient);

    // Run blocking DB transaction off the async runtime
    let writer = state.writer.clone();
    let created = tokio::task::spawn_blocking(move || writer.create_message(sender, recipient, &content))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Store(e.into())
        })?
        .map_err(|e| {
            warn!("Create message from {} to {} failed: {}", sender, recipient, e);
            ApiError::from(e)
        })?;

    info!(
        "Message {} created by {} ({} -> {})",
        created.id, claims.username, sender, recipient
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateMessageResponse {
            id: created.id,
            timestamp: created.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    let ListMessagesQuery { recipient, start, limit } = query;

    // Run blocking DB reads off the async runtime
    let reader = state.reader.clone();
    let messages = tokio::task::spawn_blocking(move || reader.list_messages(recipient, start, limit))
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Store(e.into())
    })??;

    debug!(
        "Listed {} messages for recipient {} from {}",
        messages.len(),
        recipient,
        start
    );

    Ok(Json(ListMessagesResponse { messages }))
}
