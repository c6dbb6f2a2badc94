use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use engage_shared::{Notification, UserTitle};

use crate::{auth, error::EngageError, AppState};

/// GET /api/users/:id/titles
pub async fn list_titles(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<UserTitle>>, EngageError> {
    Ok(Json(state.engagement.user_titles(user_id).await?))
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, EngageError> {
    let user_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    Ok(Json(state.engagement.notifications(user_id).await?))
}

/// PUT /api/topics/:id/subscription
pub async fn subscribe_topic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(topic_id): Path<i64>,
) -> Result<StatusCode, EngageError> {
    let user_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    state
        .engagement
        .set_topic_subscription(user_id, topic_id, true)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/topics/:id/subscription
pub async fn unsubscribe_topic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(topic_id): Path<i64>,
) -> Result<StatusCode, EngageError> {
    let user_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    state
        .engagement
        .set_topic_subscription(user_id, topic_id, false)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
