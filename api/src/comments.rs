use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use engage_shared::{Comment, CommentView, CreateComment};

use crate::{auth, error::EngageError, AppState};

/// GET /api/posts/:id/comments
pub async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentView>>, EngageError> {
    let viewer = auth::viewer_id(&headers, &state.jwt_secret);
    let comments = state.engagement.comments_for_post(post_id, viewer).await?;
    Ok(Json(comments))
}

/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateComment>,
) -> Result<Json<Comment>, EngageError> {
    let user_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let comment = state
        .engagement
        .add_comment(user_id, post_id, &payload.body)
        .await?;
    Ok(Json(comment))
}
