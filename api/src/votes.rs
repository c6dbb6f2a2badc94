use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use engage_shared::{CastVote, CommentVoteResponse, PostVoteResponse};

use crate::{auth, error::EngageError, AppState};

/// POST /api/comments/:id/vote; re-voting the same direction withdraws the vote
pub async fn cast_comment_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(comment_id): Path<i64>,
    Json(payload): Json<CastVote>,
) -> Result<Json<CommentVoteResponse>, EngageError> {
    let voter_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let resp = state
        .engagement
        .cast_comment_vote(voter_id, comment_id, &payload.direction)
        .await?;
    Ok(Json(resp))
}

/// POST /api/posts/:id/vote
pub async fn cast_post_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(payload): Json<CastVote>,
) -> Result<Json<PostVoteResponse>, EngageError> {
    let voter_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let resp = state
        .engagement
        .cast_post_vote(voter_id, post_id, &payload.direction)
        .await?;
    Ok(Json(resp))
}
