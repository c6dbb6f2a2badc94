use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use engage_shared::{Paginated, Post, RatingResponse};
use serde::Deserialize;

use crate::{auth, error::EngageError, ranking::SortKey, AppState};

// ── Query params ──

#[derive(Deserialize)]
pub struct PostListParams {
    sort: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
    topic: Option<i64>,
}

// ── Handlers ──

/// GET /api/posts?sort=ratinga&page=1&page_size=10&topic=3
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PostListParams>,
) -> Result<Json<Paginated<Post>>, EngageError> {
    let viewer = auth::viewer_id(&headers, &state.jwt_secret);
    let sort = params.sort.unwrap_or_else(|| SortKey::DEFAULT_KEY.to_string());
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(state.default_page_size);

    let ranked = state
        .engagement
        .rank_posts(viewer, params.topic, &sort, Utc::now(), page, page_size)
        .await?;
    Ok(Json(ranked))
}

/// GET /api/posts/:id/rating
pub async fn get_rating(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<RatingResponse>, EngageError> {
    let rating = state.engagement.post_rating(post_id).await?;
    Ok(Json(RatingResponse { rating }))
}

/// PUT /api/posts/:id/subscription
pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, EngageError> {
    let user_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    state
        .engagement
        .set_post_subscription(user_id, post_id, true)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/posts/:id/subscription
pub async fn unsubscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, EngageError> {
    let user_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    state
        .engagement
        .set_post_subscription(user_id, post_id, false)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
