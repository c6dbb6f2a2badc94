//! Engagement scoring for discussion boards: comment and post votes,
//! rating aggregation, weighted post ranking and topic expert titles,
//! served over a small JSON API.

pub mod auth;
pub mod comments;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod posts;
pub mod ranking;
pub mod rating;
pub mod service;
pub mod titles;
pub mod users;
pub mod votes;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub use error::EngageError;
pub use service::EngagementService;

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub engagement: EngagementService,
    pub jwt_secret: String,
    pub default_page_size: i64,
}

pub fn router(state: AppState, cors_origin: AllowOrigin) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Votes
        .route("/api/comments/{id}/vote", post(votes::cast_comment_vote))
        .route("/api/posts/{id}/vote", post(votes::cast_post_vote))
        // Posts
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/{id}/rating", get(posts::get_rating))
        .route(
            "/api/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/api/posts/{id}/subscription",
            put(posts::subscribe).delete(posts::unsubscribe),
        )
        // Topics & users
        .route(
            "/api/topics/{id}/subscription",
            put(users::subscribe_topic).delete(users::unsubscribe_topic),
        )
        .route("/api/users/{id}/titles", get(users::list_titles))
        .route("/api/notifications", get(users::list_notifications))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
