use axum::http::HeaderValue;
use engage_api::{
    config::Config,
    db,
    notify::{self, Notifier},
    router, AppState, EngagementService,
};
use tower_http::cors::AllowOrigin;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();

    let pool = db::build_pool(&config.database_url, config.busy_timeout)
        .expect("Failed to create DB pool");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let (notifier, notifications) = Notifier::channel(config.notify_queue);
    tokio::spawn(notify::run_dispatcher(pool.clone(), notifications));

    let state = AppState {
        engagement: EngagementService::new(pool, notifier, config.strict_vote_direction),
        jwt_secret: config.jwt_secret.clone(),
        default_page_size: config.default_page_size,
    };

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .expect("Invalid CORS_ORIGIN");
    let app = router(state, AllowOrigin::exact(origin));

    info!("API server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
