use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use ledger_rs::{
    config::Config,
    db,
    health::health,
    routes::journals::{
        correct_journal, create_journal, get_journal, list_journals, post_journal, reject_journal,
        return_journal_to_review, reverse_journal, review_journal, submit_journal, update_journal,
    },
    routes::ledger::get_account_ledger,
};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting ledger service...");

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        "Configuration loaded: host={}, port={}",
        config.host,
        config.port
    );

    // Database connection
    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    sqlx::migrate!("./db/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Build the application router
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/journals", post(create_journal).get(list_journals))
        .route("/api/journals/{journal_id}", put(update_journal).get(get_journal))
        .route("/api/journals/{journal_id}/submit", post(submit_journal))
        .route("/api/journals/{journal_id}/review", post(review_journal))
        .route("/api/journals/{journal_id}/reject", post(reject_journal))
        .route(
            "/api/journals/{journal_id}/return-to-review",
            post(return_journal_to_review),
        )
        .route("/api/journals/{journal_id}/post", post(post_journal))
        .route("/api/journals/{journal_id}/reverse", post(reverse_journal))
        .route("/api/journals/{journal_id}/correct", post(correct_journal))
        .route("/api/ledger/accounts/{account_id}", get(get_account_ledger))
        .with_state(Arc::new(pool.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    // Bind to the configured address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Ledger service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    // Start the server
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
