pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod posts;

use std::sync::Arc;
use sqlx::PgPool;
use actix_web::{web, HttpResponse};
use tracing::info;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, AuthenticatedUser, TokenPair};
pub use db::{DbOperations, MemoryStore, PostRepository, User, UserId, UserRepository};
pub use posts::{PostService, PostView};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Registers every route of the public HTTP surface.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::handlers::register))
                .route("/login", web::post().to(auth::handlers::login))
                .route("/refresh-token", web::post().to(auth::handlers::refresh_token)),
        )
        .service(
            web::scope("/posts")
                .route("", web::get().to(posts::handlers::list_posts))
                .route("", web::post().to(posts::handlers::create_post))
                .route("/{id}", web::get().to(posts::handlers::get_post))
                .route("/{id}", web::put().to(posts::handlers::update_post))
                .route("/{id}", web::delete().to(posts::handlers::delete_post)),
        );
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub post_service: Arc<PostService>,
    pub db_pool: Option<Arc<PgPool>>,
}

impl AppState {
    /// Connects to Postgres and applies migrations, or uses the in-process
    /// store when `database.url` is `memory://`.
    pub async fn new(config: Settings) -> Result<Self> {
        if config.database.is_memory() {
            info!("Using in-memory store");
            return Ok(Self::with_store(config, Arc::new(MemoryStore::new())));
        }

        let db = DbOperations::connect(&config.database).await?;
        db.run_migrations().await?;
        info!("Database connected and migrated");

        let pool = db.pool();
        let mut state = Self::with_store(config, Arc::new(db));
        state.db_pool = Some(pool);
        Ok(state)
    }

    pub fn with_store<S>(config: Settings, store: Arc<S>) -> Self
    where
        S: UserRepository + PostRepository + 'static,
    {
        let auth_service = AuthService::new(store.clone(), &config.auth);
        let post_service = PostService::new(store);

        Self {
            config: Arc::new(config),
            auth_service: Arc::new(auth_service),
            post_service: Arc::new(post_service),
            db_pool: None,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(pool) = &self.db_pool {
            pool.close().await;
        }
        Ok(())
    }
}
