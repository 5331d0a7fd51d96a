pub mod auth;
pub mod error;
pub mod letters;
pub mod media;
pub mod middleware;
pub mod storage;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use garden_db::Database;
use garden_types::models::MediaKind;

use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub jwt_secret: String,
}

/// Builds the full HTTP surface: the login route, the token-protected content
/// routes and the static file mounts for stored uploads.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(health))
        .route("/api/auth/register-login", post(auth::register_login));

    let protected_routes = Router::new()
        .merge(media::routes(MediaKind::Photo))
        .merge(media::routes(MediaKind::Video))
        .route("/api/letters", get(letters::list_letters).post(letters::create_letter))
        .route(
            "/api/letters/{id}",
            put(letters::update_letter).delete(letters::delete_letter),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Mounted per kind so the staging directory under the upload root is never reachable.
    let mut uploads = Router::new();
    for kind in MediaKind::ALL {
        uploads = uploads.nest_service(
            &format!("/uploads/{}", kind.plural()),
            ServeDir::new(state.storage.kind_dir(kind)),
        );
    }

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .merge(uploads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "Our Garden API is running"
}

/// Runs a database call on the blocking pool.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Storage(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::Storage)
}
