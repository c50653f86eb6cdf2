pub mod auth;
pub mod middleware;
pub mod page;
pub mod protocol;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use state::{AppState, SessionId};

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use auth::{login_handler, logout_handler};
use page::{health_handler, index_handler};
use rest::{
    clear_history_handler, examples_handler, generate_handler, history_handler, rerun_handler,
    run_handler, sample_handler, session_handler,
};

/// Builds the complete application router.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (logged-in session required)
    let protected_routes = Router::new()
        .route("/session", get(session_handler))
        .route("/examples", get(examples_handler))
        .route("/queries/generate", post(generate_handler))
        .route("/queries/run", post(run_handler))
        .route("/queries/sample", post(sample_handler))
        .route("/history", get(history_handler).delete(clear_history_handler))
        .route("/history/{number}/rerun", post(rerun_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let mut app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = &app_state.config.allowed_origin {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                let cors = CorsLayer::new()
                    .allow_origin(origin)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([CONTENT_TYPE, ACCEPT]);
                app = app.layer(cors);
            }
            Err(e) => warn!("Ignoring invalid ALLOWED_ORIGIN '{}': {}", origin, e),
        }
    }

    app.with_state(app_state)
}
