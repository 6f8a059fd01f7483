pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Build the HTTP router. Everything under `/messages` sits behind the
/// session guard.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/check", get(check))
        .route("/users", post(auth::create_user))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route(
            "/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn check() -> &'static str {
    "ok"
}
