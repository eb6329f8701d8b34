//! Admin HTTP API for the load balancer config.
//!
//! Every route sits under `/api/haproxy` and requires the bearer token.

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub const API_PREFIX: &str = "/api/haproxy";

pub fn setup_admin_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/status", get(get_status))
        .route("/config/raw", get(get_raw_config).put(put_raw_config))
        .route("/config/validate", post(validate_config))
        .route("/visualize", get(get_visualization))
        .route("/frontend", post(add_frontend))
        .route("/frontend/{name}", delete(delete_frontend))
        .route("/backend", post(add_backend))
        .route("/backend/{name}", delete(delete_backend))
        .route("/restart", post(restart))
        .route("/user-backends", get(get_user_backends))
        .route("/backups", get(get_backups))
        .route("/section/{kind}/{name}", get(get_section).put(put_section))
        .route("/users/{user}/domains", get(list_user_domains).post(add_user_domain))
        .route(
            "/users/{user}/domains/{domain}",
            put(update_user_domain).delete(delete_user_domain),
        )
        .route("/users/{user}/available-domains", get(get_available_domains))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state);

    Router::new().nest(API_PREFIX, routes)
}
