use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/register/patient", post(handlers::register_patient))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/validate-reset-code", post(handlers::validate_reset_code))
        .route("/reset-password", post(handlers::reset_password));

    let protected_routes = Router::new()
        .route("/register/doctor", post(handlers::register_doctor))
        .route("/register/admins", post(handlers::register_admin))
        .route("/validate", post(handlers::validate_token))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
