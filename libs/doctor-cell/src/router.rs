use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/crm/{crm}", get(handlers::get_doctor_by_crm))
        .route("/specialty/{specialty}", get(handlers::get_doctors_by_specialty))
        .route(
            "/{doctor_id}",
            get(handlers::get_doctor).patch(handlers::update_doctor),
        )
        .route("/{doctor_id}/active", patch(handlers::set_doctor_active))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
