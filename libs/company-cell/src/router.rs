use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn company_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_companies).post(handlers::create_company))
        .route("/search", get(handlers::search_companies))
        .route("/invite", get(handlers::get_invite_link))
        .route("/admins/{user_id}/deactivate", patch(handlers::deactivate_admin))
        .route("/{company_id}", patch(handlers::update_company))
        .route("/{company_id}/admins", get(handlers::list_company_admins))
        .route("/{company_id}/deactivate", patch(handlers::deactivate_company))
        .route("/{company_id}/activate", patch(handlers::activate_company))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
