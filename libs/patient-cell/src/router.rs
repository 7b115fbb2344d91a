use std::sync::Arc;

use axum::{middleware, routing::{get, patch}, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_patients))
        .route("/me", get(get_my_profile))
        .route("/search", get(search_patients))
        .route("/cpf/{cpf}", get(get_patient_by_cpf))
        .route("/{id}", get(get_patient).patch(update_patient))
        .route("/{id}/active", patch(set_patient_active))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
