use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{appointment_routes, availability_routes};
use auth_cell::router::auth_routes;
use company_cell::router::company_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/companies", company_routes(state.clone()))
        .nest(
            "/doctors",
            doctor_routes(state.clone()).merge(availability_routes(state.clone())),
        )
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use shared_utils::test_utils::TestConfig;

    #[tokio::test]
    async fn root_reports_liveness() {
        let response = create_router(TestConfig::default().to_arc())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Clinic API is running!");
    }

    #[tokio::test]
    async fn every_cell_is_mounted_behind_auth() {
        let app = create_router(TestConfig::default().to_arc());

        for uri in [
            "/companies",
            "/doctors",
            "/doctors/00000000-0000-0000-0000-000000000000/availability?date=2030-01-01",
            "/patients/me",
            "/appointments/mine",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
