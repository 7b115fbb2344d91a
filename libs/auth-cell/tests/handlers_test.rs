use axum::body::{to_bytes, Body};
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::auth_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn json_request(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_of(response: axum::response::Response) -> Value {
    serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap()
}

#[tokio::test]
async fn login_with_unknown_email_is_unauthorized() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let response = auth_routes(config.to_arc())
        .oneshot(json_request(
            "/login",
            None,
            json!({ "email": "ghost@clinic.test", "password": "whatever" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_of(response).await["kind"], "unauthorized");
}

#[tokio::test]
async fn login_for_deactivated_user_is_forbidden() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(Uuid::new_v4(), "ana@clinic.test", "patient", Some(Uuid::new_v4()), false)
        ])))
        .mount(&server)
        .await;

    let response = auth_routes(config.to_arc())
        .oneshot(json_request(
            "/login",
            None,
            json!({ "email": "ana@clinic.test", "password": "whatever" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_login_payload_is_a_validation_error() {
    let config = TestConfig::default();

    let response = auth_routes(config.to_arc())
        .oneshot(json_request("/login", None, json!({ "email": "not-an-email", "password": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(response).await["kind"], "validation");
}

#[tokio::test]
async fn doctor_registration_requires_admin() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doc@clinic.test", Uuid::new_v4());
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let body = json!({
        "email": "house@clinic.test",
        "password": "vicodin-123",
        "profile": {
            "name": "Gregory",
            "last_name": "House",
            "crm": "CRM98765",
            "phone": "+5511912345678",
            "specialty": "Diagnostics"
        }
    });

    let response = auth_routes(config.to_arc())
        .oneshot(json_request("/register/doctor", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn doctor_registration_without_token_is_unauthorized() {
    let config = TestConfig::default();

    let response = auth_routes(config.to_arc())
        .oneshot(json_request("/register/doctor", None, json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validate_echoes_the_token_identity() {
    let config = TestConfig::default();
    let company_id = Uuid::new_v4();
    let patient = TestUser::patient("pat@clinic.test", company_id);
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let response = auth_routes(config.to_arc())
        .oneshot(json_request("/validate", Some(&token), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_of(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["role"], "patient");
    assert_eq!(body["company_id"], company_id.to_string());
}

#[tokio::test]
async fn expired_token_fails_validation() {
    let config = TestConfig::default();
    let patient = TestUser::patient("pat@clinic.test", Uuid::new_v4());
    let token = JwtTestUtils::create_expired_token(&patient, &config.jwt_secret);

    let response = auth_routes(config.to_arc())
        .oneshot(json_request("/validate", Some(&token), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_reset_code_is_rejected() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row(Uuid::new_v4(), "ana@clinic.test", "patient", Some(Uuid::new_v4()), true)
        ])))
        .mount(&server)
        .await;

    let response = auth_routes(config.to_arc())
        .oneshot(json_request(
            "/validate-reset-code",
            None,
            json!({ "email": "ana@clinic.test", "code": "1234" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_of(response).await["error"], "Invalid or expired code");
}
