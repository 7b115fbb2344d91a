use axum::body::{to_bytes, Body};
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use company_cell::router::company_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");
    match body {
        Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn only_super_admin_can_deactivate_companies() {
    let config = TestConfig::default();
    let admin = TestUser::admin("admin@clinic.test", Uuid::new_v4());
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);

    let response = company_routes(config.to_arc())
        .oneshot(request("PATCH", &format!("/{}/deactivate", Uuid::new_v4()), &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_company_payload_is_rejected_before_storage() {
    let config = TestConfig::default();
    let root = TestUser::super_admin("root@clinic.test");
    let token = JwtTestUtils::create_test_token(&root, &config.jwt_secret, None);

    let response = company_routes(config.to_arc())
        .oneshot(request("POST", "/", &token, Some(json!({ "name": "AB", "cnpj": "123" }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn admin_gets_invite_link_for_own_company() {
    let server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&server.uri());
    let company_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/companies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::company_row(company_id, true, Some("tok"))
        ])))
        .mount(&server)
        .await;

    let admin = TestUser::admin("admin@clinic.test", company_id);
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);

    let response = company_routes(config.to_arc())
        .oneshot(request("GET", "/invite", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert!(body["inviteLink"].as_str().unwrap().ends_with("token=tok"));
}
