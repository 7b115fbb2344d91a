use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use company_cell::models::{CompanyError, CreateCompanyRequest};
use company_cell::services::CompanyService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn service_for(server: &MockServer) -> CompanyService {
    CompanyService::new(&TestConfig::with_mock_server(&server.uri()).to_app_config())
}

#[tokio::test]
async fn deactivation_runs_the_cascade_function() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/set_company_active"))
        .and(body_json(json!({ "company_uuid": company_id, "is_active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::company_row(company_id, false, None),
        ))
        .expect(2)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let first = service.deactivate_company(company_id).await.unwrap();
    let second = service.deactivate_company(company_id).await.unwrap();

    assert!(!first.active);
    assert_eq!(first.active, second.active);
}

#[tokio::test]
async fn reactivation_restores_company() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/set_company_active"))
        .and(body_json(json!({ "company_uuid": company_id, "is_active": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::company_row(company_id, true, None),
        ))
        .mount(&server)
        .await;

    let company = service_for(&server).activate_company(company_id).await.unwrap();
    assert!(company.active);
}

#[tokio::test]
async fn cascade_on_unknown_company_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/set_company_active"))
        .respond_with(ResponseTemplate::new(404).set_body_json(
            MockSupabaseResponses::error_response("company_not_found", "PT404"),
        ))
        .mount(&server)
        .await;

    let err = service_for(&server)
        .deactivate_company(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, CompanyError::NotFound);
}

#[tokio::test]
async fn duplicate_cnpj_is_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/companies"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"companies_cnpj_key\"",
                "23505",
            ),
        ))
        .mount(&server)
        .await;

    let err = service_for(&server)
        .create_company(CreateCompanyRequest {
            name: "Clinica".to_string(),
            cnpj: "11222333000181".to_string(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, CompanyError::CnpjTaken);
}

#[tokio::test]
async fn invite_link_uses_stored_token() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/companies"))
        .and(query_param("id", format!("eq.{}", company_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::company_row(company_id, true, Some("abc123"))
        ])))
        .mount(&server)
        .await;

    let link = service_for(&server).invite_link(company_id).await.unwrap();
    assert_eq!(
        link,
        format!("http://clinic.test/register/patient?companyId={}&token=abc123", company_id)
    );
}

#[tokio::test]
async fn missing_invite_token_is_not_found() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/companies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::company_row(company_id, true, None)
        ])))
        .mount(&server)
        .await;

    let err = service_for(&server).invite_link(company_id).await.unwrap_err();
    assert_matches!(err, CompanyError::InviteNotFound);
}

#[tokio::test]
async fn invite_verification_rejects_wrong_token_and_inactive_company() {
    let server = MockServer::start().await;
    let active_id = Uuid::new_v4();
    let inactive_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/companies"))
        .and(query_param("id", format!("eq.{}", active_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::company_row(active_id, true, Some("good"))
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/companies"))
        .and(query_param("id", format!("eq.{}", inactive_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::company_row(inactive_id, false, Some("good"))
        ])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    assert!(service.verify_invite(active_id, "good").await.is_ok());
    assert_matches!(
        service.verify_invite(active_id, "bad").await.unwrap_err(),
        CompanyError::Validation(_)
    );
    assert_matches!(
        service.verify_invite(inactive_id, "good").await.unwrap_err(),
        CompanyError::Inactive
    );
}
