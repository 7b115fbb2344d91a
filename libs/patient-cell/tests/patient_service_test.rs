use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::{PatientError, UpdatePatientRequest};
use patient_cell::services::PatientService;
use shared_models::ActiveFilter;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn service_for(server: &MockServer) -> PatientService {
    PatientService::new(&TestConfig::with_mock_server(&server.uri()).to_app_config())
}

#[tokio::test]
async fn me_resolves_profile_by_identity() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .and(query_param("company_id", format!("eq.{}", company_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(patient_id, company_id, Some(user_id), true)
        ])))
        .mount(&server)
        .await;

    let patient = service_for(&server).find_by_user(company_id, user_id).await.unwrap();
    assert_eq!(patient.id, patient_id);
    assert_eq!(patient.email(), Some("patient@clinic.test"));
}

#[tokio::test]
async fn unknown_cpf_returns_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("cpf", "eq.52998224725"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let found = service_for(&server)
        .find_by_cpf(Uuid::new_v4(), "52998224725")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn inline_patients_count_as_active_without_identity() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(Uuid::new_v4(), company_id, None, true),
            MockSupabaseResponses::patient_row(Uuid::new_v4(), company_id, Some(Uuid::new_v4()), false),
        ])))
        .mount(&server)
        .await;

    let active = service_for(&server)
        .list_patients(company_id, ActiveFilter::Active)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].user_id.is_none());
}

#[tokio::test]
async fn blank_search_is_rejected() {
    let server = MockServer::start().await;
    let err = service_for(&server)
        .search_by_name(Uuid::new_v4(), "   ")
        .await
        .unwrap_err();
    assert_matches!(err, PatientError::ValidationError(_));
}

#[tokio::test]
async fn duplicate_cpf_on_update_is_conflict() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(patient_id, company_id, None, true)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"patients_company_cpf_key\"",
                "23505",
            ),
        ))
        .mount(&server)
        .await;

    let request = UpdatePatientRequest {
        name: None,
        last_name: None,
        cpf: Some("52998224725".to_string()),
        phone: None,
        birth_date: None,
    };
    let err = service_for(&server)
        .update_patient(company_id, patient_id, request)
        .await
        .unwrap_err();
    assert_matches!(err, PatientError::CpfTaken);
}

#[tokio::test]
async fn inline_patient_deactivation_patches_profile_only() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(patient_id, company_id, None, false)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "active": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/set_user_active"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let patient = service_for(&server)
        .set_active(company_id, patient_id, false)
        .await
        .unwrap();
    assert!(!patient.active);
}
