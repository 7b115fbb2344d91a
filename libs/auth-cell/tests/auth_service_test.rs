use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::models::{
    AdminProfileInput, AuthError, DoctorProfileInput, LoginRequest, PatientProfileInput,
    RegisterAdminRequest, RegisterDoctorRequest, RegisterPatientRequest,
};
use auth_cell::services::password::hash_password;
use auth_cell::services::AuthService;
use company_cell::CompanyError;
use shared_mailer::RecordingMailer;
use shared_models::auth::Role;
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn service_with(server: &MockServer, mailer: Arc<RecordingMailer>) -> AuthService {
    AuthService::with_mailer(&TestConfig::with_mock_server(&server.uri()).to_app_config(), mailer)
}

fn user_with_password(id: Uuid, email: &str, company_id: Uuid, active: bool, password: &str) -> Value {
    let mut row = MockSupabaseResponses::user_row(id, email, "patient", Some(company_id), active);
    row["password_hash"] = json!(hash_password(password).unwrap());
    row
}

async fn mount_users(server: &MockServer, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

async fn mount_company(server: &MockServer, company_id: Uuid, invite_token: Option<&str>) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/companies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::company_row(company_id, true, invite_token)
        ])))
        .mount(server)
        .await;
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

fn patient_request(email: &str) -> RegisterPatientRequest {
    RegisterPatientRequest {
        email: email.to_string(),
        password: "correct-horse".to_string(),
        profile: PatientProfileInput {
            name: "Ana".to_string(),
            last_name: "Souza".to_string(),
            cpf: "52998224725".to_string(),
            phone: "+5511987654321".to_string(),
            birth_date: Some("1990-04-12".to_string()),
        },
    }
}

fn doctor_request() -> RegisterDoctorRequest {
    RegisterDoctorRequest {
        email: "house@clinic.test".to_string(),
        password: "vicodin-123".to_string(),
        profile: DoctorProfileInput {
            name: "Gregory".to_string(),
            last_name: "House".to_string(),
            crm: "CRM98765".to_string(),
            phone: "+5511912345678".to_string(),
            specialty: "Diagnostics".to_string(),
            birth_date: None,
        },
    }
}

#[tokio::test]
async fn login_issues_a_token_for_the_stored_identity() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    let company_id = Uuid::new_v4();
    let config = TestConfig::with_mock_server(&server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.ana@clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_with_password(user_id, "ana@clinic.test", company_id, true, "correct-horse")
        ])))
        .mount(&server)
        .await;

    let token = service_with(&server, Arc::new(RecordingMailer::new()))
        .login(login(" Ana@Clinic.test ", "correct-horse"))
        .await
        .unwrap();

    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, 24 * 3600);

    let user = validate_token(&token.access_token, &config.jwt_secret).unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.role, Role::Patient);
    assert_eq!(user.company_id, Some(company_id));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.ana@clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_with_password(Uuid::new_v4(), "ana@clinic.test", company_id, true, "correct-horse")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", "eq.ghost@clinic.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = service_with(&server, Arc::new(RecordingMailer::new()));

    assert_matches!(
        service.login(login("ana@clinic.test", "battery-staple")).await,
        Err(AuthError::InvalidCredentials)
    );
    assert_matches!(
        service.login(login("ghost@clinic.test", "correct-horse")).await,
        Err(AuthError::InvalidCredentials)
    );
}

#[tokio::test]
async fn deactivated_user_cannot_login() {
    let server = MockServer::start().await;
    mount_users(
        &server,
        json!([user_with_password(Uuid::new_v4(), "ana@clinic.test", Uuid::new_v4(), false, "correct-horse")]),
    )
    .await;

    let result = service_with(&server, Arc::new(RecordingMailer::new()))
        .login(login("ana@clinic.test", "correct-horse"))
        .await;

    assert_matches!(result, Err(AuthError::UserDeactivated));
}

#[tokio::test]
async fn patient_registration_rejects_a_wrong_invite_token() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    mount_company(&server, company_id, Some("real-token")).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/register_user_with_profile"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = service_with(&server, Arc::new(RecordingMailer::new()))
        .register_patient_with_invite(company_id, "forged", patient_request("ana@clinic.test"))
        .await;

    assert_matches!(result, Err(AuthError::Company(CompanyError::Validation(_))));
}

#[tokio::test]
async fn patient_registration_with_taken_email_is_conflict() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    mount_company(&server, company_id, Some("tok")).await;
    mount_users(
        &server,
        json!([MockSupabaseResponses::user_row(Uuid::new_v4(), "ana@clinic.test", "patient", Some(company_id), true)]),
    )
    .await;

    let result = service_with(&server, Arc::new(RecordingMailer::new()))
        .register_patient_with_invite(company_id, "tok", patient_request("ana@clinic.test"))
        .await;

    assert_matches!(result, Err(AuthError::EmailTaken));
}

#[tokio::test]
async fn patient_registration_creates_identity_and_profile_together() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    mount_company(&server, company_id, Some("tok")).await;
    mount_users(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/register_user_with_profile"))
        .and(body_partial_json(json!({
            "p_email": "ana@clinic.test",
            "p_role": "patient",
            "p_company_id": company_id,
            "p_profile": { "cpf": "52998224725", "birth_date": "1990-04-12" },
            "p_invite_token": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::user_row(user_id, "ana@clinic.test", "patient", Some(company_id), true),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let user = service_with(&server, Arc::new(RecordingMailer::new()))
        .register_patient_with_invite(company_id, "tok", patient_request("Ana@clinic.test"))
        .await
        .unwrap();

    assert_eq!(user.id, user_id);
    assert_eq!(user.role, Role::Patient);
}

#[tokio::test]
async fn doctor_registration_emails_a_welcome_note() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    mount_company(&server, company_id, None).await;
    mount_users(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("crm", "eq.CRM98765"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/register_user_with_profile"))
        .and(body_partial_json(json!({ "p_role": "doctor", "p_company_id": company_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::user_row(user_id, "house@clinic.test", "doctor", Some(company_id), true),
        ))
        .mount(&server)
        .await;

    let mailer = Arc::new(RecordingMailer::new());
    let admin = TestUser::admin("admin@clinic.test", company_id).to_user();

    let doctor = service_with(&server, mailer.clone())
        .register_doctor(&admin, doctor_request())
        .await
        .unwrap();

    assert_eq!(doctor.role, Role::Doctor);
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "house@clinic.test");
    assert!(!sent[0].text.contains("vicodin-123"));
}

#[tokio::test]
async fn doctor_registration_race_on_crm_is_conflict() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    mount_company(&server, company_id, None).await;
    mount_users(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/register_user_with_profile"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "duplicate key value violates unique constraint \"doctors_crm_key\"",
            "23505",
        )))
        .mount(&server)
        .await;

    let mailer = Arc::new(RecordingMailer::new());
    let admin = TestUser::admin("admin@clinic.test", company_id).to_user();

    let result = service_with(&server, mailer.clone())
        .register_doctor(&admin, doctor_request())
        .await;

    assert_matches!(result, Err(AuthError::CrmTaken));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn admin_registration_rotates_the_invite_token() {
    let server = MockServer::start().await;
    let company_id = Uuid::new_v4();
    mount_company(&server, company_id, Some("old-token")).await;
    mount_users(&server, json!([])).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/admins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/register_user_with_profile"))
        .and(body_partial_json(json!({ "p_role": "admin" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::user_row(Uuid::new_v4(), "boss@clinic.test", "admin", Some(company_id), true),
        ))
        .mount(&server)
        .await;

    let root = TestUser::super_admin("root@clinic.test").to_user();
    let request = RegisterAdminRequest {
        email: "boss@clinic.test".to_string(),
        password: "boss-password".to_string(),
        company_id,
        profile: AdminProfileInput {
            name: "Clara".to_string(),
            last_name: "Lima".to_string(),
            cpf: "52998224725".to_string(),
            phone: "+5511955554444".to_string(),
        },
    };

    let (admin, link) = service_with(&server, Arc::new(RecordingMailer::new()))
        .register_admin(&root, request)
        .await
        .unwrap();

    assert_eq!(admin.role, Role::Admin);
    assert!(link.contains(&company_id.to_string()));
    assert!(!link.ends_with("token=old-token"));

    let requests = server.received_requests().await.unwrap();
    let rpc = requests
        .iter()
        .find(|r| r.url.path().ends_with("register_user_with_profile"))
        .unwrap();
    let body: Value = serde_json::from_slice(&rpc.body).unwrap();
    let token = body["p_invite_token"].as_str().unwrap();
    assert_eq!(token.len(), 32);
    assert!(link.ends_with(token));
}

#[tokio::test]
async fn only_admins_register_doctors() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("pat@clinic.test", Uuid::new_v4()).to_user();

    let result = service_with(&server, Arc::new(RecordingMailer::new()))
        .register_doctor(&patient, doctor_request())
        .await;

    assert_matches!(result, Err(AuthError::Forbidden(_)));
}
