use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub gemini_base_url: String,
    pub gemini_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            gemini_base_url: "http://localhost:54322".to_string(),
            gemini_api_key: String::new(),
        }
    }
}

impl TestConfig {
    /// Points storage (and the classifier) at a mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            gemini_base_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn with_gemini_key(mut self, key: &str) -> Self {
        self.gemini_api_key = key.to_string();
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_key: self.supabase_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
            gemini_base_url: self.gemini_base_url.clone(),
            front_url: "http://clinic.test".to_string(),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
}

impl TestUser {
    pub fn new(email: &str, role: Role, company_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            company_id,
        }
    }

    pub fn doctor(email: &str, company_id: Uuid) -> Self {
        Self::new(email, Role::Doctor, Some(company_id))
    }

    pub fn patient(email: &str, company_id: Uuid) -> Self {
        Self::new(email, Role::Patient, Some(company_id))
    }

    pub fn admin(email: &str, company_id: Uuid) -> Self {
        Self::new(email, Role::Admin, Some(company_id))
    }

    pub fn super_admin(email: &str) -> Self {
        Self::new(email, Role::SuperAdmin, None)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            company_id: self.company_id,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "company_id": user.company_id,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row fixtures shaped like the PostgREST responses the services decode.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn company_row(company_id: Uuid, active: bool, invite_token: Option<&str>) -> Value {
        json!({
            "id": company_id,
            "name": "Clinica Vida",
            "cnpj": "11222333000181",
            "active": active,
            "invite_token": invite_token,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn user_row(user_id: Uuid, email: &str, role: &str, company_id: Option<Uuid>, active: bool) -> Value {
        json!({
            "id": user_id,
            "email": email,
            "password_hash": "",
            "role": role,
            "company_id": company_id,
            "active": active,
            "reset_code": null,
            "reset_code_expires_at": null,
            "reset_code_used": false,
            "last_reset_request_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_row(doctor_id: Uuid, company_id: Uuid, active: bool, user_active: bool) -> Value {
        json!({
            "id": doctor_id,
            "user_id": Uuid::new_v4(),
            "company_id": company_id,
            "name": "Ana",
            "last_name": "Souza",
            "crm": "CRM12345",
            "phone": "+5511987654321",
            "specialty": "Cardiology",
            "birth_date": "1980-05-10",
            "active": active,
            "user": { "email": "doctor@clinic.test", "active": user_active },
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_row(patient_id: Uuid, company_id: Uuid, user_id: Option<Uuid>, active: bool) -> Value {
        let user = user_id.map(|_| json!({ "email": "patient@clinic.test", "active": active }));
        json!({
            "id": patient_id,
            "user_id": user_id,
            "company_id": company_id,
            "name": "Joao",
            "last_name": "Silva",
            "cpf": "52998224725",
            "phone": "+5511912345678",
            "birth_date": "1990-01-01",
            "active": active,
            "user": user,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        company_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        date_time: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "company_id": company_id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "date_time": date_time,
            "status": status,
            "notes": null,
            "urgency_level": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "code": code,
            "message": message,
            "details": null,
            "hint": null
        })
    }
}
