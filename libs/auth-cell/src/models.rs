use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use company_cell::CompanyError;
use shared_database::SupabaseError;
use shared_mailer::MailError;
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::validation::{validate_cpf, validate_phone};

/// Row of the `users` table. Never serialized back to clients.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub active: bool,
    pub reset_code: Option<String>,
    pub reset_code_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reset_code_used: bool,
    pub last_reset_request_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub active: bool,
}

impl From<UserRecord> for UserSummary {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            company_id: user.company_id,
            active: user.active,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PatientProfileInput {
    #[validate(length(min = 2, max = 60, message = "name must have 2 to 60 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 60, message = "last_name must have 2 to 60 characters"))]
    pub last_name: String,
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    pub birth_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DoctorProfileInput {
    #[validate(length(min = 2, max = 60, message = "name must have 2 to 60 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 60, message = "last_name must have 2 to 60 characters"))]
    pub last_name: String,
    #[validate(length(min = 4, max = 20, message = "crm must have 4 to 20 characters"))]
    pub crm: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(min = 2, max = 60, message = "specialty must have 2 to 60 characters"))]
    pub specialty: String,
    pub birth_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AdminProfileInput {
    #[validate(length(min = 2, max = 60, message = "name must have 2 to 60 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 60, message = "last_name must have 2 to 60 characters"))]
    pub last_name: String,
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPatientRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must have at least 8 characters"))]
    pub password: String,
    #[validate(nested)]
    pub profile: PatientProfileInput,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDoctorRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must have at least 8 characters"))]
    pub password: String,
    #[validate(nested)]
    pub profile: DoctorProfileInput,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAdminRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must have at least 8 characters"))]
    pub password: String,
    pub company_id: Uuid,
    #[validate(nested)]
    pub profile: AdminProfileInput,
}

#[derive(Debug, Deserialize)]
pub struct InviteQuery {
    #[serde(rename = "companyId")]
    pub company_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateResetCodeRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 4, max = 4, message = "code must have 4 digits"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "email must be valid"))]
    pub email: String,
    #[validate(length(min = 4, max = 4, message = "code must have 4 digits"))]
    pub code: String,
    #[validate(length(min = 8, message = "new_password must have at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User is deactivated")]
    UserDeactivated,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already in use")]
    EmailTaken,

    #[error("CRM already in use")]
    CrmTaken,

    #[error("CPF already in use")]
    CpfTaken,

    #[error("Invalid or expired code")]
    InvalidResetCode,

    #[error("You must wait {remaining_seconds} seconds before requesting another reset code.")]
    ResetCooldown { remaining_seconds: i64 },

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Token signing failed: {0}")]
    Token(String),

    #[error(transparent)]
    Company(#[from] CompanyError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::UserDeactivated | AuthError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::EmailTaken | AuthError::CrmTaken | AuthError::CpfTaken => {
                AppError::Conflict(err.to_string())
            }
            AuthError::InvalidResetCode | AuthError::ResetCooldown { .. } => {
                AppError::ValidationError(err.to_string())
            }
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::PasswordHash(_) | AuthError::Token(_) => AppError::Internal(err.to_string()),
            AuthError::Company(e) => e.into(),
            AuthError::Mail(e) => AppError::ExternalService(e.to_string()),
            AuthError::Database(e) => e.into(),
        }
    }
}
