use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use shared_database::SupabaseError;
use shared_models::error::AppError;
use shared_models::profile::LinkedUser;
use shared_utils::validation::validate_cnpj;

/// A tenant. Everything else in the system is owned by exactly one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub cnpj: String,
    pub active: bool,
    #[serde(skip_serializing)]
    pub invite_token: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub last_name: String,
    pub cpf: String,
    pub phone: String,
    pub active: bool,
    #[serde(default)]
    pub user: Option<LinkedUser>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 3, max = 20, message = "name must have 3 to 20 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_cnpj"))]
    pub cnpj: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 3, max = 20, message = "name must have 3 to 20 characters"))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_cnpj"))]
    pub cnpj: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompanySearchQuery {
    pub q: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteLink {
    pub invite_link: String,
}

#[derive(Debug, Error)]
pub enum CompanyError {
    #[error("Company not found")]
    NotFound,

    #[error("Company is deactivated")]
    Inactive,

    #[error("cnpj is already registered for another company")]
    CnpjTaken,

    #[error("Invite not found")]
    InviteNotFound,

    #[error("Admin not found")]
    AdminNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

impl From<CompanyError> for AppError {
    fn from(err: CompanyError) -> Self {
        match err {
            CompanyError::NotFound | CompanyError::InviteNotFound | CompanyError::AdminNotFound => {
                AppError::NotFound(err.to_string())
            }
            CompanyError::Inactive => AppError::ValidationError(err.to_string()),
            CompanyError::CnpjTaken => AppError::Conflict(err.to_string()),
            CompanyError::Validation(msg) => AppError::ValidationError(msg),
            CompanyError::Database(e) => e.into(),
        }
    }
}
