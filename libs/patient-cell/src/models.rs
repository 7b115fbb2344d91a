use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared_database::SupabaseError;
use shared_models::error::AppError;
use shared_models::profile::LinkedUser;
use shared_models::ActiveFilter;
use shared_utils::validation::{validate_cpf, validate_phone};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Absent for patients registered inline by an admin while booking.
    pub user_id: Option<Uuid>,
    pub company_id: Uuid,
    pub name: String,
    pub last_name: String,
    pub cpf: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub active: bool,
    #[serde(default)]
    pub user: Option<LinkedUser>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn is_bookable(&self) -> bool {
        self.active && self.user.as_ref().map_or(true, |u| u.active)
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientListQuery {
    #[serde(default)]
    pub status: ActiveFilter,
}

#[derive(Debug, Deserialize)]
pub struct PatientSearchQuery {
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePatientRequest {
    #[validate(length(min = 2, max = 60, message = "name must have 2 to 60 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 60, message = "last_name must have 2 to 60 characters"))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub birth_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("cpf is already registered for another patient")]
    CpfTaken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::CpfTaken => AppError::Conflict(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Database(e) => e.into(),
        }
    }
}
