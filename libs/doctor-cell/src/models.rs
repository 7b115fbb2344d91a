use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use shared_database::SupabaseError;
use shared_models::error::AppError;
use shared_models::profile::LinkedUser;
use shared_models::ActiveFilter;
use shared_utils::validation::validate_phone;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub last_name: String,
    pub crm: String,
    pub phone: String,
    pub specialty: String,
    pub birth_date: Option<NaiveDate>,
    pub active: bool,
    #[serde(default)]
    pub user: Option<LinkedUser>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Doctor {
    /// A doctor takes appointments only while both the profile and the identity are active.
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
pub struct DoctorListQuery {
    #[serde(default)]
    pub status: ActiveFilter,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDoctorRequest {
    #[validate(length(min = 2, max = 60, message = "name must have 2 to 60 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 60, message = "last_name must have 2 to 60 characters"))]
    pub last_name: Option<String>,
    #[validate(length(min = 4, max = 20, message = "crm must have 4 to 20 characters"))]
    pub crm: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(length(min = 2, max = 60, message = "specialty must have 2 to 60 characters"))]
    pub specialty: Option<String>,
    pub birth_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("CRM is already registered for another doctor")]
    CrmTaken,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::CrmTaken => AppError::Conflict(err.to_string()),
            DoctorError::Validation(msg) => AppError::ValidationError(msg),
            DoctorError::Database(e) => e.into(),
        }
    }
}
