use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use doctor_cell::models::{Doctor, DoctorError};
use patient_cell::models::{Patient, PatientError};
use shared_database::SupabaseError;
use shared_models::error::AppError;
use shared_utils::validation::{validate_cpf, validate_phone};

/// Appointment row with both parties embedded.
pub const APPOINTMENT_WITH_PARTIES: &str =
    "select=*,doctor:doctors(*,user:users(email,active)),patient:patients(*,user:users(email,active))";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Appointment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    /// Clinic local wall time, always on a whole minute.
    pub date_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub urgency_level: Option<UrgencyLevel>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<Doctor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Outstanding appointments block another booking for the same doctor and patient.
    pub const PENDING: [AppointmentStatus; 2] = [AppointmentStatus::Scheduled, AppointmentStatus::Confirmed];

    /// These give the slot back; every other status keeps holding it.
    pub const RELEASING: [AppointmentStatus; 2] = [AppointmentStatus::Cancelled, AppointmentStatus::NoShow];

    pub fn is_pending(&self) -> bool {
        Self::PENDING.contains(self)
    }

    /// PostgREST list literal for `in.` filters, e.g. `(scheduled,confirmed)`.
    pub fn filter_list(statuses: &[AppointmentStatus]) -> String {
        let names: Vec<&str> = statuses.iter().map(AppointmentStatus::as_str).collect();
        format!("({})", names.join(","))
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown appointment status: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyLevel::Low => "LOW",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::High => "HIGH",
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Patient created on the fly by an admin while booking. Has no login.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InlinePatient {
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

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookAppointmentRequest {
    #[serde(rename = "dateTime", alias = "date_time")]
    pub date_time: String,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[validate(length(max = 2000, message = "notes must have at most 2000 characters"))]
    pub notes: Option<String>,
    pub doctor_id: Uuid,
    pub patient_id: Option<Uuid>,
    #[validate(nested)]
    pub patient: Option<InlinePatient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    #[serde(rename = "dateTime", alias = "date_time")]
    pub date_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityResponse {
    pub available: Vec<String>,
    pub taken: Vec<String>,
}

/// Count of appointments per status, every status present.
pub type StatusCounts = BTreeMap<String, usize>;

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentStats {
    pub day: StatusCounts,
    pub week: StatusCounts,
    pub month: StatusCounts,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    /// Recipient has no address on file.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationReport {
    pub patient: DeliveryStatus,
    pub doctor: DeliveryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub notifications: NotificationReport,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor is deactivated")]
    DoctorDeactivated,

    #[error("Patient is deactivated")]
    PatientDeactivated,

    #[error("Either patient_id or patient must be provided")]
    PatientRequired,

    #[error("A patient with this cpf already exists")]
    CpfTaken,

    #[error("Patient already has a pending appointment with this doctor")]
    PendingAppointment,

    #[error("This time slot is already booked")]
    SlotTaken,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Cannot change appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] SupabaseError),
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Database(e) => AppointmentError::Database(e),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppointmentError::PatientNotFound,
            PatientError::CpfTaken => AppointmentError::CpfTaken,
            PatientError::Database(e) => AppointmentError::Database(e),
            PatientError::ValidationError(msg) => AppointmentError::ValidationError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::CpfTaken
            | AppointmentError::PendingAppointment
            | AppointmentError::SlotTaken => AppError::Conflict(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DoctorDeactivated
            | AppointmentError::PatientDeactivated
            | AppointmentError::PatientRequired
            | AppointmentError::InvalidTime(_)
            | AppointmentError::InvalidStatusTransition { .. } => AppError::ValidationError(err.to_string()),
            AppointmentError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_and_slot_rules_differ_for_completed() {
        assert!(AppointmentStatus::Scheduled.is_pending());
        assert!(AppointmentStatus::Confirmed.is_pending());
        assert!(!AppointmentStatus::Completed.is_pending());
        // A completed visit keeps its slot but no longer blocks a new booking.
        assert!(!AppointmentStatus::RELEASING.contains(&AppointmentStatus::Completed));
        assert!(AppointmentStatus::RELEASING.contains(&AppointmentStatus::NoShow));
    }

    #[test]
    fn filter_lists_match_postgrest_syntax() {
        assert_eq!(
            AppointmentStatus::filter_list(&AppointmentStatus::PENDING),
            "(scheduled,confirmed)"
        );
        assert_eq!(
            AppointmentStatus::filter_list(&AppointmentStatus::RELEASING),
            "(cancelled,no_show)"
        );
    }

    #[test]
    fn status_parses_from_storage_strings() {
        assert_eq!("no_show".parse::<AppointmentStatus>(), Ok(AppointmentStatus::NoShow));
        assert!("pending".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn appointment_serializes_camel_case() {
        let row = json!({
            "id": Uuid::new_v4(),
            "company_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "date_time": "2030-01-01T08:00:00",
            "status": "scheduled",
            "notes": null,
            "urgency_level": "HIGH",
            "created_at": "2029-12-01T10:00:00Z",
            "updated_at": "2029-12-01T10:00:00Z"
        });
        let appointment: Appointment = serde_json::from_value(row).unwrap();
        let out = serde_json::to_value(&appointment).unwrap();

        assert_eq!(out["dateTime"], "2030-01-01T08:00:00");
        assert_eq!(out["urgencyLevel"], "HIGH");
        assert!(out.get("doctor").is_none());
    }

    #[test]
    fn booking_request_accepts_both_date_spellings() {
        let doctor_id = Uuid::new_v4();
        let camel: BookAppointmentRequest =
            serde_json::from_value(json!({ "dateTime": "2030-01-01T08:00", "doctor_id": doctor_id })).unwrap();
        let snake: BookAppointmentRequest =
            serde_json::from_value(json!({ "date_time": "2030-01-01T08:00", "doctor_id": doctor_id })).unwrap();
        assert_eq!(camel.date_time, snake.date_time);
        assert!(camel.status.is_none());
    }
}
