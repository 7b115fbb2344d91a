use std::sync::Arc;

use chrono::NaiveDateTime;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{AppointmentError, AppointmentStatus};
use crate::services::time::format_for_storage;

/// Application level exclusivity checks. They give friendly errors; the unique indexes have the final word.
pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// True when the patient already has a scheduled or confirmed appointment with this doctor.
    pub async fn has_pending_appointment(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?select=id&company_id=eq.{}&doctor_id=eq.{}&patient_id=eq.{}&status=in.{}&limit=1",
            company_id,
            doctor_id,
            patient_id,
            AppointmentStatus::filter_list(&AppointmentStatus::PENDING)
        );
        let pending = self.supabase.select_one::<Value>(&path).await?.is_some();

        if pending {
            warn!("Patient {} already has a pending appointment with doctor {}", patient_id, doctor_id);
        }
        Ok(pending)
    }

    /// True when another appointment still holds the doctor's slot at `date_time`.
    pub async fn is_slot_taken(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
        date_time: NaiveDateTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!("Checking slot {} for doctor {}", date_time, doctor_id);

        let mut path = format!(
            "/rest/v1/appointments?select=id&company_id=eq.{}&doctor_id=eq.{}&date_time=eq.{}&status=not.in.{}",
            company_id,
            doctor_id,
            format_for_storage(date_time),
            AppointmentStatus::filter_list(&AppointmentStatus::RELEASING)
        );
        if let Some(id) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", id));
        }
        path.push_str("&limit=1");

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }
}

/// Storage rejections that correspond to the exclusivity rules.
pub fn map_storage_conflict(err: SupabaseError) -> AppointmentError {
    let message = match &err {
        SupabaseError::Conflict { message, .. } | SupabaseError::Api { message, .. } => message.clone(),
        _ => String::new(),
    };

    if message.contains("slot_taken") || message.contains("appointments_active_slot_key") {
        AppointmentError::SlotTaken
    } else if message.contains("pending_appointment") || message.contains("appointments_pending_pair_key") {
        AppointmentError::PendingAppointment
    } else if message.contains("patient_cpf_taken") || message.contains("patients_company_cpf_key") {
        AppointmentError::CpfTaken
    } else if message.contains("patient_required") {
        AppointmentError::PatientRequired
    } else {
        AppointmentError::Database(err)
    }
}
