use std::sync::Arc;

use chrono::{Local, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorError};
use doctor_cell::services::DoctorService;
use patient_cell::models::{Patient, PatientError};
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_mailer::{mailer_from_config, Mailer};
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::validation::parse_birth_date;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookingOutcome,
    InlinePatient, APPOINTMENT_WITH_PARTIES,
};
use crate::services::conflict::{map_storage_conflict, ConflictDetectionService};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::NotificationService;
use crate::services::time::{clinic_now, ensure_future, format_for_storage, parse_date_time};
use crate::services::urgency::{GeminiUrgencyClassifier, UrgencyClassifier};

const NOT_YOURS: &str = "Not allowed to access this appointment";

enum PatientTarget {
    Existing(Patient),
    Inline(InlinePatient),
}

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    doctors: DoctorService,
    patients: PatientService,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    classifier: Arc<dyn UrgencyClassifier>,
    notifier: NotificationService,
    clock_skew_seconds: i64,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_adapters(
            config,
            Arc::new(GeminiUrgencyClassifier::new(config)),
            mailer_from_config(config),
        )
    }

    pub fn with_adapters(
        config: &AppConfig,
        classifier: Arc<dyn UrgencyClassifier>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            supabase: Arc::clone(&supabase),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
            conflict_service: ConflictDetectionService::new(supabase),
            lifecycle_service: AppointmentLifecycleService::new(),
            classifier,
            notifier: NotificationService::new(mailer),
            clock_skew_seconds: config.booking_clock_skew_seconds,
        }
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    /// Book a slot with a doctor of the caller's company.
    ///
    /// Checks run cheapest first and stop at the first failure. The insert itself goes through
    /// `book_appointment`, which serializes bookings per doctor and creates an inline patient in
    /// the same transaction, so the slot and pending rules hold even when two requests race.
    #[instrument(skip(self, caller, request), fields(doctor_id = %request.doctor_id))]
    pub async fn book_appointment(
        &self,
        company_id: Uuid,
        caller: &User,
        request: BookAppointmentRequest,
    ) -> Result<BookingOutcome, AppointmentError> {
        let doctor = self
            .doctors
            .find_in_company(company_id, request.doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;
        if !doctor.is_bookable() {
            return Err(AppointmentError::DoctorDeactivated);
        }

        let target = self.resolve_patient(company_id, caller, &request).await?;
        if let PatientTarget::Existing(patient) = &target {
            if !patient.is_bookable() {
                return Err(AppointmentError::PatientDeactivated);
            }
        }

        let date_time = parse_date_time(&request.date_time)?;
        ensure_future(date_time, clinic_now(), self.clock_skew_seconds)?;

        let status = request.status.unwrap_or(AppointmentStatus::Scheduled);
        self.lifecycle_service.ensure_initial(status)?;

        if let PatientTarget::Existing(patient) = &target {
            if self
                .conflict_service
                .has_pending_appointment(company_id, doctor.id, patient.id)
                .await?
            {
                return Err(AppointmentError::PendingAppointment);
            }
        }

        if self
            .conflict_service
            .is_slot_taken(company_id, doctor.id, date_time, None)
            .await?
        {
            return Err(AppointmentError::SlotTaken);
        }

        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let urgency = match &notes {
            Some(text) => Some(self.classifier.classify(text).await),
            None => None,
        };

        let (patient_id, inline) = match &target {
            PatientTarget::Existing(patient) => (Some(patient.id), None),
            PatientTarget::Inline(inline) => (None, Some(inline_payload(inline)?)),
        };

        let args = json!({
            "p_company_id": company_id,
            "p_doctor_id": doctor.id,
            "p_patient_id": patient_id,
            "p_patient": inline,
            "p_date_time": format_for_storage(date_time),
            "p_status": status,
            "p_notes": notes,
            "p_urgency_level": urgency,
        });

        let mut appointment: Appointment = self
            .supabase
            .rpc("book_appointment", args)
            .await
            .map_err(map_storage_conflict)?;

        info!(
            appointment_id = %appointment.id,
            date_time = %appointment.date_time,
            "Appointment booked"
        );

        let patient = match target {
            PatientTarget::Existing(patient) => patient,
            PatientTarget::Inline(_) => {
                self.patients
                    .get_patient(company_id, appointment.patient_id)
                    .await?
            }
        };

        let notifications = self.notifier.notify_booking(&appointment, &doctor, &patient).await;

        appointment.doctor = Some(doctor);
        appointment.patient = Some(patient);

        Ok(BookingOutcome {
            appointment,
            notifications,
        })
    }

    async fn resolve_patient(
        &self,
        company_id: Uuid,
        caller: &User,
        request: &BookAppointmentRequest,
    ) -> Result<PatientTarget, AppointmentError> {
        if caller.role == Role::Patient {
            let own = self.caller_patient(company_id, caller).await?;
            let other_patient = request.patient_id.is_some_and(|id| id != own.id);
            if other_patient || request.patient.is_some() {
                return Err(AppointmentError::Forbidden(
                    "Patients can only book for themselves".to_string(),
                ));
            }
            return Ok(PatientTarget::Existing(own));
        }

        match (request.patient_id, &request.patient) {
            (Some(patient_id), None) => {
                let patient = self
                    .patients
                    .find_in_company(company_id, patient_id)
                    .await?
                    .ok_or(AppointmentError::PatientNotFound)?;
                Ok(PatientTarget::Existing(patient))
            }
            (None, Some(inline)) => {
                if self.patients.find_by_cpf(company_id, &inline.cpf).await?.is_some() {
                    return Err(AppointmentError::CpfTaken);
                }
                Ok(PatientTarget::Inline(inline.clone()))
            }
            _ => Err(AppointmentError::PatientRequired),
        }
    }

    // ==========================================================================
    // CHANGES TO EXISTING APPOINTMENTS
    // ==========================================================================

    #[instrument(skip(self, caller, raw_date_time))]
    pub async fn reschedule_appointment(
        &self,
        company_id: Uuid,
        caller: &User,
        appointment_id: Uuid,
        raw_date_time: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(company_id, appointment_id).await?;
        self.authorize(company_id, caller, &appointment, &[Role::Admin, Role::Patient])
            .await?;
        self.lifecycle_service.ensure_reschedulable(appointment.status)?;

        let date_time = parse_date_time(raw_date_time)?;
        ensure_future(date_time, clinic_now(), self.clock_skew_seconds)?;

        let doctor = self.doctor_of(company_id, &appointment).await?;
        if !doctor.is_bookable() {
            return Err(AppointmentError::DoctorDeactivated);
        }
        let patient = self.patient_of(company_id, &appointment).await?;
        if !patient.is_bookable() {
            return Err(AppointmentError::PatientDeactivated);
        }

        if self
            .conflict_service
            .is_slot_taken(company_id, appointment.doctor_id, date_time, Some(appointment.id))
            .await?
        {
            return Err(AppointmentError::SlotTaken);
        }

        // Only moves an appointment that is still outstanding at write time.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&company_id=eq.{}&status=in.{}",
            appointment.id,
            company_id,
            AppointmentStatus::filter_list(&AppointmentStatus::PENDING)
        );
        let changes = json!({
            "date_time": format_for_storage(date_time),
            "updated_at": Utc::now().to_rfc3339(),
        });
        let updated: Vec<Value> = self
            .supabase
            .update(&path, changes)
            .await
            .map_err(map_storage_conflict)?;
        if updated.is_empty() {
            let current = self.load(company_id, appointment.id).await?;
            warn!(
                "Appointment {} changed to {} before it could be moved",
                appointment.id, current.status
            );
            self.lifecycle_service.ensure_reschedulable(current.status)?;
            return Err(AppointmentError::NotFound);
        }

        info!("Appointment {} moved to {}", appointment.id, date_time);
        self.load(company_id, appointment.id).await
    }

    /// Cancelling an already cancelled appointment returns it untouched.
    #[instrument(skip(self, caller))]
    pub async fn cancel_appointment(
        &self,
        company_id: Uuid,
        caller: &User,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(company_id, appointment_id).await?;
        self.authorize(
            company_id,
            caller,
            &appointment,
            &[Role::Admin, Role::Patient, Role::Doctor],
        )
        .await?;

        if appointment.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} already cancelled", appointment.id);
            return Ok(appointment);
        }

        self.change_status(company_id, appointment, AppointmentStatus::Cancelled)
            .await
    }

    #[instrument(skip(self, caller))]
    pub async fn update_status(
        &self,
        company_id: Uuid,
        caller: &User,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(company_id, appointment_id).await?;
        self.authorize(company_id, caller, &appointment, &[Role::Admin])
            .await?;

        if appointment.status == new_status {
            return Ok(appointment);
        }

        self.change_status(company_id, appointment, new_status).await
    }

    /// Writes are conditional on the status read, so two racing changes cannot both win.
    async fn change_status(
        &self,
        company_id: Uuid,
        appointment: Appointment,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle_service
            .validate_status_transition(appointment.status, new_status)?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&company_id=eq.{}&status=eq.{}",
            appointment.id, company_id, appointment.status
        );
        let changes = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339(),
        });
        let updated: Vec<Value> = self.supabase.update(&path, changes).await?;

        let current = self.load(company_id, appointment.id).await?;
        if updated.is_empty() && current.status != new_status {
            warn!(
                "Appointment {} changed to {} concurrently",
                appointment.id, current.status
            );
            return Err(AppointmentError::InvalidStatusTransition {
                from: current.status,
                to: new_status,
            });
        }

        info!(
            "Appointment {} status {} -> {}",
            appointment.id, appointment.status, new_status
        );
        Ok(current)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(
        &self,
        company_id: Uuid,
        caller: &User,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(company_id, appointment_id).await?;
        self.authorize(
            company_id,
            caller,
            &appointment,
            &[Role::Admin, Role::Patient, Role::Doctor],
        )
        .await?;
        Ok(appointment)
    }

    /// Tenant scoped fetch with both parties embedded.
    pub async fn load(&self, company_id: Uuid, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&company_id=eq.{}&{}",
            appointment_id, company_id, APPOINTMENT_WITH_PARTIES
        );
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    /// Admins see everything in their company, patients and doctors only their own appointments.
    async fn authorize(
        &self,
        company_id: Uuid,
        caller: &User,
        appointment: &Appointment,
        allowed: &[Role],
    ) -> Result<(), AppointmentError> {
        if !allowed.contains(&caller.role) {
            return Err(AppointmentError::Forbidden(NOT_YOURS.to_string()));
        }

        let owns = match caller.role {
            Role::Admin => true,
            Role::Patient => self.caller_patient(company_id, caller).await?.id == appointment.patient_id,
            Role::Doctor => self.caller_doctor(company_id, caller).await?.id == appointment.doctor_id,
            Role::SuperAdmin => false,
        };

        if owns {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden(NOT_YOURS.to_string()))
        }
    }

    async fn caller_patient(&self, company_id: Uuid, caller: &User) -> Result<Patient, AppointmentError> {
        self.patients
            .find_by_user(company_id, caller.id)
            .await
            .map_err(|e| match e {
                PatientError::NotFound => {
                    AppointmentError::Forbidden("No patient profile for this account".to_string())
                }
                other => other.into(),
            })
    }

    async fn caller_doctor(&self, company_id: Uuid, caller: &User) -> Result<Doctor, AppointmentError> {
        self.doctors
            .find_by_user(company_id, caller.id)
            .await
            .map_err(|e| match e {
                DoctorError::NotFound => {
                    AppointmentError::Forbidden("No doctor profile for this account".to_string())
                }
                other => other.into(),
            })
    }

    async fn doctor_of(&self, company_id: Uuid, appointment: &Appointment) -> Result<Doctor, AppointmentError> {
        match &appointment.doctor {
            Some(doctor) => Ok(doctor.clone()),
            None => self
                .doctors
                .find_in_company(company_id, appointment.doctor_id)
                .await?
                .ok_or(AppointmentError::DoctorNotFound),
        }
    }

    async fn patient_of(&self, company_id: Uuid, appointment: &Appointment) -> Result<Patient, AppointmentError> {
        match &appointment.patient {
            Some(patient) => Ok(patient.clone()),
            None => self
                .patients
                .find_in_company(company_id, appointment.patient_id)
                .await?
                .ok_or(AppointmentError::PatientNotFound),
        }
    }
}

/// Inline patient as sent to `book_appointment`, birth date normalized to ISO.
fn inline_payload(inline: &InlinePatient) -> Result<Value, AppointmentError> {
    let birth_date = match inline.birth_date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            parse_birth_date(raw, Local::now().date_naive())
                .map_err(|e| match e {
                    AppError::ValidationError(msg) => AppointmentError::ValidationError(msg),
                    other => AppointmentError::ValidationError(other.to_string()),
                })?
                .to_string(),
        ),
        _ => None,
    };

    Ok(json!({
        "name": inline.name.trim(),
        "last_name": inline.last_name.trim(),
        "cpf": inline.cpf,
        "phone": inline.phone,
        "birth_date": birth_date,
    }))
}
