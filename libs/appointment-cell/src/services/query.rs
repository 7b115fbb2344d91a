use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use doctor_cell::services::DoctorService;
use patient_cell::models::PatientError;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentError, AppointmentStats, AppointmentStatus, StatusCounts,
    APPOINTMENT_WITH_PARTIES,
};
use crate::services::time::{day_bounds, parse_day};

#[derive(Debug, Deserialize)]
struct StatusRow {
    date_time: NaiveDateTime,
    status: AppointmentStatus,
}

/// Read side of the appointment book. Every query is pinned to one company.
pub struct AppointmentQueryService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    patients: PatientService,
}

impl AppointmentQueryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            patients: PatientService::new(config),
        }
    }

    async fn fetch(&self, company_id: Uuid, filters: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?company_id=eq.{}{}&{}&order=date_time.asc",
            company_id, filters, APPOINTMENT_WITH_PARTIES
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn list_all(&self, company_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.fetch(company_id, "").await
    }

    pub async fn list_for_patient_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let patient = self
            .patients
            .find_by_user(company_id, user_id)
            .await
            .map_err(|e| match e {
                PatientError::NotFound => AppointmentError::PatientNotFound,
                other => other.into(),
            })?;
        self.fetch(company_id, &format!("&patient_id=eq.{}", patient.id)).await
    }

    pub async fn list_for_doctor_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor_id = self.doctor_id_for_user(company_id, user_id).await?;
        self.list_by_doctor(company_id, doctor_id).await
    }

    /// Doctors only ever see their own book; admins see the whole company.
    pub async fn doctor_scope(&self, company_id: Uuid, caller: &User) -> Result<Option<Uuid>, AppointmentError> {
        match caller.role {
            Role::Doctor => Ok(Some(self.doctor_id_for_user(company_id, caller.id).await?)),
            _ => Ok(None),
        }
    }

    async fn doctor_id_for_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Uuid, AppointmentError> {
        self.doctors
            .find_by_user(company_id, user_id)
            .await
            .map(|doctor| doctor.id)
            .map_err(|e| match e {
                DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => other.into(),
            })
    }

    pub async fn list_by_date(
        &self,
        company_id: Uuid,
        raw_date: &str,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let day = parse_day(raw_date)?;
        let (start, end) = day_bounds(day);

        let mut filters = format!("&date_time=gte.{}&date_time=lte.{}", start, end);
        if let Some(doctor_id) = doctor_id {
            filters.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        self.fetch(company_id, &filters).await
    }

    pub async fn list_by_doctor(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.fetch(company_id, &format!("&doctor_id=eq.{}", doctor_id)).await
    }

    /// Unknown cpf gives an empty list rather than an error.
    pub async fn list_by_cpf(
        &self,
        company_id: Uuid,
        cpf: &str,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let Some(patient) = self.patients.find_by_cpf(company_id, cpf).await? else {
            debug!("No patient with cpf in company {}", company_id);
            return Ok(Vec::new());
        };

        let mut filters = format!("&patient_id=eq.{}", patient.id);
        if let Some(doctor_id) = doctor_id {
            filters.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        self.fetch(company_id, &filters).await
    }

    pub async fn stats(&self, company_id: Uuid, today: NaiveDate) -> Result<AppointmentStats, AppointmentError> {
        let (week_start, week_end) = week_bounds(today);
        let (month_start, month_end) = month_bounds(today);
        let from = week_start.min(month_start);
        let to = week_end.max(month_end);

        let path = format!(
            "/rest/v1/appointments?select=date_time,status&company_id=eq.{}&date_time=gte.{}&date_time=lte.{}",
            company_id,
            day_bounds(from).0,
            day_bounds(to).1
        );
        let rows: Vec<StatusRow> = self.supabase.request(Method::GET, &path, None).await?;
        let rows: Vec<(NaiveDateTime, AppointmentStatus)> =
            rows.into_iter().map(|r| (r.date_time, r.status)).collect();

        Ok(AppointmentStats {
            day: count_by_status(&rows, today, today),
            week: count_by_status(&rows, week_start, week_end),
            month: count_by_status(&rows, month_start, month_end),
        })
    }
}

/// Sunday to Saturday around `day`.
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day - Duration::days(day.weekday().num_days_from_sunday() as i64);
    (start, start + Duration::days(6))
}

pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let next_month = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(day);
    (start, end)
}

/// Count per status for rows whose date falls in `[from, to]`. Absent statuses count zero.
pub fn count_by_status(
    rows: &[(NaiveDateTime, AppointmentStatus)],
    from: NaiveDate,
    to: NaiveDate,
) -> StatusCounts {
    let mut counts: StatusCounts = AppointmentStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();

    for (at, status) in rows {
        let day = at.date();
        if day >= from && day <= to {
            *counts.entry(status.as_str().to_string()).or_insert(0) += 1;
        }
    }
    counts
}
