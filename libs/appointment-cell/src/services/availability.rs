use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AppointmentError, AppointmentStatus, AvailabilityResponse};
use crate::services::time::{clinic_now, day_bounds, parse_day, parse_stored, SLOT_FORMAT};

/// Slots a doctor offers every day.
pub const DAILY_TEMPLATE: [&str; 7] = ["08:00", "09:00", "10:00", "11:00", "14:00", "15:00", "16:00"];

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Free slots are the template minus what is taken. On `now`'s day slots that already started are dropped too.
pub fn compute_availability<I>(
    template: &[&str],
    taken: I,
    date: NaiveDate,
    now: NaiveDateTime,
) -> AvailabilityResponse
where
    I: IntoIterator<Item = String>,
{
    let mut seen = Vec::new();
    for slot in taken {
        if !seen.contains(&slot) {
            seen.push(slot);
        }
    }

    let is_today = date == now.date();
    let now_minute = minute_of_day(now.time());

    let available = template
        .iter()
        .filter(|slot| !seen.iter().any(|t| t.as_str() == **slot))
        .filter(|slot| {
            if !is_today {
                return true;
            }
            NaiveTime::parse_from_str(slot, SLOT_FORMAT)
                .map(|t| minute_of_day(t) > now_minute)
                .unwrap_or(false)
        })
        .map(|slot| slot.to_string())
        .collect();

    AvailabilityResponse {
        available,
        taken: seen,
    }
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    doctors: DoctorService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            doctors: DoctorService::new(config),
        }
    }

    /// Slots taken on `date` by appointments that still occupy them, as `HH:MM`.
    async fn taken_slots(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<String>, AppointmentError> {
        let (start, end) = day_bounds(date);
        let path = format!(
            "/rest/v1/appointments?select=date_time&company_id=eq.{}&doctor_id=eq.{}&date_time=gte.{}&date_time=lte.{}&status=not.in.{}&order=date_time.asc",
            company_id,
            doctor_id,
            start,
            end,
            AppointmentStatus::filter_list(&AppointmentStatus::RELEASING)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let raw = row.get("date_time").and_then(Value::as_str);
                match raw.and_then(parse_stored) {
                    Some(at) => Some(at.format(SLOT_FORMAT).to_string()),
                    None => {
                        warn!("Skipping malformed appointment timestamp {:?}", row.get("date_time"));
                        None
                    }
                }
            })
            .collect())
    }

    pub async fn find_available_by_doctor(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
        raw_date: &str,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        let date = parse_day(raw_date)?;
        debug!("Computing availability for doctor {} on {}", doctor_id, date);

        self.doctors
            .find_in_company(company_id, doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        let taken = self.taken_slots(company_id, doctor_id, date).await?;
        Ok(compute_availability(&DAILY_TEMPLATE, taken, date, clinic_now()))
    }
}
