use chrono::{Local, Utc};
use reqwest::Method;
use serde_json::{json, Map};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};
use shared_models::profile::PROFILE_WITH_USER;
use shared_models::ActiveFilter;
use shared_utils::validation::parse_birth_date;

use crate::models::{Doctor, DoctorError, UpdateDoctorRequest};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Tenant scoped lookup. `None` when the doctor does not exist in this company.
    pub async fn find_in_company(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<Option<Doctor>, DoctorError> {
        debug!("Fetching doctor {} in company {}", doctor_id, company_id);

        let path = format!(
            "/rest/v1/doctors?id=eq.{}&company_id=eq.{}&{}",
            doctor_id, company_id, PROFILE_WITH_USER
        );
        Ok(self.supabase.select_one(&path).await?)
    }

    pub async fn get_doctor(&self, company_id: Uuid, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.find_in_company(company_id, doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// Doctor profile owned by an identity.
    pub async fn find_by_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Doctor, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?user_id=eq.{}&company_id=eq.{}&{}",
            user_id, company_id, PROFILE_WITH_USER
        );
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn list_doctors(
        &self,
        company_id: Uuid,
        filter: ActiveFilter,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?company_id=eq.{}&{}&order=name.asc",
            company_id, PROFILE_WITH_USER
        );
        let doctors: Vec<Doctor> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(doctors
            .into_iter()
            .filter(|d| filter.matches(d.active, d.user.as_ref().map(|u| u.active)))
            .collect())
    }

    pub async fn find_by_crm(&self, company_id: Uuid, crm: &str) -> Result<Doctor, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?crm=eq.{}&company_id=eq.{}&{}",
            urlencoding::encode(crm),
            company_id,
            PROFILE_WITH_USER
        );
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn find_by_specialty(
        &self,
        company_id: Uuid,
        specialty: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!(
            "/rest/v1/doctors?specialty=ilike.{}&company_id=eq.{}&{}&order=name.asc",
            urlencoding::encode(specialty),
            company_id,
            PROFILE_WITH_USER
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn update_doctor(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor {}", doctor_id);

        self.get_doctor(company_id, doctor_id).await?;

        let mut changes = Map::new();
        if let Some(name) = request.name {
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(last_name) = request.last_name {
            changes.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(crm) = request.crm {
            changes.insert("crm".to_string(), json!(crm));
        }
        if let Some(phone) = request.phone {
            changes.insert("phone".to_string(), json!(phone));
        }
        if let Some(specialty) = request.specialty {
            changes.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(raw) = request.birth_date {
            let date = parse_birth_date(&raw, Local::now().date_naive())
                .map_err(|e| DoctorError::Validation(e.to_string()))?;
            changes.insert("birth_date".to_string(), json!(date));
        }

        if changes.is_empty() {
            return Err(DoctorError::Validation("No fields to update".to_string()));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}&company_id=eq.{}", doctor_id, company_id);
        let updated: Result<Vec<serde_json::Value>, SupabaseError> =
            self.supabase.update(&path, changes.into()).await;

        match updated {
            Err(e) if e.is_conflict() => return Err(DoctorError::CrmTaken),
            Err(e) => return Err(e.into()),
            Ok(rows) if rows.is_empty() => return Err(DoctorError::NotFound),
            Ok(_) => {}
        }

        self.get_doctor(company_id, doctor_id).await
    }

    /// Flip the doctor's profile and identity together.
    pub async fn set_active(
        &self,
        company_id: Uuid,
        doctor_id: Uuid,
        active: bool,
    ) -> Result<Doctor, DoctorError> {
        let doctor = self.get_doctor(company_id, doctor_id).await?;

        let _: serde_json::Value = self
            .supabase
            .rpc(
                "set_user_active",
                json!({ "user_uuid": doctor.user_id, "is_active": active }),
            )
            .await?;

        info!("Doctor {} active set to {}", doctor_id, active);
        self.get_doctor(company_id, doctor_id).await
    }
}
