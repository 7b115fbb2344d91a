use chrono::{Local, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};
use shared_models::profile::PROFILE_WITH_USER;
use shared_models::ActiveFilter;
use shared_utils::validation::parse_birth_date;

use crate::models::{Patient, PatientError, UpdatePatientRequest};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_in_company(
        &self,
        company_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Option<Patient>, PatientError> {
        debug!("Fetching patient {} in company {}", patient_id, company_id);

        let path = format!(
            "/rest/v1/patients?id=eq.{}&company_id=eq.{}&{}",
            patient_id, company_id, PROFILE_WITH_USER
        );
        Ok(self.supabase.select_one(&path).await?)
    }

    pub async fn get_patient(&self, company_id: Uuid, patient_id: Uuid) -> Result<Patient, PatientError> {
        self.find_in_company(company_id, patient_id)
            .await?
            .ok_or(PatientError::NotFound)
    }

    /// Patient profile owned by an identity, used for `/me` and patient initiated bookings.
    pub async fn find_by_user(&self, company_id: Uuid, user_id: Uuid) -> Result<Patient, PatientError> {
        let path = format!(
            "/rest/v1/patients?user_id=eq.{}&company_id=eq.{}&{}",
            user_id, company_id, PROFILE_WITH_USER
        );
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn find_by_cpf(&self, company_id: Uuid, cpf: &str) -> Result<Option<Patient>, PatientError> {
        let path = format!(
            "/rest/v1/patients?cpf=eq.{}&company_id=eq.{}&{}",
            urlencoding::encode(cpf),
            company_id,
            PROFILE_WITH_USER
        );
        Ok(self.supabase.select_one(&path).await?)
    }

    pub async fn list_patients(
        &self,
        company_id: Uuid,
        filter: ActiveFilter,
    ) -> Result<Vec<Patient>, PatientError> {
        let path = format!(
            "/rest/v1/patients?company_id=eq.{}&{}&order=name.asc",
            company_id, PROFILE_WITH_USER
        );
        let patients: Vec<Patient> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(patients
            .into_iter()
            .filter(|p| filter.matches(p.active, p.user.as_ref().map(|u| u.active)))
            .collect())
    }

    pub async fn search_by_name(&self, company_id: Uuid, name: &str) -> Result<Vec<Patient>, PatientError> {
        let term = name.trim();
        if term.is_empty() {
            return Err(PatientError::ValidationError("Search term is required".to_string()));
        }

        let path = format!(
            "/rest/v1/patients?company_id=eq.{}&name=ilike.{}&{}&order=name.asc&limit=20",
            company_id,
            urlencoding::encode(&format!("*{}*", term)),
            PROFILE_WITH_USER
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn update_patient(
        &self,
        company_id: Uuid,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient {}", patient_id);

        self.get_patient(company_id, patient_id).await?;

        let mut changes = Map::new();
        if let Some(name) = request.name {
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(last_name) = request.last_name {
            changes.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(cpf) = request.cpf {
            changes.insert("cpf".to_string(), json!(cpf));
        }
        if let Some(phone) = request.phone {
            changes.insert("phone".to_string(), json!(phone));
        }
        if let Some(raw) = request.birth_date {
            let date = parse_birth_date(&raw, Local::now().date_naive())
                .map_err(|e| PatientError::ValidationError(e.to_string()))?;
            changes.insert("birth_date".to_string(), json!(date));
        }

        if changes.is_empty() {
            return Err(PatientError::ValidationError("No fields to update".to_string()));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}&company_id=eq.{}", patient_id, company_id);
        let updated: Result<Vec<Value>, SupabaseError> = self.supabase.update(&path, changes.into()).await;

        match updated {
            Err(e) if e.is_conflict() => return Err(PatientError::CpfTaken),
            Err(e) => return Err(e.into()),
            Ok(rows) if rows.is_empty() => return Err(PatientError::NotFound),
            Ok(_) => {}
        }

        self.get_patient(company_id, patient_id).await
    }

    /// Patients with an identity flip together with it; inline patients only have the profile flag.
    pub async fn set_active(
        &self,
        company_id: Uuid,
        patient_id: Uuid,
        active: bool,
    ) -> Result<Patient, PatientError> {
        let patient = self.get_patient(company_id, patient_id).await?;

        match patient.user_id {
            Some(user_id) => {
                let _: Value = self
                    .supabase
                    .rpc("set_user_active", json!({ "user_uuid": user_id, "is_active": active }))
                    .await?;
            }
            None => {
                let path = format!("/rest/v1/patients?id=eq.{}&company_id=eq.{}", patient_id, company_id);
                let _: Vec<Value> = self
                    .supabase
                    .update(&path, json!({ "active": active, "updated_at": Utc::now().to_rfc3339() }))
                    .await?;
            }
        }

        info!("Patient {} active set to {}", patient_id, active);
        self.get_patient(company_id, patient_id).await
    }
}
