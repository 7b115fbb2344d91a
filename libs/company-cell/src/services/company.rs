use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};
use shared_models::profile::PROFILE_WITH_USER;

use crate::models::{Admin, Company, CompanyError, CreateCompanyRequest, UpdateCompanyRequest};
use crate::services::invite::build_invite_link;

pub struct CompanyService {
    supabase: SupabaseClient,
    front_url: String,
}

impl CompanyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            front_url: config.front_url.clone(),
        }
    }

    pub async fn create_company(&self, request: CreateCompanyRequest) -> Result<Company, CompanyError> {
        debug!("Creating company {}", request.name);

        let row = json!({
            "name": request.name.trim(),
            "cnpj": request.cnpj,
            "active": true,
        });

        match self.supabase.insert::<Company>("companies", row).await {
            Ok(company) => {
                info!("Company {} created", company.id);
                Ok(company)
            }
            Err(e) if e.is_conflict() => Err(CompanyError::CnpjTaken),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_company(&self, company_id: Uuid) -> Result<Company, CompanyError> {
        let path = format!("/rest/v1/companies?id=eq.{}", company_id);
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(CompanyError::NotFound)
    }

    /// Company that must exist and be active, for registrations and invites.
    pub async fn get_active_company(&self, company_id: Uuid) -> Result<Company, CompanyError> {
        let company = self.get_company(company_id).await?;
        if !company.active {
            return Err(CompanyError::Inactive);
        }
        Ok(company)
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>, CompanyError> {
        Ok(self
            .supabase
            .request(Method::GET, "/rest/v1/companies?order=name.asc", None)
            .await?)
    }

    /// Active companies whose name contains `query`, at most ten.
    pub async fn search_companies(&self, query: &str) -> Result<Vec<Company>, CompanyError> {
        let path = format!(
            "/rest/v1/companies?name=ilike.{}&active=eq.true&order=name.asc&limit=10",
            urlencoding::encode(&format!("*{}*", query.trim()))
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn update_company(
        &self,
        company_id: Uuid,
        request: UpdateCompanyRequest,
    ) -> Result<Company, CompanyError> {
        let mut changes = Map::new();
        if let Some(name) = request.name {
            changes.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(cnpj) = request.cnpj {
            changes.insert("cnpj".to_string(), json!(cnpj));
        }
        if changes.is_empty() {
            return Err(CompanyError::Validation("No fields to update".to_string()));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/companies?id=eq.{}", company_id);
        let updated: Result<Vec<Company>, SupabaseError> = self.supabase.update(&path, changes.into()).await;

        match updated {
            Ok(rows) => rows.into_iter().next().ok_or(CompanyError::NotFound),
            Err(e) if e.is_conflict() => Err(CompanyError::CnpjTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Flip the company, every identity it owns and every profile in one transaction.
    /// Running it twice with the same flag leaves the same state.
    pub async fn set_active(&self, company_id: Uuid, active: bool) -> Result<Company, CompanyError> {
        let result: Result<Company, SupabaseError> = self
            .supabase
            .rpc(
                "set_company_active",
                json!({ "company_uuid": company_id, "is_active": active }),
            )
            .await;

        match result {
            Ok(company) => {
                info!("Company {} active set to {}", company_id, active);
                Ok(company)
            }
            Err(SupabaseError::NotFound(_)) => Err(CompanyError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn deactivate_company(&self, company_id: Uuid) -> Result<Company, CompanyError> {
        self.set_active(company_id, false).await
    }

    pub async fn activate_company(&self, company_id: Uuid) -> Result<Company, CompanyError> {
        self.set_active(company_id, true).await
    }

    pub async fn invite_link(&self, company_id: Uuid) -> Result<String, CompanyError> {
        let company = self.get_company(company_id).await?;
        match company.invite_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(build_invite_link(&self.front_url, company_id, token)),
            _ => {
                warn!("Company {} has no invite token", company_id);
                Err(CompanyError::InviteNotFound)
            }
        }
    }

    /// Invite token check for patient self registration.
    pub async fn verify_invite(&self, company_id: Uuid, token: &str) -> Result<Company, CompanyError> {
        let company = self.get_active_company(company_id).await?;
        match company.invite_token.as_deref() {
            Some(expected) if !expected.is_empty() && expected == token => Ok(company),
            _ => Err(CompanyError::Validation("Invalid invite token".to_string())),
        }
    }

    pub async fn list_admins(&self, company_id: Uuid) -> Result<Vec<Admin>, CompanyError> {
        self.get_company(company_id).await?;

        let path = format!(
            "/rest/v1/admins?company_id=eq.{}&{}&order=name.asc",
            company_id, PROFILE_WITH_USER
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    /// Deactivate an admin's identity and profile.
    pub async fn deactivate_admin(&self, user_id: Uuid) -> Result<Admin, CompanyError> {
        let path = format!("/rest/v1/admins?user_id=eq.{}&{}", user_id, PROFILE_WITH_USER);
        let admin: Admin = self
            .supabase
            .select_one(&path)
            .await?
            .ok_or(CompanyError::AdminNotFound)?;

        let _: Value = self
            .supabase
            .rpc("set_user_active", json!({ "user_uuid": user_id, "is_active": false }))
            .await?;

        info!("Admin {} deactivated", admin.id);
        Ok(Admin { active: false, ..admin })
    }
}
