use std::sync::Arc;

use chrono::Local;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use company_cell::services::{build_invite_link, generate_invite_token, CompanyService};
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseError};
use shared_mailer::{mailer_from_config, Mailer};
use shared_models::auth::{Role, TokenResponse, User};
use shared_utils::jwt::sign_token;
use shared_utils::validation::parse_birth_date;

use crate::models::{
    AuthError, LoginRequest, RegisterAdminRequest, RegisterDoctorRequest, RegisterPatientRequest,
    UserRecord, UserSummary,
};
use crate::services::password::{hash_password, verify_password};

pub struct AuthService {
    supabase: SupabaseClient,
    companies: CompanyService,
    mailer: Arc<dyn Mailer>,
    jwt_secret: String,
    jwt_expiry_hours: i64,
    front_url: String,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_mailer(config, mailer_from_config(config))
    }

    pub fn with_mailer(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            companies: CompanyService::new(config),
            mailer,
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry_hours: config.jwt_expiry_hours,
            front_url: config.front_url.clone(),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let path = format!(
            "/rest/v1/users?email=eq.{}",
            urlencoding::encode(&email.trim().to_lowercase())
        );
        Ok(self.supabase.select_one(&path).await?)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        let email = request.email.trim().to_lowercase();
        debug!("Login attempt for {}", email);

        let user = self
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.active {
            warn!("Login rejected for deactivated user {}", user.id);
            return Err(AuthError::UserDeactivated);
        }

        let matches = verify_password(&request.password, &user.password_hash)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = sign_token(
            user.id,
            &user.email,
            user.role,
            user.company_id,
            &self.jwt_secret,
            self.jwt_expiry_hours,
        )
        .map_err(AuthError::Token)?;

        info!("User {} logged in", user.id);

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_expiry_hours * 3600,
        })
    }

    /// Self registration of a patient through a company's invite link.
    pub async fn register_patient_with_invite(
        &self,
        company_id: Uuid,
        token: &str,
        request: RegisterPatientRequest,
    ) -> Result<UserSummary, AuthError> {
        self.companies.verify_invite(company_id, token).await?;
        self.ensure_email_free(&request.email).await?;

        let cpf_path = format!(
            "/rest/v1/patients?cpf=eq.{}&company_id=eq.{}&select=id",
            urlencoding::encode(&request.profile.cpf),
            company_id
        );
        if self.supabase.select_one::<Value>(&cpf_path).await?.is_some() {
            return Err(AuthError::CpfTaken);
        }

        let mut profile = serde_json::to_value(&request.profile)
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        normalize_birth_date(&mut profile)?;

        let user = self
            .create_user(&request.email, &request.password, Role::Patient, company_id, profile, None)
            .await?;

        info!("Patient {} registered in company {}", user.id, company_id);
        Ok(user.into())
    }

    /// Admin creates a doctor account in their own company and the doctor is emailed a welcome note.
    pub async fn register_doctor(
        &self,
        admin: &User,
        request: RegisterDoctorRequest,
    ) -> Result<UserSummary, AuthError> {
        if !admin.has_role(Role::Admin) {
            return Err(AuthError::Forbidden("Only admins can register doctors".to_string()));
        }
        let company_id = admin
            .company_id
            .ok_or_else(|| AuthError::Forbidden("Admin is not attached to a company".to_string()))?;

        self.companies.get_active_company(company_id).await?;
        self.ensure_email_free(&request.email).await?;

        let crm_path = format!(
            "/rest/v1/doctors?crm=eq.{}&select=id",
            urlencoding::encode(&request.profile.crm)
        );
        if self.supabase.select_one::<Value>(&crm_path).await?.is_some() {
            return Err(AuthError::CrmTaken);
        }

        let mut profile = serde_json::to_value(&request.profile)
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        normalize_birth_date(&mut profile)?;

        let user = self
            .create_user(&request.email, &request.password, Role::Doctor, company_id, profile, None)
            .await?;

        let text = format!(
            "Hello Dr. {} {},\n\nAn account was created for you. Sign in at {} with {}.",
            request.profile.name, request.profile.last_name, self.front_url, user.email
        );
        if let Err(e) = self
            .mailer
            .send_mail(&user.email, "Welcome to the clinic", &text, None)
            .await
        {
            warn!("Welcome email to doctor {} failed: {}", user.id, e);
        }

        info!("Doctor {} registered in company {}", user.id, company_id);
        Ok(user.into())
    }

    /// Super admin creates a company admin. A fresh invite token is stored on the company.
    pub async fn register_admin(
        &self,
        caller: &User,
        request: RegisterAdminRequest,
    ) -> Result<(UserSummary, String), AuthError> {
        if !caller.has_role(Role::SuperAdmin) {
            return Err(AuthError::Forbidden("Only super admins can register admins".to_string()));
        }

        self.companies.get_active_company(request.company_id).await?;
        self.ensure_email_free(&request.email).await?;

        let cpf_path = format!(
            "/rest/v1/admins?cpf=eq.{}&company_id=eq.{}&select=id",
            urlencoding::encode(&request.profile.cpf),
            request.company_id
        );
        if self.supabase.select_one::<Value>(&cpf_path).await?.is_some() {
            return Err(AuthError::CpfTaken);
        }

        let profile = serde_json::to_value(&request.profile)
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        let invite_token = generate_invite_token();

        let user = self
            .create_user(
                &request.email,
                &request.password,
                Role::Admin,
                request.company_id,
                profile,
                Some(&invite_token),
            )
            .await?;

        let invite_link = build_invite_link(&self.front_url, request.company_id, &invite_token);
        info!("Admin {} registered for company {}", user.id, request.company_id);
        Ok((user.into(), invite_link))
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), AuthError> {
        match self.find_user_by_email(email).await? {
            Some(_) => Err(AuthError::EmailTaken),
            None => Ok(()),
        }
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
        company_id: Uuid,
        profile: Value,
        invite_token: Option<&str>,
    ) -> Result<UserRecord, AuthError> {
        let password_hash =
            hash_password(password).map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let args = json!({
            "p_email": email.trim().to_lowercase(),
            "p_password_hash": password_hash,
            "p_role": role.as_str(),
            "p_company_id": company_id,
            "p_profile": profile,
            "p_invite_token": invite_token,
        });

        self.supabase
            .rpc("register_user_with_profile", args)
            .await
            .map_err(map_registration_conflict)
    }
}

/// Races past the pre-checks surface as unique violations named after the constraint.
fn map_registration_conflict(err: SupabaseError) -> AuthError {
    match err.conflict_message() {
        Some(msg) if msg.contains("users_email_key") => AuthError::EmailTaken,
        Some(msg) if msg.contains("doctors_crm_key") => AuthError::CrmTaken,
        Some(msg) if msg.contains("cpf_key") => AuthError::CpfTaken,
        _ => AuthError::Database(err),
    }
}

fn normalize_birth_date(profile: &mut Value) -> Result<(), AuthError> {
    let raw = match profile.get("birth_date").and_then(Value::as_str) {
        Some(raw) => raw.to_string(),
        None => return Ok(()),
    };

    let date = parse_birth_date(&raw, Local::now().date_naive())
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    profile["birth_date"] = json!(date);
    Ok(())
}
