use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_mailer::{mailer_from_config, Mailer};

use crate::models::{AuthError, UserRecord};
use crate::services::password::hash_password;

pub const RESET_CODE_TTL: Duration = Duration::minutes(2);
pub const RESET_COOLDOWN: Duration = Duration::minutes(2);

pub struct PasswordResetService {
    supabase: SupabaseClient,
    mailer: Arc<dyn Mailer>,
}

impl PasswordResetService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_mailer(config, mailer_from_config(config))
    }

    pub fn with_mailer(config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            mailer,
        }
    }

    async fn find_user(&self, email: &str) -> Result<UserRecord, AuthError> {
        let path = format!(
            "/rest/v1/users?email=eq.{}",
            urlencoding::encode(&email.trim().to_lowercase())
        );
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Issue a fresh 4 digit code and email it. Refused while the previous request is inside the cooldown.
    pub async fn send_password_reset_code(&self, email: &str) -> Result<(), AuthError> {
        let user = self.find_user(email).await?;
        let now = Utc::now();

        if let Some(remaining_seconds) = cooldown_remaining(user.last_reset_request_at, now) {
            return Err(AuthError::ResetCooldown { remaining_seconds });
        }

        let code = generate_reset_code();
        let cutoff = timestamp(now - RESET_COOLDOWN);
        let path = format!(
            "/rest/v1/users?id=eq.{}&or=(last_reset_request_at.is.null,last_reset_request_at.lte.{})",
            user.id, cutoff
        );
        let changes = json!({
            "reset_code": code,
            "reset_code_expires_at": timestamp(now + RESET_CODE_TTL),
            "reset_code_used": false,
            "last_reset_request_at": timestamp(now),
        });

        let updated: Vec<UserRecord> = self.supabase.update(&path, changes).await?;
        if updated.is_empty() {
            // A concurrent request won the conditional update.
            debug!("Reset code for user {} already issued", user.id);
            let remaining_seconds = RESET_COOLDOWN.num_seconds();
            return Err(AuthError::ResetCooldown { remaining_seconds });
        }

        let text = format!(
            "Your password reset code is {}. It expires in {} minutes.",
            code,
            RESET_CODE_TTL.num_minutes()
        );
        self.mailer
            .send_mail(&user.email, "Password reset code", &text, None)
            .await
            .inspect_err(|e| warn!("Reset code email to user {} failed: {}", user.id, e))?;

        info!("Reset code issued for user {}", user.id);
        Ok(())
    }

    pub async fn validate_reset_code(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let user = self.find_user(email).await?;
        if code_is_valid(&user, code, Utc::now()) {
            Ok(())
        } else {
            Err(AuthError::InvalidResetCode)
        }
    }

    /// Set a new password and burn the code in the same conditional update.
    pub async fn reset_password_with_code(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.find_user(email).await?;
        let now = Utc::now();
        if !code_is_valid(&user, code, now) {
            return Err(AuthError::InvalidResetCode);
        }

        let password_hash =
            hash_password(new_password).map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let path = format!(
            "/rest/v1/users?id=eq.{}&reset_code=eq.{}&reset_code_used=is.false&reset_code_expires_at=gt.{}",
            user.id,
            urlencoding::encode(code.trim()),
            timestamp(now)
        );
        let changes = json!({
            "password_hash": password_hash,
            "reset_code_used": true,
            "updated_at": timestamp(now),
        });

        let updated: Vec<UserRecord> = self.supabase.update(&path, changes).await?;
        if updated.is_empty() {
            return Err(AuthError::InvalidResetCode);
        }

        info!("Password reset for user {}", user.id);
        Ok(())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn generate_reset_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Seconds left before another code may be requested, if any.
fn cooldown_remaining(last_request: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    let elapsed = now - last_request?;
    if elapsed < RESET_COOLDOWN {
        Some((RESET_COOLDOWN - elapsed).num_seconds().max(1))
    } else {
        None
    }
}

fn code_is_valid(user: &UserRecord, code: &str, now: DateTime<Utc>) -> bool {
    match (&user.reset_code, user.reset_code_expires_at) {
        (Some(stored), Some(expires_at)) => {
            !user.reset_code_used && expires_at > now && stored == code.trim()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::Role;
    use uuid::Uuid;

    fn user_with_code(code: &str, expires_in: Duration, used: bool) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            email: "ana@clinic.test".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::Patient,
            company_id: Some(Uuid::new_v4()),
            active: true,
            reset_code: Some(code.to_string()),
            reset_code_expires_at: Some(now + expires_in),
            reset_code_used: used,
            last_reset_request_at: Some(now),
        }
    }

    #[test]
    fn codes_have_four_digits() {
        for _ in 0..50 {
            let code = generate_reset_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn cooldown_counts_down_from_last_request() {
        let now = Utc::now();
        assert_eq!(cooldown_remaining(None, now), None);
        assert_eq!(cooldown_remaining(Some(now - Duration::seconds(30)), now), Some(90));
        assert_eq!(cooldown_remaining(Some(now - Duration::minutes(3)), now), None);
    }

    #[test]
    fn code_must_match_be_unused_and_unexpired() {
        let now = Utc::now();
        assert!(code_is_valid(&user_with_code("4821", Duration::minutes(1), false), " 4821 ", now));
        assert!(!code_is_valid(&user_with_code("4821", Duration::minutes(1), false), "4822", now));
        assert!(!code_is_valid(&user_with_code("4821", Duration::minutes(1), true), "4821", now));
        assert!(!code_is_valid(&user_with_code("4821", Duration::seconds(-1), false), "4821", now));
    }
}
