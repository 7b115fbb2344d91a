use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub mail_host: String,
    pub mail_port: u16,
    pub mail_user: String,
    pub mail_pass: String,
    pub mail_from: String,
    pub front_url: String,
    pub booking_clock_skew_seconds: i64,
    pub server_port: u16,
}

fn string_var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        if default.is_empty() {
            warn!("{} not set, using empty value", name);
        } else {
            warn!("{} not set, using default", name);
        }
        default.to_string()
    })
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value, using default", name);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_anon_key = string_var("SUPABASE_ANON_PUBLIC_KEY", "");
        let supabase_service_key = env::var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_else(|_| {
            warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to anon key");
            supabase_anon_key.clone()
        });

        let config = Self {
            supabase_url: string_var("SUPABASE_URL", ""),
            supabase_anon_key,
            supabase_service_key,
            jwt_secret: string_var("JWT_SECRET", ""),
            jwt_expiry_hours: parsed_var("JWT_EXPIRY_HOURS", 24),
            gemini_api_key: string_var("GEMINI_API_KEY", ""),
            gemini_base_url: string_var(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_model: string_var("GEMINI_MODEL", "gemini-1.5-flash"),
            mail_host: string_var("MAIL_HOST", ""),
            mail_port: parsed_var("MAIL_PORT", 587),
            mail_user: string_var("MAIL_USER", ""),
            mail_pass: string_var("MAIL_PASS", ""),
            mail_from: string_var("MAIL_FROM", ""),
            front_url: string_var("FRONT_URL", "http://localhost:5173"),
            booking_clock_skew_seconds: parsed_var("BOOKING_CLOCK_SKEW_SECONDS", 120),
            server_port: parsed_var("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.gemini_api_key.is_empty() && !self.gemini_base_url.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        !self.mail_host.is_empty() && !self.mail_from.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_key: String::new(),
            jwt_secret: String::new(),
            jwt_expiry_hours: 24,
            gemini_api_key: String::new(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            mail_host: String::new(),
            mail_port: 587,
            mail_user: String::new(),
            mail_pass: String::new(),
            mail_from: String::new(),
            front_url: "http://localhost:5173".to_string(),
            booking_clock_skew_seconds: 120,
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_not_configured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert!(!config.is_ai_configured());
        assert!(!config.is_mail_configured());
        assert_eq!(config.booking_clock_skew_seconds, 120);
    }

    #[test]
    fn configured_when_storage_and_secret_present() {
        let config = AppConfig {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "service".to_string(),
            jwt_secret: "secret".to_string(),
            ..AppConfig::default()
        };
        assert!(config.is_configured());
    }
}
