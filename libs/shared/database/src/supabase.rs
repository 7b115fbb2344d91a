use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

/// Postgres unique_violation.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SupabaseError {
    /// True when the failure came from a unique constraint or a function raising PT409.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SupabaseError::Conflict { .. })
    }

    /// Message (or constraint name) reported by Postgres for a conflict.
    pub fn conflict_message(&self) -> Option<&str> {
        match self {
            SupabaseError::Conflict { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<SupabaseError> for AppError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::NotFound(msg) => AppError::NotFound(msg),
            SupabaseError::Conflict { message, .. } => AppError::Conflict(message),
            other => AppError::Database(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_key.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Ok(key) = HeaderValue::from_str(&self.service_key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.service_key)) {
            headers.insert(AUTHORIZATION, bearer);
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers();
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::map_error(status, &text));
        }

        // PostgREST answers 204 with an empty body for void functions and minimal writes.
        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(payload)?)
    }

    fn map_error(status: StatusCode, text: &str) -> SupabaseError {
        let parsed: Option<PostgrestErrorBody> = serde_json::from_str(text).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone().or_else(|| b.details.clone()))
            .unwrap_or_else(|| text.to_string());

        if status == StatusCode::CONFLICT || code.as_deref() == Some(UNIQUE_VIOLATION) {
            warn!("Storage conflict ({}): {}", status, message);
            return SupabaseError::Conflict {
                code: code.unwrap_or_else(|| status.as_u16().to_string()),
                message,
            };
        }

        error!("API error ({}): {}", status, text);

        match status.as_u16() {
            401 | 403 => SupabaseError::Auth(message),
            404 => SupabaseError::NotFound(message),
            other => SupabaseError::Api { status: other, code, message },
        }
    }

    /// Fetch rows and return the first one, if any.
    pub async fn select_one<T>(&self, path: &str) -> Result<Option<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self.request(Method::GET, path, None).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a row into `table` and return the stored representation.
    pub async fn insert<T>(&self, table: &str, row: Value) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let rows: Vec<T> = self
            .request_with_headers(
                Method::POST,
                &format!("/rest/v1/{}", table),
                Some(row),
                Some(Self::representation_headers()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| SupabaseError::NotFound(format!("Insert into {} returned no rows", table)))
    }

    /// PATCH every row matched by `path` and return the updated rows.
    pub async fn update<T>(&self, path: &str, changes: Value) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(
            Method::PATCH,
            path,
            Some(changes),
            Some(Self::representation_headers()),
        )
        .await
    }

    /// Call a Postgres function through `/rest/v1/rpc`. Each call runs in its own transaction.
    pub async fn rpc<T>(&self, function: &str, args: Value) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        debug!("Calling rpc {}", function);
        self.request(Method::POST, &format!("/rest/v1/rpc/{}", function), Some(args))
            .await
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}
