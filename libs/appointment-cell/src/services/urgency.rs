use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::UrgencyLevel;

const TRIAGE_PROMPT: &str = "You triage notes written by patients booking a medical appointment.
Classify how urgent the described problem is:
HIGH: needs care within hours. Examples: chest pain, shortness of breath, heavy bleeding, fainting.
MEDIUM: should be seen within days. Examples: fever for several days, persistent cough, an infected wound.
LOW: routine or follow-up care. Examples: check-up, prescription renewal, exam results, mild allergy.
Answer with exactly one word: LOW, MEDIUM or HIGH.
";

/// Tags the notes of an appointment. Never fails: anything unexpected is `LOW`.
#[async_trait]
pub trait UrgencyClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> UrgencyLevel;
}

pub struct GeminiUrgencyClassifier {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiUrgencyClassifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }

    async fn request_classification(&self, text: &str) -> Result<String> {
        let prompt = format!("{}\nNotes: \"{}\"", TRIAGE_PROMPT, text);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let payload: Value = response.json().await?;
        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Gemini response format"))
    }
}

#[async_trait]
impl UrgencyClassifier for GeminiUrgencyClassifier {
    async fn classify(&self, text: &str) -> UrgencyLevel {
        if self.api_key.is_empty() {
            warn!("GEMINI_API_KEY not set, urgency defaults to LOW");
            return UrgencyLevel::Low;
        }

        match self.request_classification(text).await {
            Ok(answer) => {
                let level = parse_urgency(&answer);
                debug!("Urgency classified as {}", level.as_str());
                level
            }
            Err(e) => {
                warn!("Urgency classification failed, using LOW: {}", e);
                UrgencyLevel::Low
            }
        }
    }
}

pub fn parse_urgency(answer: &str) -> UrgencyLevel {
    let answer = answer.to_uppercase();
    if answer.contains("HIGH") {
        UrgencyLevel::High
    } else if answer.contains("MEDIUM") {
        UrgencyLevel::Medium
    } else {
        UrgencyLevel::Low
    }
}
