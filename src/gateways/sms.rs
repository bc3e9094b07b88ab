use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;
use crate::error::{AppError, AppResult};

use super::SmsApi;

/// SMS fallback channel. Used for emergency contacts who have no
/// registered device.
pub struct SmsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SmsClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.sms_base_url.clone(),
            api_key: config.sms_api_key.clone(),
        }
    }
}

#[async_trait]
impl SmsApi for SmsClient {
    async fn send(&self, phone: &str, text: &str) -> AppResult<()> {
        let url = format!("{}/send", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&json!({
                "api_key": self.api_key,
                "to": phone,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("sms request: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "sms returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
