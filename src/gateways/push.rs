use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;
use crate::error::{AppError, AppResult};

use super::{PushApi, PushApp};

/// Push delivery client. Parents and drivers use separate mobile apps,
/// each with its own project key.
pub struct PushClient {
    http: reqwest::Client,
    base_url: String,
    client_app_key: String,
    driver_app_key: String,
}

impl PushClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.push_base_url.clone(),
            client_app_key: config.push_client_app_key.clone(),
            driver_app_key: config.push_driver_app_key.clone(),
        }
    }

    fn app_key(&self, app: PushApp) -> &str {
        match app {
            PushApp::Client => &self.client_app_key,
            PushApp::Driver => &self.driver_app_key,
        }
    }
}

#[async_trait]
impl PushApi for PushClient {
    async fn send(
        &self,
        app: PushApp,
        device_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> AppResult<()> {
        let url = format!("{}/fcm/send", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("key={}", self.app_key(app)))
            .json(&json!({
                "to": device_token,
                "notification": { "title": title, "body": body },
                "data": data,
            }))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("push request: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "push returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
