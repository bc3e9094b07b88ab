use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{AppError, AppResult};

use super::{ChargeOutcome, PaymentApi, PaymentInit, PaymentStatus, SbpInit, ThreeDsCheck};

/// Card acquiring client. Requests carry a SHA-256 signature over the
/// request parameters concatenated in alphabetical key order with the
/// terminal password mixed in.
pub struct PaymentClient {
    http: reqwest::Client,
    base_url: String,
    terminal_key: String,
    secret_key: String,
}

impl PaymentClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.payment_base_url.clone(),
            terminal_key: config.payment_terminal_key.clone(),
            secret_key: config.payment_secret_key.clone(),
        }
    }

    async fn call(&self, method: &str, body: Value) -> AppResult<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("{} request: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "{} returned {}",
                method,
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("{} body: {}", method, e)))?;

        if payload.get("Success").and_then(Value::as_bool) != Some(true) {
            let message = payload
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or("provider rejected the request");
            return Err(AppError::Gateway(format!("{}: {}", method, message)));
        }

        Ok(payload)
    }

    fn require_str(payload: &Value, field: &str) -> AppResult<String> {
        payload
            .get(field)
            .and_then(payload_str)
            .ok_or_else(|| AppError::Gateway(format!("missing {} in provider response", field)))
    }
}

/// Version 1 cards come back with the version field alone; 2.x adds the
/// issuer transaction id and the data-collection endpoint.
fn three_ds_check_from(payload: &Value) -> AppResult<ThreeDsCheck> {
    Ok(ThreeDsCheck {
        version: PaymentClient::require_str(payload, "Version")?,
        server_transaction_id: payload.get("ServerTransId").and_then(payload_str),
        method_url: payload.get("ThreeDSMethodURL").and_then(payload_str),
    })
}

/// Provider sends numeric ids either as strings or numbers.
fn payload_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Amount on the wire is in kopecks.
pub fn to_kopecks(amount: Decimal) -> i64 {
    (amount * Decimal::from(100)).to_i64().unwrap_or(0)
}

/// Hex SHA-256 over the concatenation of the given values.
pub fn sign(values: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for v in values {
        hasher.update(v.as_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl PaymentApi for PaymentClient {
    async fn init(
        &self,
        order_key: &str,
        amount: Decimal,
        description: &str,
        customer_key: Option<&str>,
    ) -> AppResult<PaymentInit> {
        let kopecks = to_kopecks(amount).to_string();
        // Alphabetical by key: Amount, OrderId, Password, TerminalKey.
        let token = sign(&[&kopecks, order_key, &self.secret_key, &self.terminal_key]);

        let mut body = json!({
            "TerminalKey": self.terminal_key,
            "Amount": to_kopecks(amount),
            "OrderId": order_key,
            "Description": description,
            "Token": token,
        });
        if let Some(key) = customer_key {
            body["CustomerKey"] = json!(key);
        }

        let payload = self.call("Init", body).await?;
        Ok(PaymentInit {
            payment_id: Self::require_str(&payload, "PaymentId")?,
            payment_url: Self::require_str(&payload, "PaymentURL").unwrap_or_default(),
        })
    }

    async fn init_sbp(
        &self,
        order_key: &str,
        amount: Decimal,
        description: &str,
    ) -> AppResult<SbpInit> {
        let init = self.init(order_key, amount, description, None).await?;

        let token = sign(&[&init.payment_id, &self.secret_key, &self.terminal_key]);
        let payload = self
            .call(
                "GetQr",
                json!({
                    "TerminalKey": self.terminal_key,
                    "PaymentId": init.payment_id,
                    "DataType": "PAYLOAD",
                    "Token": token,
                }),
            )
            .await?;

        Ok(SbpInit {
            payment_id: init.payment_id,
            qr_payload: Self::require_str(&payload, "Data")?,
        })
    }

    async fn check_3ds(
        &self,
        payment_id: &str,
        encrypted_card_data: &str,
    ) -> AppResult<ThreeDsCheck> {
        let token = sign(&[&self.secret_key, payment_id, &self.terminal_key]);
        let payload = self
            .call(
                "Check3dsVersion",
                json!({
                    "TerminalKey": self.terminal_key,
                    "PaymentId": payment_id,
                    "CardData": encrypted_card_data,
                    "Token": token,
                }),
            )
            .await?;

        three_ds_check_from(&payload)
    }

    async fn finish_authorize(
        &self,
        payment_id: &str,
        encrypted_card_data: &str,
        client_ip: &str,
    ) -> AppResult<ChargeOutcome> {
        let token = sign(&[&self.secret_key, payment_id, &self.terminal_key]);
        let result = self
            .call(
                "FinishAuthorize",
                json!({
                    "TerminalKey": self.terminal_key,
                    "PaymentId": payment_id,
                    "CardData": encrypted_card_data,
                    "IP": client_ip,
                    "Token": token,
                }),
            )
            .await;

        match result {
            Ok(payload) => {
                let raw = Self::require_str(&payload, "Status")?;
                Ok(ChargeOutcome {
                    payment_id: payment_id.to_string(),
                    status: PaymentStatus::from_provider(&raw),
                    error: None,
                })
            }
            // A declined authorization is an outcome, not a transport
            // failure.
            Err(AppError::Gateway(message)) => Ok(ChargeOutcome {
                payment_id: payment_id.to_string(),
                status: PaymentStatus::Rejected,
                error: Some(message),
            }),
            Err(e) => Err(e),
        }
    }

    async fn get_state(&self, payment_id: &str) -> AppResult<PaymentStatus> {
        let token = sign(&[&self.secret_key, payment_id, &self.terminal_key]);
        let payload = self
            .call(
                "GetState",
                json!({
                    "TerminalKey": self.terminal_key,
                    "PaymentId": payment_id,
                    "Token": token,
                }),
            )
            .await?;

        let raw = Self::require_str(&payload, "Status")?;
        Ok(PaymentStatus::from_provider(&raw))
    }

    async fn charge_card(
        &self,
        order_key: &str,
        amount: Decimal,
        provider_card_id: &str,
        customer_key: &str,
    ) -> AppResult<ChargeOutcome> {
        let init = self
            .init(order_key, amount, "Еженедельный платёж", Some(customer_key))
            .await?;

        let token = sign(&[
            &init.payment_id,
            &self.secret_key,
            provider_card_id,
            &self.terminal_key,
        ]);
        let result = self
            .call(
                "Charge",
                json!({
                    "TerminalKey": self.terminal_key,
                    "PaymentId": init.payment_id,
                    "RebillId": provider_card_id,
                    "Token": token,
                }),
            )
            .await;

        match result {
            Ok(payload) => {
                let raw = Self::require_str(&payload, "Status")?;
                Ok(ChargeOutcome {
                    payment_id: init.payment_id,
                    status: PaymentStatus::from_provider(&raw),
                    error: None,
                })
            }
            // A declined charge is an outcome the sweep records, not a
            // transport failure.
            Err(AppError::Gateway(message)) => Ok(ChargeOutcome {
                payment_id: init.payment_id,
                status: PaymentStatus::Rejected,
                error: Some(message),
            }),
            Err(e) => Err(e),
        }
    }

    async fn payout(
        &self,
        order_key: &str,
        amount: Decimal,
        provider_card_id: &str,
    ) -> AppResult<String> {
        let kopecks = to_kopecks(amount).to_string();
        let token = sign(&[
            &kopecks,
            provider_card_id,
            order_key,
            &self.secret_key,
            &self.terminal_key,
        ]);
        let payload = self
            .call(
                "Payout",
                json!({
                    "TerminalKey": self.terminal_key,
                    "Amount": to_kopecks(amount),
                    "OrderId": order_key,
                    "CardId": provider_card_id,
                    "Token": token,
                }),
            )
            .await?;

        Self::require_str(&payload, "PaymentId")
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn kopeck_conversion() {
        assert_eq!(to_kopecks(dec!(100)), 10_000);
        assert_eq!(to_kopecks(dec!(2135.46)), 213_546);
        assert_eq!(to_kopecks(dec!(0.01)), 1);
    }

    #[test]
    fn signature_is_sha256_of_concatenation() {
        // sha256("10000order-1passwordterminal")
        let token = sign(&["10000", "order-1", "password", "terminal"]);
        let direct = sign(&["10000order-1passwordterminal"]);
        assert_eq!(token, direct);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_depends_on_order() {
        assert_ne!(sign(&["a", "b"]), sign(&["b", "a"]));
    }

    #[test]
    fn three_ds_version_two_carries_issuer_fields() {
        let payload = json!({
            "Version": "2.1.0",
            "ServerTransId": "trans-1",
            "ThreeDSMethodURL": "https://acs.example/collect",
        });
        let check = three_ds_check_from(&payload).unwrap();
        assert_eq!(check.version, "2.1.0");
        assert_eq!(check.server_transaction_id.as_deref(), Some("trans-1"));
        assert_eq!(check.method_url.as_deref(), Some("https://acs.example/collect"));
    }

    #[test]
    fn three_ds_version_one_has_no_issuer_fields() {
        let check = three_ds_check_from(&json!({ "Version": "1.0.0" })).unwrap();
        assert_eq!(check.version, "1.0.0");
        assert!(check.server_transaction_id.is_none());
        assert!(check.method_url.is_none());
    }
}
