// ============ External provider adapters ============
//
// Every outbound integration sits behind a trait so handlers and the
// payment sweep can be exercised without network access. Concrete
// implementations live in the sibling modules and share one reqwest
// client with a 10 second timeout.

pub mod geo;
pub mod payment;
pub mod push;
pub mod sms;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub use geo::GeoClient;
pub use payment::PaymentClient;
pub use push::PushClient;
pub use sms::SmsClient;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Geocoding and routing provider.
#[async_trait]
pub trait GeoApi: Send + Sync {
    /// Resolve a free-form address to coordinates. `None` means the
    /// provider could not place the address; callers fall back to (0, 0)
    /// and keep the stored address string authoritative.
    async fn geocode(&self, address: &str) -> AppResult<Option<GeoPoint>>;

    /// Road distance and travel time between two points.
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> AppResult<RouteEstimate>;
}

#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub payment_id: String,
    /// Provider-hosted payment form. Empty for flows that finish in-app.
    pub payment_url: String,
}

#[derive(Debug, Clone)]
pub struct SbpInit {
    pub payment_id: String,
    /// QR payload the mobile app renders for the bank app to scan.
    pub qr_payload: String,
}

/// Outcome of the 3-D Secure version check that precedes an in-app
/// authorization. Version 2.x cards additionally carry the issuer
/// transaction id and a data-collection endpoint.
#[derive(Debug, Clone)]
pub struct ThreeDsCheck {
    pub version: String,
    pub server_transaction_id: Option<String>,
    pub method_url: Option<String>,
}

/// Provider-side payment state, normalized from the raw status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    New,
    FormShowed,
    Authorized,
    ThreeDsChecking,
    Confirming,
    Confirmed,
    Rejected,
    Refunded,
    Unknown,
}

impl PaymentStatus {
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "NEW" => Self::New,
            "FORM_SHOWED" | "FORMSHOWED" => Self::FormShowed,
            "AUTHORIZED" => Self::Authorized,
            "3DS_CHECKING" | "3DS_CHECKED" => Self::ThreeDsChecking,
            "CONFIRMING" => Self::Confirming,
            "CONFIRMED" => Self::Confirmed,
            "REJECTED" | "CANCELED" | "DEADLINE_EXPIRED" | "AUTH_FAIL" => Self::Rejected,
            "REFUNDED" | "PARTIAL_REFUNDED" => Self::Refunded,
            _ => Self::Unknown,
        }
    }

    /// Whether the money is (or is about to be) on our side.
    pub fn is_credited(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Confirming)
    }

    pub fn is_final_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Refunded)
    }
}

#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub error: Option<String>,
}

/// Card and SBP acquiring provider.
#[async_trait]
pub trait PaymentApi: Send + Sync {
    /// Open a card payment session; the client finishes it on the
    /// provider-hosted form.
    async fn init(
        &self,
        order_key: &str,
        amount: Decimal,
        description: &str,
        customer_key: Option<&str>,
    ) -> AppResult<PaymentInit>;

    /// Open an SBP (bank transfer QR) payment session.
    async fn init_sbp(&self, order_key: &str, amount: Decimal, description: &str)
        -> AppResult<SbpInit>;

    /// Ask which 3-D Secure version the card's issuer runs. Precedes
    /// `finish_authorize` for in-app card entry.
    async fn check_3ds(
        &self,
        payment_id: &str,
        encrypted_card_data: &str,
    ) -> AppResult<ThreeDsCheck>;

    /// Finish an in-app card payment opened with `init`. The outcome
    /// status may be `ThreeDsChecking` when the issuer demands a
    /// challenge before confirming.
    async fn finish_authorize(
        &self,
        payment_id: &str,
        encrypted_card_data: &str,
        client_ip: &str,
    ) -> AppResult<ChargeOutcome>;

    async fn get_state(&self, payment_id: &str) -> AppResult<PaymentStatus>;

    /// Unattended charge against a stored card. Used by the weekly sweep.
    async fn charge_card(
        &self,
        order_key: &str,
        amount: Decimal,
        provider_card_id: &str,
        customer_key: &str,
    ) -> AppResult<ChargeOutcome>;

    /// Start a payout to a stored card. Settlement is reported back
    /// through the payout webhook.
    async fn payout(
        &self,
        order_key: &str,
        amount: Decimal,
        provider_card_id: &str,
    ) -> AppResult<String>;
}

/// Which mobile application a push notification targets. Drivers run a
/// separate app with its own project key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushApp {
    Client,
    Driver,
}

#[async_trait]
pub trait PushApi: Send + Sync {
    async fn send(
        &self,
        app: PushApp,
        device_token: &str,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait SmsApi: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> AppResult<()>;
}

#[cfg(test)]
pub mod fakes {
    //! No-op gateway doubles for handler and pipeline tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeGeo {
        pub point: Option<GeoPoint>,
        pub estimate: Option<RouteEstimate>,
    }

    #[async_trait]
    impl GeoApi for FakeGeo {
        async fn geocode(&self, _address: &str) -> AppResult<Option<GeoPoint>> {
            Ok(self.point)
        }

        async fn route(&self, _from: GeoPoint, _to: GeoPoint) -> AppResult<RouteEstimate> {
            Ok(self.estimate.unwrap_or(RouteEstimate {
                distance_m: 0.0,
                duration_s: 0.0,
            }))
        }
    }

    #[derive(Default)]
    pub struct RecordingPush {
        pub sent: Mutex<Vec<(PushApp, String, String)>>,
    }

    #[async_trait]
    impl PushApi for RecordingPush {
        async fn send(
            &self,
            app: PushApp,
            device_token: &str,
            title: &str,
            _body: &str,
            _data: serde_json::Value,
        ) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((app, device_token.to_string(), title.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct NullSms;

    #[async_trait]
    impl SmsApi for NullSms {
        async fn send(&self, _phone: &str, _text: &str) -> AppResult<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_status_mapping() {
        assert_eq!(PaymentStatus::from_provider("CONFIRMED"), PaymentStatus::Confirmed);
        assert_eq!(PaymentStatus::from_provider("REJECTED"), PaymentStatus::Rejected);
        assert_eq!(
            PaymentStatus::from_provider("3DS_CHECKING"),
            PaymentStatus::ThreeDsChecking
        );
        assert_eq!(PaymentStatus::from_provider("???"), PaymentStatus::Unknown);
    }

    #[test]
    fn credited_covers_confirming() {
        assert!(PaymentStatus::Confirmed.is_credited());
        assert!(PaymentStatus::Confirming.is_credited());
        assert!(!PaymentStatus::Authorized.is_credited());
        assert!(!PaymentStatus::Rejected.is_credited());
    }
}
