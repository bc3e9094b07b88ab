use std::env;

use rust_decimal::Decimal;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,

    // Card payment provider
    pub payment_base_url: String,
    pub payment_terminal_key: String,
    pub payment_secret_key: String,

    // Geocoding / routing provider
    pub geo_base_url: String,
    pub geo_api_key: String,

    // Push projects: one per client app
    pub push_base_url: String,
    pub push_client_app_key: String,
    pub push_driver_app_key: String,

    // SMS provider
    pub sms_base_url: String,
    pub sms_api_key: String,

    pub default_franchise_id: i32,
    pub default_franchise_name: String,

    /// Minimum parent balance required to create a schedule or accept a bid.
    pub min_schedule_balance: Decimal,
    pub min_payment: Decimal,
    pub max_payment: Decimal,
    pub min_withdrawal: Decimal,

    pub meeting_code_ttl_hours: i64,
    pub meeting_code_max_fails: u32,
    pub meeting_code_fail_window_secs: u64,

    /// Interval between weekly-payment sweeps, seconds (daily in production).
    pub payment_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: parse_or("JWT_EXPIRATION_HOURS", 24),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_or("SERVER_PORT", 3000),

            payment_base_url: env::var("PAYMENT_BASE_URL")
                .unwrap_or_else(|_| "https://securepay.example.com/v2".to_string()),
            payment_terminal_key: env::var("PAYMENT_TERMINAL_KEY")
                .expect("PAYMENT_TERMINAL_KEY must be set"),
            payment_secret_key: env::var("PAYMENT_SECRET_KEY")
                .expect("PAYMENT_SECRET_KEY must be set"),

            geo_base_url: env::var("GEO_BASE_URL")
                .unwrap_or_else(|_| "https://geocode.example.com".to_string()),
            geo_api_key: env::var("GEO_API_KEY")
                .expect("GEO_API_KEY must be set"),

            push_base_url: env::var("PUSH_BASE_URL")
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            push_client_app_key: env::var("PUSH_CLIENT_APP_KEY")
                .expect("PUSH_CLIENT_APP_KEY must be set"),
            push_driver_app_key: env::var("PUSH_DRIVER_APP_KEY")
                .expect("PUSH_DRIVER_APP_KEY must be set"),

            sms_base_url: env::var("SMS_BASE_URL")
                .unwrap_or_else(|_| "https://sms.example.com".to_string()),
            sms_api_key: env::var("SMS_API_KEY").unwrap_or_default(),

            default_franchise_id: parse_or("DEFAULT_FRANCHISE_ID", 1),
            default_franchise_name: env::var("DEFAULT_FRANCHISE_NAME")
                .unwrap_or_else(|_| "Autonyanya".to_string()),

            min_schedule_balance: parse_or("MIN_SCHEDULE_BALANCE", Decimal::new(100, 0)),
            min_payment: parse_or("MIN_PAYMENT", Decimal::new(100, 0)),
            max_payment: parse_or("MAX_PAYMENT", Decimal::new(75_000, 0)),
            min_withdrawal: parse_or("MIN_WITHDRAWAL", Decimal::new(500, 0)),

            meeting_code_ttl_hours: parse_or("MEETING_CODE_TTL_HOURS", 24),
            meeting_code_max_fails: parse_or("MEETING_CODE_MAX_FAILS", 5),
            meeting_code_fail_window_secs: parse_or("MEETING_CODE_FAIL_WINDOW_SECS", 900),

            payment_sweep_interval_secs: parse_or("PAYMENT_SWEEP_INTERVAL_SECS", 86_400),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid value", key)),
        Err(_) => default,
    }
}
