pub mod chat;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod gateways;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod scheduler;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

use crate::chat::registry::SocketRegistry;
use crate::gateways::{GeoApi, PaymentApi, PushApi, SmsApi};
use crate::utils::rate_window::RateWindow;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub geo: Arc<dyn GeoApi>,
    pub payment: Arc<dyn PaymentApi>,
    pub push: Arc<dyn PushApi>,
    pub sms: Arc<dyn SmsApi>,
    pub sockets: Arc<dyn SocketRegistry>,
    /// Sliding-window counter for failed meeting-code verifications,
    /// keyed by (parent id, road id).
    pub verify_limiter: Arc<RateWindow>,
}
