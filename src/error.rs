use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Domain error taxonomy. The HTTP layer maps every variant to the
/// `{ "status": bool, "message": string, ... }` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Balance too low for the requested operation; carries the current
    /// balance and the required amount in the response payload.
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: Decimal, required: Decimal },

    /// Upstream payment/geo/push/SMS call failed. The provider response is
    /// logged at the adapter boundary, never surfaced to the client.
    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::InsufficientBalance { balance, required } => {
                let body = Json(json!({
                    "status": false,
                    "message": "Недостаточно средств на балансе",
                    "balance": balance,
                    "required": required,
                }));
                return (StatusCode::PAYMENT_REQUIRED, body).into_response();
            }
            AppError::Gateway(m) => {
                tracing::error!(error = %m, "gateway call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Сервис временно недоступен".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Внутренняя ошибка сервера".to_string(),
                )
            }
            AppError::Internal(m) => {
                tracing::error!(error = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Внутренняя ошибка сервера".to_string(),
                )
            }
        };

        let body = Json(json!({ "status": false, "message": message }));
        (status, body).into_response()
    }
}
