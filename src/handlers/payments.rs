use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::entities::balance_history::BalanceTask;
use crate::entities::payment::{self, PaymentKind};
use crate::entities::{balance_history, card};
use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::notify;
use crate::utils::jwt::Claims;

use super::auth::StatusResponse;

fn check_topup_bounds(state: &AppState, amount: Decimal) -> AppResult<()> {
    if amount < state.config.min_payment || amount > state.config.max_payment {
        return Err(AppError::BadRequest(format!(
            "Сумма пополнения от {} до {} ₽",
            state.config.min_payment, state.config.max_payment
        )));
    }
    Ok(())
}

// ============ Top-ups ============

#[derive(Debug, Deserialize)]
pub struct StartPaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StartPaymentResponse {
    pub status: bool,
    pub order_key: String,
    pub payment_id: String,
    pub payment_url: String,
}

/// Open a card top-up session with the payment provider
pub async fn start_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartPaymentRequest>,
) -> AppResult<Json<StartPaymentResponse>> {
    check_topup_bounds(&state, payload.amount)?;

    let order_key = format!("topup-{}", Uuid::new_v4());
    let init = state
        .payment
        .init(
            &order_key,
            payload.amount,
            "Пополнение баланса",
            Some(&claims.sub.to_string()),
        )
        .await?;

    payment::ActiveModel {
        user_id: Set(claims.sub),
        order_key: Set(order_key.clone()),
        provider_payment_id: Set(Some(init.payment_id.clone())),
        amount: Set(payload.amount),
        kind: Set(PaymentKind::Card),
        status: Set("NEW".to_string()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(Json(StartPaymentResponse {
        status: true,
        order_key,
        payment_id: init.payment_id,
        payment_url: init.payment_url,
    }))
}

#[derive(Debug, Serialize)]
pub struct StartSbpResponse {
    pub status: bool,
    pub order_key: String,
    pub payment_id: String,
    pub qr_payload: String,
}

/// Open an SBP top-up and return the QR payload
pub async fn start_sbp_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartPaymentRequest>,
) -> AppResult<Json<StartSbpResponse>> {
    check_topup_bounds(&state, payload.amount)?;

    let order_key = format!("topup-{}", Uuid::new_v4());
    let init = state
        .payment
        .init_sbp(&order_key, payload.amount, "Пополнение баланса")
        .await?;

    payment::ActiveModel {
        user_id: Set(claims.sub),
        order_key: Set(order_key.clone()),
        provider_payment_id: Set(Some(init.payment_id.clone())),
        amount: Set(payload.amount),
        kind: Set(PaymentKind::Sbp),
        status: Set("NEW".to_string()),
        updated_at: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(Json(StartSbpResponse {
        status: true,
        order_key,
        payment_id: init.payment_id,
        qr_payload: init.qr_payload,
    }))
}

/// Pull the provider state for a payment row and credit the balance when
/// the money arrived. Safe to call repeatedly.
async fn settle_payment(state: &AppState, row: payment::Model) -> AppResult<(bool, String)> {
    let provider_payment_id = row
        .provider_payment_id
        .clone()
        .ok_or_else(|| AppError::Internal("payment row without provider id".to_string()))?;

    let provider_status = state.payment.get_state(&provider_payment_id).await?;
    let credited = provider_status.is_credited();

    let txn = state.db.begin().await?;

    let freshly_credited = if credited {
        ledger::credit_once_for_payment(&txn, &row).await?
    } else {
        false
    };

    let status_label = format!("{:?}", provider_status).to_uppercase();
    let user_id = row.user_id;
    let amount = row.amount;
    let mut active: payment::ActiveModel = row.into();
    active.status = Set(status_label.clone());
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    txn.commit().await?;

    if freshly_credited {
        notify::notify_user(
            state,
            user_id,
            "Баланс пополнен",
            &format!("Зачислено {} ₽", amount),
            serde_json::json!({ "action": "balance" }),
        )
        .await?;
    }

    Ok((credited, status_label))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub status: bool,
    pub payment_status: String,
    pub balance: Decimal,
}

/// Poll a card payment after the provider form closes
pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<ConfirmPaymentResponse>> {
    let row = payment::Entity::find()
        .filter(payment::Column::UserId.eq(claims.sub))
        .filter(payment::Column::ProviderPaymentId.eq(&payload.payment_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Платёж не найден".to_string()))?;

    let (credited, status_label) = settle_payment(&state, row).await?;
    let balance = ledger::balance(&state.db, claims.sub).await?;

    Ok(Json(ConfirmPaymentResponse {
        status: credited,
        payment_status: status_label,
        balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AddMoneyRequest {
    pub order_key: String,
}

/// Fallback polling path, idempotent against the webhook
pub async fn add_money(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddMoneyRequest>,
) -> AppResult<Json<ConfirmPaymentResponse>> {
    let row = payment::Entity::find()
        .filter(payment::Column::UserId.eq(claims.sub))
        .filter(payment::Column::OrderKey.eq(&payload.order_key))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Платёж не найден".to_string()))?;

    let (credited, status_label) = settle_payment(&state, row).await?;
    let balance = ledger::balance(&state.db, claims.sub).await?;

    Ok(Json(ConfirmPaymentResponse {
        status: credited,
        payment_status: status_label,
        balance,
    }))
}

/// Provider webhook; the authoritative credit path. The reported state
/// is never trusted directly, the provider is re-queried.
pub async fn payments_status_webhook(
    State(state): State<AppState>,
    Path(order_key): Path<String>,
) -> AppResult<&'static str> {
    let row = payment::Entity::find()
        .filter(payment::Column::OrderKey.eq(&order_key))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Платёж не найден".to_string()))?;

    let (credited, status_label) = settle_payment(&state, row).await?;
    tracing::info!(order_key, credited, status = %status_label, "payment webhook processed");

    // The provider expects this exact body to stop retrying.
    Ok("OK")
}

// ============ Payouts ============

const PAYOUT_KEY_PREFIX: &str = "payout-";

fn payout_order_key(hold_id: i32) -> String {
    format!("{}{}", PAYOUT_KEY_PREFIX, hold_id)
}

fn parse_payout_order_key(order_key: &str) -> Option<i32> {
    order_key.strip_prefix(PAYOUT_KEY_PREFIX)?.parse().ok()
}

#[derive(Debug, Deserialize)]
pub struct PayoutRequest {
    pub amount: Decimal,
    pub card_id: i32,
}

#[derive(Debug, Serialize)]
pub struct PayoutResponse {
    pub status: bool,
    pub message: String,
    pub balance: Decimal,
}

/// Driver requests a withdrawal to a stored card. The amount is held
/// until the provider confirms the transfer.
pub async fn payout_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PayoutRequest>,
) -> AppResult<Json<PayoutResponse>> {
    if payload.amount < state.config.min_withdrawal {
        return Err(AppError::BadRequest(format!(
            "Минимальная сумма вывода {} ₽",
            state.config.min_withdrawal
        )));
    }

    let card_row = card::Entity::find_by_id(payload.card_id)
        .filter(card::Column::UserId.eq(claims.sub))
        .filter(card::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Карта не найдена".to_string()))?;

    let txn = state.db.begin().await?;
    let hold = ledger::hold(
        &txn,
        claims.sub,
        BalanceTask::PayoutRequest,
        payload.amount,
        format!("Вывод на карту {}", card_row.pan_masked),
    )
    .await?;
    txn.commit().await?;

    // The transfer starts only after the hold is committed; a provider
    // failure releases it right away.
    let order_key = payout_order_key(hold.id);
    if let Err(e) = state
        .payment
        .payout(&order_key, payload.amount, &card_row.provider_card_id)
        .await
    {
        let txn = state.db.begin().await?;
        ledger::release_hold(&txn, hold.id, "Возврат: вывод не выполнен".to_string()).await?;
        txn.commit().await?;
        return Err(e);
    }

    let balance = ledger::balance(&state.db, claims.sub).await?;

    tracing::info!(user_id = claims.sub, hold_id = hold.id, amount = %payload.amount, "payout started");

    Ok(Json(PayoutResponse {
        status: true,
        message: "Заявка на вывод принята".to_string(),
        balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PayoutResultRequest {
    pub order_key: String,
    pub success: bool,
}

/// Provider webhook reconciling a payout: settle or release the hold
pub async fn payout_result(
    State(state): State<AppState>,
    Json(payload): Json<PayoutResultRequest>,
) -> AppResult<&'static str> {
    let hold_id = parse_payout_order_key(&payload.order_key)
        .ok_or_else(|| AppError::BadRequest("Неизвестный платёж".to_string()))?;

    let hold = balance_history::Entity::find_by_id(hold_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Операция не найдена".to_string()))?;
    let user_id = hold.user_id;

    let txn = state.db.begin().await?;
    if payload.success {
        ledger::settle_hold(
            &txn,
            hold_id,
            BalanceTask::PayoutSuccess,
            "Вывод средств выполнен".to_string(),
        )
        .await?;
    } else {
        ledger::release_hold(&txn, hold_id, "Возврат: вывод отклонён банком".to_string()).await?;
    }
    txn.commit().await?;

    let (title, body) = if payload.success {
        ("Вывод выполнен", "Деньги отправлены на вашу карту")
    } else {
        ("Вывод отклонён", "Средства возвращены на баланс")
    };
    notify::notify_user(
        &state,
        user_id,
        title,
        body,
        serde_json::json!({ "action": "payout" }),
    )
    .await?;

    tracing::info!(hold_id, success = payload.success, "payout reconciled");

    Ok("OK")
}

// ============ Cards ============

#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    /// Reference returned by the provider's card-binding flow.
    pub provider_card_id: String,
    pub pan_masked: String,
}

#[derive(Debug, Serialize)]
pub struct CardsResponse {
    pub status: bool,
    pub cards: Vec<card::Model>,
}

/// Store a card reference (masked PAN and provider id only)
pub async fn add_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddCardRequest>,
) -> AppResult<Json<CardsResponse>> {
    if payload.provider_card_id.trim().is_empty() || payload.pan_masked.trim().is_empty() {
        return Err(AppError::BadRequest("Некорректные данные карты".to_string()));
    }

    card::ActiveModel {
        user_id: Set(claims.sub),
        provider_card_id: Set(payload.provider_card_id),
        pan_masked: Set(payload.pan_masked),
        active: Set(true),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    list_cards(State(state), Extension(claims)).await
}

/// The user's stored cards
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<CardsResponse>> {
    let cards = card::Entity::find()
        .filter(card::Column::UserId.eq(claims.sub))
        .filter(card::Column::Active.eq(true))
        .order_by_desc(card::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(CardsResponse {
        status: true,
        cards,
    }))
}

/// Forget a stored card
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(card_id): Path<i32>,
) -> AppResult<Json<StatusResponse>> {
    let row = card::Entity::find_by_id(card_id)
        .filter(card::Column::UserId.eq(claims.sub))
        .filter(card::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Карта не найдена".to_string()))?;

    let mut active: card::ActiveModel = row.into();
    active.active = Set(false);
    active.update(&state.db).await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Карта удалена".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct BalanceHistoryResponse {
    pub status: bool,
    pub balance: Decimal,
    pub history: Vec<BalanceHistoryItem>,
}

#[derive(Debug, Serialize)]
pub struct BalanceHistoryItem {
    pub id: i32,
    pub task: BalanceTask,
    pub label: String,
    pub money: Decimal,
    pub description: String,
    pub is_complete: bool,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

/// Balance with its operation history, newest first
pub async fn balance_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<BalanceHistoryResponse>> {
    let balance = ledger::balance(&state.db, claims.sub).await?;
    let history = balance_history::Entity::find()
        .filter(balance_history::Column::UserId.eq(claims.sub))
        .order_by_desc(balance_history::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|row| BalanceHistoryItem {
            id: row.id,
            label: row.task.label().to_string(),
            task: row.task,
            money: row.money,
            description: row.description,
            is_complete: row.is_complete,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(BalanceHistoryResponse {
        status: true,
        balance,
        history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payout_order_key_round_trip() {
        let key = payout_order_key(77);
        assert_eq!(key, "payout-77");
        assert_eq!(parse_payout_order_key(&key), Some(77));
    }

    #[test]
    fn foreign_order_keys_are_rejected() {
        assert_eq!(parse_payout_order_key("topup-77"), None);
        assert_eq!(parse_payout_order_key("payout-x"), None);
    }
}
