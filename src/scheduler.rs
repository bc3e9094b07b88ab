// ============ Weekly payment sweep ============
//
// A background task charges every due weekly subscription against the
// parent's stored card. The sweep runs on one instance at a time,
// guarded by a database lease.

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::AppState;
use crate::entities::balance_history::BalanceTask;
use crate::entities::schedule::ScheduleStatus;
use crate::entities::weekly_payment_history::AttemptStatus;
use crate::entities::weekly_payment_schedule::WeeklyPaymentStatus;
use crate::entities::{card, lease, schedule, weekly_payment_history, weekly_payment_schedule};
use crate::error::AppResult;
use crate::gateways::PaymentStatus;
use crate::ledger;
use crate::notify;

const LEASE_NAME: &str = "weekly-payment-sweep";

/// Consecutive failures before the subscription is suspended.
const MAX_FAILED_ATTEMPTS: i32 = 3;

pub fn next_charge_date(current: NaiveDate) -> NaiveDate {
    current
        .checked_add_days(Days::new(7))
        .unwrap_or(current)
}

/// Dates written after a successful charge. The anchor is the due date,
/// not the sweep day, so a delayed sweep never shifts the billing
/// weekday.
pub fn billing_advance(due: NaiveDate) -> (NaiveDate, NaiveDate) {
    (due, next_charge_date(due))
}

pub fn should_suspend(failed_attempts: i32) -> bool {
    failed_attempts >= MAX_FAILED_ATTEMPTS
}

/// Start the sweep loop. The handle is held by main for its lifetime.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    let owner = Uuid::new_v4().to_string();
    let period = std::time::Duration::from_secs(state.config.payment_sweep_interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so a restart storm
        // does not stack sweeps.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match try_acquire_lease(&state.db, &owner, period).await {
                Ok(true) => {
                    tracing::info!(owner = %owner, "starting weekly payment sweep");
                    if let Err(e) = run_sweep(&state).await {
                        tracing::error!(error = %e, "weekly payment sweep failed");
                    }
                }
                Ok(false) => {
                    tracing::debug!("weekly payment sweep lease held elsewhere");
                }
                Err(e) => {
                    tracing::error!(error = %e, "weekly payment lease check failed");
                }
            }
        }
    })
}

/// Take or refresh the sweep lease. Returns false when another live
/// owner holds it.
async fn try_acquire_lease(
    db: &DatabaseConnection,
    owner: &str,
    ttl: std::time::Duration,
) -> AppResult<bool> {
    let txn = db.begin().await?;
    let now = Utc::now();
    let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));

    let existing = lease::Entity::find_by_id(LEASE_NAME)
        .lock_exclusive()
        .one(&txn)
        .await?;

    let acquired = match existing {
        Some(row) if row.owner != owner && row.expires_at > now => false,
        Some(row) => {
            let mut active: lease::ActiveModel = row.into();
            active.owner = Set(owner.to_string());
            active.expires_at = Set(expires_at.into());
            active.update(&txn).await?;
            true
        }
        None => {
            lease::ActiveModel {
                name: Set(LEASE_NAME.to_string()),
                owner: Set(owner.to_string()),
                expires_at: Set(expires_at.into()),
            }
            .insert(&txn)
            .await?;
            true
        }
    };

    txn.commit().await?;
    Ok(acquired)
}

/// Charge every due subscription. Per-row failures are recorded and do
/// not stop the sweep.
pub async fn run_sweep(state: &AppState) -> AppResult<()> {
    let today = Utc::now().date_naive();
    let due = weekly_payment_schedule::Entity::find()
        .filter(weekly_payment_schedule::Column::Status.eq(WeeklyPaymentStatus::Active))
        .filter(weekly_payment_schedule::Column::NextPaymentDate.lte(today))
        .all(&state.db)
        .await?;

    tracing::info!(count = due.len(), "weekly subscriptions due");

    for row in due {
        let id = row.id;
        if let Err(e) = charge_one(state, row).await {
            tracing::error!(weekly_payment_id = id, error = %e, "charge attempt errored");
        }
    }

    Ok(())
}

async fn charge_one(state: &AppState, row: weekly_payment_schedule::Model) -> AppResult<()> {
    let Some(card_row) = resolve_card(state, &row).await? else {
        return record_failure(state, row, None, "Нет активной карты".to_string()).await;
    };

    let order_key = format!("weekly-{}-{}", row.id, Uuid::new_v4());
    let customer_key = row.user_id.to_string();
    let outcome = state
        .payment
        .charge_card(&order_key, row.amount, &card_row.provider_card_id, &customer_key)
        .await;

    match outcome {
        Ok(outcome) if outcome.status.is_credited() => {
            record_success(state, row, outcome.payment_id).await
        }
        Ok(outcome) => {
            let message = outcome
                .error
                .unwrap_or_else(|| format!("провайдер вернул статус {:?}", outcome.status));
            record_failure(state, row, Some(outcome.payment_id), message).await
        }
        Err(e) => record_failure(state, row, None, e.to_string()).await,
    }
}

/// Charging card: the explicitly chosen one, else the freshest active.
async fn resolve_card(
    state: &AppState,
    row: &weekly_payment_schedule::Model,
) -> AppResult<Option<card::Model>> {
    if let Some(card_id) = row.card_id {
        let chosen = card::Entity::find_by_id(card_id)
            .filter(card::Column::Active.eq(true))
            .one(&state.db)
            .await?;
        if chosen.is_some() {
            return Ok(chosen);
        }
    }

    let fallback = card::Entity::find()
        .filter(card::Column::UserId.eq(row.user_id))
        .filter(card::Column::Active.eq(true))
        .order_by_desc(card::Column::CreatedAt)
        .one(&state.db)
        .await?;
    Ok(fallback)
}

async fn record_success(
    state: &AppState,
    row: weekly_payment_schedule::Model,
    payment_id: String,
) -> AppResult<()> {
    let user_id = row.user_id;
    let amount = row.amount;
    let schedule_id = row.schedule_id;

    let txn = state.db.begin().await?;

    weekly_payment_history::ActiveModel {
        weekly_payment_id: Set(row.id),
        status: Set(AttemptStatus::Success),
        amount: Set(amount),
        error_message: Set(None),
        payment_id: Set(Some(payment_id)),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    // The card charge lands on the balance and leaves again in the same
    // transaction, so the account always matches its history.
    ledger::credit(
        &txn,
        user_id,
        BalanceTask::TopUp,
        amount,
        format!("Пополнение по подписке, расписание #{}", schedule_id),
    )
    .await?;
    ledger::debit(
        &txn,
        user_id,
        BalanceTask::WeeklyCharge,
        amount,
        format!("Оплата по расписанию #{}", schedule_id),
    )
    .await?;

    let (paid_for, next_due) = billing_advance(row.next_payment_date);
    let mut active: weekly_payment_schedule::ActiveModel = row.into();
    active.next_payment_date = Set(next_due);
    active.last_payment_date = Set(Some(paid_for));
    active.failed_attempts = Set(0);
    active.last_error = Set(None);
    active.update(&txn).await?;

    txn.commit().await?;

    notify::notify_user(
        state,
        user_id,
        "Оплата прошла",
        &format!("Списано {} ₽ за неделю поездок", amount),
        serde_json::json!({ "action": "weekly_payment", "schedule_id": schedule_id }),
    )
    .await?;

    Ok(())
}

async fn record_failure(
    state: &AppState,
    row: weekly_payment_schedule::Model,
    payment_id: Option<String>,
    message: String,
) -> AppResult<()> {
    let user_id = row.user_id;
    let schedule_id = row.schedule_id;
    let attempts = row.failed_attempts + 1;
    let suspend = should_suspend(attempts);

    tracing::warn!(
        weekly_payment_id = row.id,
        attempts,
        error = %message,
        "weekly charge failed"
    );

    let txn = state.db.begin().await?;

    weekly_payment_history::ActiveModel {
        weekly_payment_id: Set(row.id),
        status: Set(AttemptStatus::Failed),
        amount: Set(row.amount),
        error_message: Set(Some(message.clone())),
        payment_id: Set(payment_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: weekly_payment_schedule::ActiveModel = row.into();
    active.failed_attempts = Set(attempts);
    active.last_error = Set(Some(message));
    if suspend {
        active.status = Set(WeeklyPaymentStatus::Suspended);
    }
    active.update(&txn).await?;

    // The contract leaves the board entirely; a pending status would
    // offer the suspended program for fresh bids.
    if suspend {
        if let Some(schedule_row) = schedule::Entity::find_by_id(schedule_id).one(&txn).await? {
            let mut active: schedule::ActiveModel = schedule_row.into();
            active.status = Set(ScheduleStatus::Deleted);
            active.update(&txn).await?;
        }
    }

    txn.commit().await?;

    let (title, body) = if suspend {
        (
            "Подписка приостановлена",
            "Не удалось списать оплату. Поездки по расписанию приостановлены, обновите карту".to_string(),
        )
    } else {
        (
            "Не удалось списать оплату",
            "Проверьте карту, мы попробуем ещё раз".to_string(),
        )
    };
    notify::notify_user(
        state,
        user_id,
        title,
        &body,
        serde_json::json!({ "action": "weekly_payment_failed", "schedule_id": schedule_id }),
    )
    .await?;

    Ok(())
}

/// Amount charged weekly: sum of the active roads' per-trip prices over
/// the days the contract covers in one week.
pub fn weekly_amount(road_amounts: &[(Decimal, usize)]) -> Decimal {
    road_amounts
        .iter()
        .map(|(amount, rides_per_week)| *amount * Decimal::from(*rides_per_week as u64))
        .sum()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn charge_date_advances_one_week() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(
            next_charge_date(date),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
    }

    #[test]
    fn late_sweep_keeps_the_billing_weekday() {
        // Due Monday, swept Wednesday: the anchor stays on Mondays.
        let due = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let (paid_for, next_due) = billing_advance(due);
        assert_eq!(paid_for, due);
        assert_eq!(next_due, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    }

    #[test]
    fn suspends_on_third_failure() {
        assert!(!should_suspend(1));
        assert!(!should_suspend(2));
        assert!(should_suspend(3));
        assert!(should_suspend(4));
    }

    #[test]
    fn weekly_amount_sums_rides() {
        // One road 3 times a week, a second road once.
        let amount = weekly_amount(&[(dec!(500.00), 3), (dec!(750.50), 1)]);
        assert_eq!(amount, dec!(2250.50));
    }

    #[test]
    fn weekly_amount_empty_is_zero() {
        assert_eq!(weekly_amount(&[]), Decimal::ZERO);
    }
}
