// ============ Balance ledger ============
//
// Append-only history plus a materialized per-user account row. Every
// mutation takes the account row under an exclusive lock, so callers
// must run these inside a transaction.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::balance_history::{self, BalanceTask};
use crate::entities::{balance_account, payment};
use crate::error::{AppError, AppResult};

/// Current balance; zero for users who have never had an account row.
pub async fn balance<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Decimal> {
    let account = balance_account::Entity::find()
        .filter(balance_account::Column::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(account.map(|a| a.money).unwrap_or(Decimal::ZERO))
}

async fn account_for_update<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> AppResult<balance_account::Model> {
    let account = balance_account::Entity::find()
        .filter(balance_account::Column::UserId.eq(user_id))
        .lock_exclusive()
        .one(conn)
        .await?;

    match account {
        Some(account) => Ok(account),
        None => {
            let created = balance_account::ActiveModel {
                user_id: Set(user_id),
                money: Set(Decimal::ZERO),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            Ok(created)
        }
    }
}

async fn apply<C: ConnectionTrait>(
    conn: &C,
    account: balance_account::Model,
    delta: Decimal,
    task: BalanceTask,
    description: String,
    is_complete: bool,
) -> AppResult<balance_history::Model> {
    let user_id = account.user_id;
    let new_money = account.money + delta;

    let mut active: balance_account::ActiveModel = account.into();
    active.money = Set(new_money);
    active.update(conn).await?;

    let row = balance_history::ActiveModel {
        user_id: Set(user_id),
        task: Set(task),
        money: Set(delta),
        description: Set(description),
        is_complete: Set(is_complete),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(row)
}

pub async fn credit<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    task: BalanceTask,
    amount: Decimal,
    description: String,
) -> AppResult<balance_history::Model> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Internal(format!(
            "ledger credit with nonpositive amount {}",
            amount
        )));
    }
    let account = account_for_update(conn, user_id).await?;
    apply(conn, account, amount, task, description, true).await
}

pub async fn debit<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    task: BalanceTask,
    amount: Decimal,
    description: String,
) -> AppResult<balance_history::Model> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Internal(format!(
            "ledger debit with nonpositive amount {}",
            amount
        )));
    }
    let account = account_for_update(conn, user_id).await?;
    if account.money < amount {
        return Err(AppError::InsufficientBalance {
            balance: account.money,
            required: amount,
        });
    }
    apply(conn, account, -amount, task, description, true).await
}

/// Reserve funds without finalizing the operation. The balance drops
/// immediately; the history row stays pending until the external leg
/// settles.
pub async fn hold<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    task: BalanceTask,
    amount: Decimal,
    description: String,
) -> AppResult<balance_history::Model> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Internal(format!(
            "ledger hold with nonpositive amount {}",
            amount
        )));
    }
    let account = account_for_update(conn, user_id).await?;
    if account.money < amount {
        return Err(AppError::InsufficientBalance {
            balance: account.money,
            required: amount,
        });
    }
    apply(conn, account, -amount, task, description, false).await
}

/// Finalize a pending hold. The balance was already reduced.
pub async fn settle_hold<C: ConnectionTrait>(
    conn: &C,
    history_id: i32,
    task: BalanceTask,
    description: String,
) -> AppResult<()> {
    let row = balance_history::Entity::find_by_id(history_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Операция не найдена".to_string()))?;
    if row.is_complete {
        return Ok(());
    }

    let mut active: balance_history::ActiveModel = row.into();
    active.is_complete = Set(true);
    active.task = Set(task);
    active.description = Set(description);
    active.update(conn).await?;
    Ok(())
}

/// Cancel a pending hold: the history stays, a compensating credit
/// returns the money.
pub async fn release_hold<C: ConnectionTrait>(
    conn: &C,
    history_id: i32,
    description: String,
) -> AppResult<()> {
    let row = balance_history::Entity::find_by_id(history_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Операция не найдена".to_string()))?;
    if row.is_complete {
        return Ok(());
    }

    let user_id = row.user_id;
    let amount = -row.money;
    let task = row.task;

    let mut active: balance_history::ActiveModel = row.into();
    active.is_complete = Set(true);
    active.update(conn).await?;

    let account = account_for_update(conn, user_id).await?;
    apply(conn, account, amount, task, description, true).await?;
    Ok(())
}

/// Marker appended to top-up descriptions so the same provider payment
/// is never credited twice. The closing bracket terminates the id, so
/// the marker for payment 4 can never match inside the one for 42.
pub fn payment_marker(payment_row_id: i32) -> String {
    format!("(платёж #{})", payment_row_id)
}

/// Credit a confirmed provider payment exactly once. Both the webhook
/// and the polling endpoint funnel through here.
pub async fn credit_once_for_payment<C: ConnectionTrait>(
    conn: &C,
    row: &payment::Model,
) -> AppResult<bool> {
    let marker = payment_marker(row.id);
    let existing = balance_history::Entity::find()
        .filter(balance_history::Column::UserId.eq(row.user_id))
        .filter(balance_history::Column::Task.eq(BalanceTask::TopUp))
        .filter(balance_history::Column::Description.contains(&marker))
        .order_by_desc(balance_history::Column::Id)
        .one(conn)
        .await?;

    if existing.is_some() {
        return Ok(false);
    }

    credit(
        conn,
        row.user_id,
        BalanceTask::TopUp,
        row.amount,
        format!("{} {}", BalanceTask::TopUp.label(), marker),
    )
    .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_marker_is_stable() {
        assert_eq!(payment_marker(42), "(платёж #42)");
        assert_ne!(payment_marker(1), payment_marker(11));
    }

    #[test]
    fn payment_marker_never_prefixes_another() {
        let stored = format!("{} {}", BalanceTask::TopUp.label(), payment_marker(42));
        assert!(!stored.contains(&payment_marker(4)));
        assert!(stored.contains(&payment_marker(42)));
    }
}
