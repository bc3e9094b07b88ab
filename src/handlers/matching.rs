use std::collections::BTreeSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{Days, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::entities::driver_bid::{self, BidStatus};
use crate::entities::schedule::{self, ScheduleStatus};
use crate::entities::weekly_payment_schedule::{self, WeeklyPaymentStatus};
use crate::entities::{road_driver, user};
use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::notify;
use crate::utils::jwt::Claims;

use super::auth::StatusResponse;
use super::schedule::{active_roads, owned_schedule};

/// A bid must cover the schedule's active roads exactly. Returns the
/// missing and extra road ids on mismatch.
pub fn full_program_diff(active: &[i32], requested: &[i32]) -> Option<(Vec<i32>, Vec<i32>)> {
    let active: BTreeSet<i32> = active.iter().copied().collect();
    let requested: BTreeSet<i32> = requested.iter().copied().collect();

    let missing: Vec<i32> = active.difference(&requested).copied().collect();
    let extra: Vec<i32> = requested.difference(&active).copied().collect();

    if missing.is_empty() && extra.is_empty() {
        None
    } else {
        Some((missing, extra))
    }
}

/// A driver gets one bid per schedule: pending means a duplicate,
/// accepted or declined means the matter is already settled.
pub fn may_bid(prior: Option<BidStatus>) -> bool {
    prior.is_none()
}

// ============ Driver side ============

#[derive(Debug, Serialize)]
pub struct OpenSchedulesResponse {
    pub status: bool,
    pub schedules: Vec<super::schedule::ScheduleView>,
}

/// Programs still waiting for a driver
pub async fn open_schedules(
    State(state): State<AppState>,
) -> AppResult<Json<OpenSchedulesResponse>> {
    let rows = schedule::Entity::find()
        .filter(schedule::Column::Status.eq(ScheduleStatus::Pending))
        .order_by_desc(schedule::Column::Id)
        .all(&state.db)
        .await?;

    let mut schedules = Vec::with_capacity(rows.len());
    for row in rows {
        schedules.push(super::schedule::load_schedule_view(&state, row).await?);
    }

    Ok(Json(OpenSchedulesResponse {
        status: true,
        schedules,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub schedule_id: i32,
    pub road_ids: Vec<i32>,
}

/// Driver bids to take a whole program
pub async fn want_schedule_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<BidRequest>,
) -> AppResult<Json<StatusResponse>> {
    let schedule_row = schedule::Entity::find_by_id(payload.schedule_id)
        .filter(schedule::Column::Status.eq(ScheduleStatus::Pending))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Расписание не найдено".to_string()))?;

    let roads = active_roads(&state, schedule_row.id).await?;
    let active_ids: Vec<i32> = roads.iter().map(|r| r.id).collect();

    if let Some((missing, extra)) = full_program_diff(&active_ids, &payload.road_ids) {
        tracing::warn!(
            driver_id = claims.sub,
            schedule_id = schedule_row.id,
            requested = ?payload.road_ids,
            ?missing,
            ?extra,
            "bid does not cover the whole program"
        );
        return Err(AppError::BadRequest(
            "Заявка должна покрывать все маршруты расписания".to_string(),
        ));
    }

    let existing = driver_bid::Entity::find()
        .filter(driver_bid::Column::DriverId.eq(claims.sub))
        .filter(driver_bid::Column::ScheduleId.eq(schedule_row.id))
        .one(&state.db)
        .await?;
    if !may_bid(existing.map(|b| b.status)) {
        return Err(AppError::Conflict(
            "Вы уже откликались на это расписание".to_string(),
        ));
    }

    let txn = state.db.begin().await?;
    for road_id in &active_ids {
        driver_bid::ActiveModel {
            driver_id: Set(claims.sub),
            schedule_id: Set(schedule_row.id),
            road_id: Set(*road_id),
            status: Set(BidStatus::Pending),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    tracing::info!(
        driver_id = claims.sub,
        schedule_id = schedule_row.id,
        roads = active_ids.len(),
        "driver bid placed"
    );

    notify::notify_user(
        &state,
        schedule_row.parent_id,
        "Новый отклик",
        "Водитель готов взять ваше расписание",
        serde_json::json!({ "action": "bid", "schedule_id": schedule_row.id }),
    )
    .await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Заявка отправлена".to_string(),
    }))
}

// ============ Parent side ============

#[derive(Debug, Serialize)]
pub struct BidView {
    pub driver_id: i32,
    pub driver_name: String,
    pub road_ids: Vec<i32>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponsesResponse {
    pub status: bool,
    pub bids: Vec<BidView>,
}

/// Pending driver bids on a program, grouped by driver
pub async fn schedule_responses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<i32>,
) -> AppResult<Json<ScheduleResponsesResponse>> {
    owned_schedule(&state, claims.sub, schedule_id).await?;

    let rows = driver_bid::Entity::find()
        .filter(driver_bid::Column::ScheduleId.eq(schedule_id))
        .filter(driver_bid::Column::Status.eq(BidStatus::Pending))
        .order_by_asc(driver_bid::Column::Id)
        .all(&state.db)
        .await?;

    let mut bids: Vec<BidView> = Vec::new();
    for row in rows {
        match bids.iter_mut().find(|b| b.driver_id == row.driver_id) {
            Some(view) => view.road_ids.push(row.road_id),
            None => {
                let driver_name = user::Entity::find_by_id(row.driver_id)
                    .one(&state.db)
                    .await?
                    .map(|u| format!("{} {}", u.name, u.surname))
                    .unwrap_or_default();
                bids.push(BidView {
                    driver_id: row.driver_id,
                    driver_name,
                    road_ids: vec![row.road_id],
                    created_at: row.created_at,
                });
            }
        }
    }

    Ok(Json(ScheduleResponsesResponse { status: true, bids }))
}

#[derive(Debug, Deserialize)]
pub struct AnswerBidRequest {
    pub schedule_id: i32,
    pub driver_id: i32,
    pub accept: bool,
}

/// Accept or decline a driver's bid. Acceptance assigns the driver to
/// every road and seeds the weekly payment subscription.
pub async fn answer_schedule_responses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AnswerBidRequest>,
) -> AppResult<Json<StatusResponse>> {
    let schedule_row = owned_schedule(&state, claims.sub, payload.schedule_id).await?;

    if !payload.accept {
        return decline_bid(&state, schedule_row, payload.driver_id).await;
    }

    let balance = ledger::balance(&state.db, claims.sub).await?;
    if balance < state.config.min_schedule_balance {
        return Err(AppError::InsufficientBalance {
            balance,
            required: state.config.min_schedule_balance,
        });
    }

    let roads = active_roads(&state, schedule_row.id).await?;
    let weekly_amount: Decimal = roads.iter().map(|r| r.amount).sum();

    let txn = state.db.begin().await?;

    // First committed acceptance wins; a lost race sees no pending bids.
    let bids = driver_bid::Entity::find()
        .filter(driver_bid::Column::ScheduleId.eq(schedule_row.id))
        .filter(driver_bid::Column::DriverId.eq(payload.driver_id))
        .filter(driver_bid::Column::Status.eq(BidStatus::Pending))
        .all(&txn)
        .await?;
    if bids.is_empty() {
        return Err(AppError::NotFound("Заявка не найдена".to_string()));
    }

    for bid in &bids {
        road_driver::ActiveModel {
            road_id: Set(bid.road_id),
            driver_id: Set(payload.driver_id),
            is_repeat: Set(false),
            active: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    let bid_ids: Vec<i32> = bids.iter().map(|b| b.id).collect();
    driver_bid::Entity::update_many()
        .col_expr(
            driver_bid::Column::Status,
            sea_orm::sea_query::Expr::value(BidStatus::Accepted),
        )
        .filter(driver_bid::Column::Id.is_in(bid_ids))
        .exec(&txn)
        .await?;

    // Losing drivers are collected before their bids flip to declined.
    let declined_rows = driver_bid::Entity::find()
        .filter(driver_bid::Column::ScheduleId.eq(schedule_row.id))
        .filter(driver_bid::Column::Status.eq(BidStatus::Pending))
        .all(&txn)
        .await?;
    let declined_drivers: BTreeSet<i32> = declined_rows.iter().map(|b| b.driver_id).collect();

    driver_bid::Entity::update_many()
        .col_expr(
            driver_bid::Column::Status,
            sea_orm::sea_query::Expr::value(BidStatus::Declined),
        )
        .filter(driver_bid::Column::ScheduleId.eq(schedule_row.id))
        .filter(driver_bid::Column::Status.eq(BidStatus::Pending))
        .exec(&txn)
        .await?;

    let next_payment = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(7))
        .unwrap_or_else(|| Utc::now().date_naive());
    weekly_payment_schedule::ActiveModel {
        user_id: Set(claims.sub),
        schedule_id: Set(schedule_row.id),
        amount: Set(weekly_amount),
        card_id: Set(None),
        next_payment_date: Set(next_payment),
        last_payment_date: Set(None),
        status: Set(WeeklyPaymentStatus::Active),
        failed_attempts: Set(0),
        last_error: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let schedule_id = schedule_row.id;
    let mut active: schedule::ActiveModel = schedule_row.into();
    active.status = Set(ScheduleStatus::Active);
    active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        schedule_id,
        driver_id = payload.driver_id,
        parent_id = claims.sub,
        %weekly_amount,
        "bid accepted"
    );

    notify::notify_user(
        &state,
        payload.driver_id,
        "Отклик принят",
        "Родитель выбрал вас для поездок по расписанию",
        serde_json::json!({ "action": "bid_accepted", "schedule_id": schedule_id }),
    )
    .await?;
    for driver_id in declined_drivers {
        notify::notify_user(
            &state,
            driver_id,
            "Отклик отклонён",
            "Родитель выбрал другого водителя",
            serde_json::json!({ "action": "bid_declined", "schedule_id": schedule_id }),
        )
        .await?;
    }

    Ok(Json(StatusResponse {
        status: true,
        message: "Водитель назначен".to_string(),
    }))
}

async fn decline_bid(
    state: &AppState,
    schedule_row: schedule::Model,
    driver_id: i32,
) -> AppResult<Json<StatusResponse>> {
    let updated = driver_bid::Entity::update_many()
        .col_expr(
            driver_bid::Column::Status,
            sea_orm::sea_query::Expr::value(BidStatus::Declined),
        )
        .filter(driver_bid::Column::ScheduleId.eq(schedule_row.id))
        .filter(driver_bid::Column::DriverId.eq(driver_id))
        .filter(driver_bid::Column::Status.eq(BidStatus::Pending))
        .exec(&state.db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(AppError::NotFound("Заявка не найдена".to_string()));
    }

    notify::notify_user(
        state,
        driver_id,
        "Отклик отклонён",
        "Родитель выбрал другого водителя",
        serde_json::json!({ "action": "bid_declined", "schedule_id": schedule_row.id }),
    )
    .await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Заявка отклонена".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_cover_passes() {
        assert_eq!(full_program_diff(&[1, 2, 3], &[3, 2, 1]), None);
    }

    #[test]
    fn subset_reports_missing() {
        let (missing, extra) = full_program_diff(&[1, 2, 3], &[1, 2]).unwrap();
        assert_eq!(missing, vec![3]);
        assert!(extra.is_empty());
    }

    #[test]
    fn superset_reports_extra() {
        let (missing, extra) = full_program_diff(&[1, 2], &[1, 2, 9]).unwrap();
        assert!(missing.is_empty());
        assert_eq!(extra, vec![9]);
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(full_program_diff(&[1, 2], &[1, 1, 2, 2]), None);
    }

    #[test]
    fn any_prior_bid_blocks_rebidding() {
        assert!(may_bid(None));
        assert!(!may_bid(Some(BidStatus::Pending)));
        assert!(!may_bid(Some(BidStatus::Accepted)));
        assert!(!may_bid(Some(BidStatus::Declined)));
    }
}
