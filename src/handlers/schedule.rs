use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{Datelike, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::entities::balance_history::BalanceTask;
use crate::entities::schedule::{self, ScheduleStatus};
use crate::entities::schedule_road::{self, TypeDrive};
use crate::entities::weekly_payment_schedule::{self, WeeklyPaymentStatus};
use crate::entities::{
    child, driver_bid, pricing_coefficients, road_address, road_child, road_contact, road_driver,
    schedule_other_parameter, tariff,
};
use crate::error::{AppError, AppResult};
use crate::gateways::GeoPoint;
use crate::ledger;
use crate::utils::jwt::Claims;
use crate::utils::phone;
use crate::utils::pricing::{self, Coefficients};

use super::auth::StatusResponse;

/// Riders across the whole program are capped by vehicle capacity.
pub const MAX_CHILDREN: usize = 4;

/// Roads starting sooner than this are cancelled only with a fee.
pub const CANCEL_WINDOW_MINUTES: i64 = 30;

const MINUTES_PER_WEEK: i64 = 7 * 24 * 60;

// ============ Pure helpers ============

/// ";"-joined weekday numbers, 0 = Monday.
pub fn encode_week_days(days: &[u8]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn parse_week_days(raw: &str) -> AppResult<Vec<u8>> {
    let days: Vec<u8> = raw
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| AppError::BadRequest("Некорректные дни недели".to_string()))?;

    if days.is_empty() || days.iter().any(|d| *d > 6) {
        return Err(AppError::BadRequest("Некорректные дни недели".to_string()));
    }
    Ok(days)
}

/// "HH:MM" → minutes since midnight.
pub fn parse_hhmm(raw: &str) -> Option<u32> {
    let (h, m) = raw.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Minutes until the road's next departure, folding across the week.
pub fn minutes_until_next(
    now_weekday: u8,
    now_minutes: u32,
    road_weekday: u8,
    road_start_minutes: u32,
) -> i64 {
    let now_abs = now_weekday as i64 * 24 * 60 + now_minutes as i64;
    let road_abs = road_weekday as i64 * 24 * 60 + road_start_minutes as i64;
    (road_abs - now_abs).rem_euclid(MINUTES_PER_WEEK)
}

/// Half the road price, floored to kopecks.
pub fn cancellation_fee(amount: Decimal) -> Decimal {
    (amount / Decimal::from(2)).round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

fn ensure_children_cap(total: usize) -> AppResult<()> {
    if total > MAX_CHILDREN {
        return Err(AppError::BadRequest(format!(
            "Не больше {} детей в расписании",
            MAX_CHILDREN
        )));
    }
    Ok(())
}

/// Active riders summed over every active road of the schedule, minus
/// the road being replaced if any. The cap applies to this total.
async fn schedule_children_total<C: ConnectionTrait>(
    conn: &C,
    schedule_id: i32,
    except_road: Option<i32>,
) -> AppResult<usize> {
    let mut roads = schedule_road::Entity::find()
        .filter(schedule_road::Column::ScheduleId.eq(schedule_id))
        .filter(schedule_road::Column::Active.eq(true));
    if let Some(road_id) = except_road {
        roads = roads.filter(schedule_road::Column::Id.ne(road_id));
    }
    let road_ids: Vec<i32> = roads.all(conn).await?.into_iter().map(|r| r.id).collect();
    if road_ids.is_empty() {
        return Ok(0);
    }

    let count = road_child::Entity::find()
        .filter(road_child::Column::RoadId.is_in(road_ids))
        .filter(road_child::Column::Active.eq(true))
        .count(conn)
        .await?;
    Ok(count as usize)
}

// ============ Shared lookups ============

async fn active_coefficients(state: &AppState) -> AppResult<Coefficients> {
    let row = pricing_coefficients::Entity::find()
        .filter(pricing_coefficients::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal("no active pricing coefficients".to_string()))?;
    // A row outside its bounds would silently misprice every road.
    pricing::validate_bounds(&row)
        .map_err(|e| AppError::Internal(format!("pricing coefficients out of bounds: {}", e)))?;
    Ok(Coefficients::from(&row))
}

async fn active_tariff(state: &AppState, tariff_id: i32) -> AppResult<tariff::Model> {
    tariff::Entity::find_by_id(tariff_id)
        .filter(tariff::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Тариф недоступен".to_string()))
}

pub(crate) async fn owned_schedule(
    state: &AppState,
    parent_id: i32,
    schedule_id: i32,
) -> AppResult<schedule::Model> {
    schedule::Entity::find_by_id(schedule_id)
        .filter(schedule::Column::ParentId.eq(parent_id))
        .filter(schedule::Column::Status.ne(ScheduleStatus::Deleted))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Расписание не найдено".to_string()))
}

pub(crate) async fn active_roads(
    state: &AppState,
    schedule_id: i32,
) -> AppResult<Vec<schedule_road::Model>> {
    let roads = schedule_road::Entity::find()
        .filter(schedule_road::Column::ScheduleId.eq(schedule_id))
        .filter(schedule_road::Column::Active.eq(true))
        .order_by_asc(schedule_road::Column::Id)
        .all(&state.db)
        .await?;
    Ok(roads)
}

// ============ Payload types ============

#[derive(Debug, Deserialize, Clone)]
pub struct AddressPayload {
    pub address_from: String,
    pub address_to: String,
    #[serde(default)]
    pub from_lat: f64,
    #[serde(default)]
    pub from_lon: f64,
    #[serde(default)]
    pub to_lat: f64,
    #[serde(default)]
    pub to_lon: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContactPayload {
    pub surname: String,
    pub name: String,
    pub patronymic: Option<String>,
    pub phone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoadPayload {
    pub week_day: u8,
    pub start_time: String,
    pub end_time: String,
    pub type_drive: TypeDrive,
    pub addresses: Vec<AddressPayload>,
    #[serde(default)]
    pub children: Vec<i32>,
    pub contact: Option<ContactPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub title: String,
    pub description: Option<String>,
    pub duration_days: i32,
    pub children_count: i32,
    pub tariff_id: i32,
    pub week_days: Vec<u8>,
    pub roads: Vec<RoadPayload>,
    #[serde(default)]
    pub other_parameters: Vec<OtherParameterPayload>,
}

#[derive(Debug, Deserialize)]
pub struct OtherParameterPayload {
    pub parameter_id: i32,
    pub count: i32,
}

#[derive(Debug, Serialize)]
pub struct RoadView {
    #[serde(flatten)]
    pub road: schedule_road::Model,
    pub addresses: Vec<road_address::Model>,
    pub children: Vec<i32>,
    pub contact: Option<road_contact::Model>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: schedule::Model,
    pub roads: Vec<RoadView>,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub status: bool,
    pub schedule: ScheduleView,
}

// ============ Road pricing ============

/// Address pair with resolved coordinates and route cache.
struct PricedLeg {
    payload: AddressPayload,
    from: GeoPoint,
    to: GeoPoint,
    distance_m: f64,
    duration_s: f64,
}

struct PricedRoad {
    payload: RoadPayload,
    legs: Vec<PricedLeg>,
    amount: Decimal,
}

/// Geocode missing coordinates, route every leg and compute the road
/// price. An unresolvable address keeps (0, 0) and prices as zero
/// distance; the stored address string stays authoritative.
async fn price_road(
    state: &AppState,
    road: RoadPayload,
    tariff_per_km: f64,
    coefficients: &Coefficients,
) -> AppResult<PricedRoad> {
    if road.week_day > 6 {
        return Err(AppError::BadRequest("Некорректный день недели".to_string()));
    }
    if parse_hhmm(&road.start_time).is_none() || parse_hhmm(&road.end_time).is_none() {
        return Err(AppError::BadRequest(
            "Время должно быть в формате ЧЧ:ММ".to_string(),
        ));
    }
    if road.addresses.is_empty() {
        return Err(AppError::BadRequest(
            "Маршрут должен содержать хотя бы один адрес".to_string(),
        ));
    }
    ensure_children_cap(road.children.len())?;

    let mut legs = Vec::with_capacity(road.addresses.len());
    for address in &road.addresses {
        let from = resolve_point(state, &address.address_from, address.from_lat, address.from_lon)
            .await;
        let to = resolve_point(state, &address.address_to, address.to_lat, address.to_lon).await;

        let estimate = if is_zero(from) || is_zero(to) {
            // Without coordinates the leg cannot be routed; the pickup
            // radius still gets billed.
            crate::gateways::RouteEstimate {
                distance_m: 0.0,
                duration_s: 0.0,
            }
        } else {
            state.geo.route(from, to).await?
        };

        legs.push(PricedLeg {
            payload: address.clone(),
            from,
            to,
            distance_m: estimate.distance_m,
            duration_s: estimate.duration_s,
        });
    }

    let leg_inputs: Vec<(f64, f64)> = legs.iter().map(|l| (l.distance_m, l.duration_s)).collect();
    let amount = pricing::road_amount(tariff_per_km, &leg_inputs, road.type_drive, coefficients);

    Ok(PricedRoad {
        payload: road,
        legs,
        amount,
    })
}

fn is_zero(p: GeoPoint) -> bool {
    p.lat == 0.0 && p.lon == 0.0
}

async fn resolve_point(state: &AppState, address: &str, lat: f64, lon: f64) -> GeoPoint {
    if lat != 0.0 || lon != 0.0 {
        return GeoPoint { lat, lon };
    }
    match state.geo.geocode(address).await {
        Ok(Some(point)) => point,
        Ok(None) => {
            tracing::warn!(address, "address did not geocode");
            GeoPoint { lat: 0.0, lon: 0.0 }
        }
        Err(e) => {
            tracing::warn!(address, error = %e, "geocoding failed");
            GeoPoint { lat: 0.0, lon: 0.0 }
        }
    }
}

async fn insert_priced_road(
    txn: &DatabaseTransaction,
    parent_id: i32,
    schedule_id: i32,
    priced: PricedRoad,
) -> AppResult<RoadView> {
    // Children must belong to the schedule's owner.
    for child_id in &priced.payload.children {
        child::Entity::find_by_id(*child_id)
            .filter(child::Column::ParentId.eq(parent_id))
            .filter(child::Column::Active.eq(true))
            .one(txn)
            .await?
            .ok_or_else(|| AppError::BadRequest("Ребёнок не найден".to_string()))?;
    }

    let road = schedule_road::ActiveModel {
        schedule_id: Set(schedule_id),
        week_day: Set(priced.payload.week_day as i16),
        start_time: Set(priced.payload.start_time.clone()),
        end_time: Set(priced.payload.end_time.clone()),
        type_drive: Set(priced.payload.type_drive),
        amount: Set(priced.amount),
        active: Set(true),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let mut addresses = Vec::with_capacity(priced.legs.len());
    for leg in priced.legs {
        let row = road_address::ActiveModel {
            road_id: Set(road.id),
            address_from: Set(leg.payload.address_from),
            address_to: Set(leg.payload.address_to),
            from_lat: Set(leg.from.lat),
            from_lon: Set(leg.from.lon),
            to_lat: Set(leg.to.lat),
            to_lon: Set(leg.to.lon),
            distance_m: Set(Some(leg.distance_m as i32)),
            duration_s: Set(Some(leg.duration_s as i32)),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        addresses.push(row);
    }

    for child_id in &priced.payload.children {
        road_child::ActiveModel {
            road_id: Set(road.id),
            child_id: Set(*child_id),
            active: Set(true),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    let contact = match priced.payload.contact {
        Some(contact) => {
            let canonical = phone::normalize(&contact.phone)
                .ok_or_else(|| AppError::BadRequest("Некорректный номер телефона".to_string()))?;
            Some(
                road_contact::ActiveModel {
                    road_id: Set(road.id),
                    surname: Set(contact.surname),
                    name: Set(contact.name),
                    patronymic: Set(contact.patronymic),
                    phone: Set(canonical),
                    active: Set(true),
                    ..Default::default()
                }
                .insert(txn)
                .await?,
            )
        }
        None => None,
    };

    Ok(RoadView {
        children: priced.payload.children,
        road,
        addresses,
        contact,
    })
}

// ============ Handlers ============

/// Create a trip program with its roads, priced up front
pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateScheduleRequest>,
) -> AppResult<Json<ScheduleResponse>> {
    let balance = ledger::balance(&state.db, claims.sub).await?;
    if balance < state.config.min_schedule_balance {
        return Err(AppError::InsufficientBalance {
            balance,
            required: state.config.min_schedule_balance,
        });
    }

    if payload.children_count < 1 || payload.children_count as usize > MAX_CHILDREN {
        return Err(AppError::BadRequest(format!(
            "Количество детей должно быть от 1 до {}",
            MAX_CHILDREN
        )));
    }
    if payload.roads.is_empty() {
        return Err(AppError::BadRequest(
            "Расписание должно содержать хотя бы один маршрут".to_string(),
        ));
    }
    ensure_children_cap(payload.roads.iter().map(|r| r.children.len()).sum())?;
    let week_days = encode_week_days(&payload.week_days);
    parse_week_days(&week_days)?;

    let tariff_row = active_tariff(&state, payload.tariff_id).await?;
    let coefficients = active_coefficients(&state).await?;
    let per_km = tariff_row
        .cost_per_km
        .to_f64()
        .ok_or_else(|| AppError::Internal("tariff rate out of range".to_string()))?;

    // Geocoding and routing happen before the transaction opens.
    let mut priced_roads = Vec::with_capacity(payload.roads.len());
    for road in payload.roads {
        priced_roads.push(price_road(&state, road, per_km, &coefficients).await?);
    }

    let txn = state.db.begin().await?;

    let created = schedule::ActiveModel {
        parent_id: Set(claims.sub),
        title: Set(payload.title),
        description: Set(payload.description),
        duration_days: Set(payload.duration_days),
        children_count: Set(payload.children_count),
        tariff_id: Set(tariff_row.id),
        week_days: Set(week_days),
        status: Set(ScheduleStatus::Pending),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut roads = Vec::with_capacity(priced_roads.len());
    let mut total = Decimal::ZERO;
    for priced in priced_roads {
        total += priced.amount;
        roads.push(insert_priced_road(&txn, claims.sub, created.id, priced).await?);
    }

    for parameter in payload.other_parameters {
        schedule_other_parameter::ActiveModel {
            schedule_id: Set(created.id),
            parameter_id: Set(parameter.parameter_id),
            count: Set(parameter.count),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    tracing::info!(schedule_id = created.id, parent_id = claims.sub, %total, "schedule created");

    Ok(Json(ScheduleResponse {
        status: true,
        schedule: ScheduleView {
            schedule: created,
            roads,
            total_amount: total,
        },
    }))
}

pub(crate) async fn load_schedule_view(
    state: &AppState,
    schedule_row: schedule::Model,
) -> AppResult<ScheduleView> {
    let roads = active_roads(state, schedule_row.id).await?;

    let mut views = Vec::with_capacity(roads.len());
    let mut total = Decimal::ZERO;
    for road in roads {
        let addresses = road_address::Entity::find()
            .filter(road_address::Column::RoadId.eq(road.id))
            .order_by_asc(road_address::Column::Id)
            .all(&state.db)
            .await?;
        let children = road_child::Entity::find()
            .filter(road_child::Column::RoadId.eq(road.id))
            .filter(road_child::Column::Active.eq(true))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|c| c.child_id)
            .collect();
        let contact = road_contact::Entity::find()
            .filter(road_contact::Column::RoadId.eq(road.id))
            .filter(road_contact::Column::Active.eq(true))
            .one(&state.db)
            .await?;

        total += road.amount;
        views.push(RoadView {
            road,
            addresses,
            children,
            contact,
        });
    }

    Ok(ScheduleView {
        schedule: schedule_row,
        roads: views,
        total_amount: total,
    })
}

#[derive(Debug, Serialize)]
pub struct SchedulesResponse {
    pub status: bool,
    pub schedules: Vec<ScheduleView>,
}

/// Parent's trip programs
pub async fn list_schedules(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<SchedulesResponse>> {
    let rows = schedule::Entity::find()
        .filter(schedule::Column::ParentId.eq(claims.sub))
        .filter(schedule::Column::Status.ne(ScheduleStatus::Deleted))
        .order_by_desc(schedule::Column::Id)
        .all(&state.db)
        .await?;

    let mut schedules = Vec::with_capacity(rows.len());
    for row in rows {
        schedules.push(load_schedule_view(&state, row).await?);
    }

    Ok(Json(SchedulesResponse {
        status: true,
        schedules,
    }))
}

/// One trip program with roads and prices
pub async fn get_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<i32>,
) -> AppResult<Json<ScheduleResponse>> {
    let row = owned_schedule(&state, claims.sub, schedule_id).await?;
    let view = load_schedule_view(&state, row).await?;

    Ok(Json(ScheduleResponse {
        status: true,
        schedule: view,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_days: Option<i32>,
    pub children_count: Option<i32>,
    pub tariff_id: Option<i32>,
    pub week_days: Option<Vec<u8>>,
}

/// Partial update; only supplied fields change
pub async fn update_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<i32>,
    Json(payload): Json<UpdateScheduleRequest>,
) -> AppResult<Json<ScheduleResponse>> {
    let row = owned_schedule(&state, claims.sub, schedule_id).await?;

    let mut active: schedule::ActiveModel = row.into();
    if let Some(title) = payload.title {
        active.title = Set(title);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(duration_days) = payload.duration_days {
        active.duration_days = Set(duration_days);
    }
    if let Some(children_count) = payload.children_count {
        if children_count < 1 || children_count as usize > MAX_CHILDREN {
            return Err(AppError::BadRequest(format!(
                "Количество детей должно быть от 1 до {}",
                MAX_CHILDREN
            )));
        }
        active.children_count = Set(children_count);
    }
    if let Some(tariff_id) = payload.tariff_id {
        active_tariff(&state, tariff_id).await?;
        active.tariff_id = Set(tariff_id);
    }
    if let Some(week_days) = payload.week_days {
        let encoded = encode_week_days(&week_days);
        parse_week_days(&encoded)?;
        active.week_days = Set(encoded);
    }

    let updated = active.update(&state.db).await?;
    let view = load_schedule_view(&state, updated).await?;

    Ok(Json(ScheduleResponse {
        status: true,
        schedule: view,
    }))
}

/// Fee due if any road departs within the cancellation window.
fn imminent_cancellation_fee(roads: &[schedule_road::Model]) -> Option<Decimal> {
    let now = Utc::now();
    let now_weekday = now.weekday().num_days_from_monday() as u8;
    let now_minutes = now.hour() * 60 + now.minute();

    roads
        .iter()
        .filter_map(|road| {
            let start = parse_hhmm(&road.start_time)?;
            let until = minutes_until_next(now_weekday, now_minutes, road.week_day as u8, start);
            (until <= CANCEL_WINDOW_MINUTES).then(|| cancellation_fee(road.amount))
        })
        .max()
}

async fn deactivate_schedule_chain(
    txn: &DatabaseTransaction,
    schedule_row: schedule::Model,
    roads: &[schedule_road::Model],
) -> AppResult<()> {
    use sea_orm::sea_query::Expr;

    let schedule_id = schedule_row.id;
    let road_ids: Vec<i32> = roads.iter().map(|r| r.id).collect();

    let mut active: schedule::ActiveModel = schedule_row.into();
    active.status = Set(ScheduleStatus::Deleted);
    active.update(txn).await?;

    if !road_ids.is_empty() {
        schedule_road::Entity::update_many()
            .col_expr(schedule_road::Column::Active, Expr::value(false))
            .filter(schedule_road::Column::Id.is_in(road_ids.clone()))
            .exec(txn)
            .await?;
        road_driver::Entity::update_many()
            .col_expr(road_driver::Column::Active, Expr::value(false))
            .filter(road_driver::Column::RoadId.is_in(road_ids.clone()))
            .exec(txn)
            .await?;
        road_child::Entity::update_many()
            .col_expr(road_child::Column::Active, Expr::value(false))
            .filter(road_child::Column::RoadId.is_in(road_ids.clone()))
            .exec(txn)
            .await?;
        road_contact::Entity::update_many()
            .col_expr(road_contact::Column::Active, Expr::value(false))
            .filter(road_contact::Column::RoadId.is_in(road_ids))
            .exec(txn)
            .await?;
    }

    driver_bid::Entity::update_many()
        .col_expr(
            driver_bid::Column::Status,
            Expr::value(driver_bid::BidStatus::Declined),
        )
        .filter(driver_bid::Column::ScheduleId.eq(schedule_id))
        .filter(driver_bid::Column::Status.eq(driver_bid::BidStatus::Pending))
        .exec(txn)
        .await?;

    weekly_payment_schedule::Entity::update_many()
        .col_expr(
            weekly_payment_schedule::Column::Status,
            Expr::value(WeeklyPaymentStatus::Cancelled),
        )
        .filter(weekly_payment_schedule::Column::ScheduleId.eq(schedule_id))
        .filter(weekly_payment_schedule::Column::Status.eq(WeeklyPaymentStatus::Active))
        .exec(txn)
        .await?;

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CancellationFeeResponse {
    pub status: bool,
    pub message: String,
    pub cancellation_fee: Decimal,
}

/// Delete a trip program. Free when no road departs within 30 minutes;
/// otherwise answers 202 with the fee and the caller must confirm via
/// the cancel-with-debit endpoint.
pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<i32>,
) -> AppResult<Response> {
    let row = owned_schedule(&state, claims.sub, schedule_id).await?;
    let roads = active_roads(&state, schedule_id).await?;

    if let Some(fee) = imminent_cancellation_fee(&roads) {
        return Ok((
            StatusCode::ACCEPTED,
            Json(CancellationFeeResponse {
                status: false,
                message: "Поездка скоро начнётся, отмена платная".to_string(),
                cancellation_fee: fee,
            }),
        )
            .into_response());
    }

    let txn = state.db.begin().await?;
    deactivate_schedule_chain(&txn, row, &roads).await?;
    txn.commit().await?;

    tracing::info!(schedule_id, parent_id = claims.sub, "schedule deleted");

    Ok(Json(StatusResponse {
        status: true,
        message: "Расписание удалено".to_string(),
    })
    .into_response())
}

/// Confirm a paid cancellation: charge half the road price, then delete
pub async fn cancel_schedule_with_debit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<i32>,
) -> AppResult<Json<StatusResponse>> {
    let row = owned_schedule(&state, claims.sub, schedule_id).await?;
    let roads = active_roads(&state, schedule_id).await?;

    let txn = state.db.begin().await?;

    if let Some(fee) = imminent_cancellation_fee(&roads) {
        ledger::debit(
            &txn,
            claims.sub,
            BalanceTask::CancelPenalty,
            fee,
            format!("Отмена расписания #{}", schedule_id),
        )
        .await?;
    }
    deactivate_schedule_chain(&txn, row, &roads).await?;

    txn.commit().await?;

    tracing::info!(schedule_id, parent_id = claims.sub, "schedule cancelled with debit");

    Ok(Json(StatusResponse {
        status: true,
        message: "Расписание отменено".to_string(),
    }))
}

// ============ Road operations ============

#[derive(Debug, Serialize)]
pub struct RoadResponse {
    pub status: bool,
    pub road: RoadView,
}

/// Add a road to an existing program
pub async fn add_road(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(schedule_id): Path<i32>,
    Json(payload): Json<RoadPayload>,
) -> AppResult<Json<RoadResponse>> {
    let schedule_row = owned_schedule(&state, claims.sub, schedule_id).await?;

    let tariff_row = active_tariff(&state, schedule_row.tariff_id).await?;
    let coefficients = active_coefficients(&state).await?;
    let per_km = tariff_row
        .cost_per_km
        .to_f64()
        .ok_or_else(|| AppError::Internal("tariff rate out of range".to_string()))?;

    let priced = price_road(&state, payload, per_km, &coefficients).await?;

    let txn = state.db.begin().await?;
    let existing = schedule_children_total(&txn, schedule_id, None).await?;
    ensure_children_cap(existing + priced.payload.children.len())?;
    let view = insert_priced_road(&txn, claims.sub, schedule_id, priced).await?;
    txn.commit().await?;

    Ok(Json(RoadResponse {
        status: true,
        road: view,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoadRequest {
    pub road_id: i32,
    pub week_day: Option<u8>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub type_drive: Option<TypeDrive>,
    /// Full replacement of the address chain; triggers repricing.
    pub addresses: Option<Vec<AddressPayload>>,
    /// Full replacement of the rider set.
    pub children: Option<Vec<i32>>,
}

/// Update a road; the price is recomputed when addresses or the drive
/// type change
pub async fn update_road(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateRoadRequest>,
) -> AppResult<Json<RoadResponse>> {
    let road = schedule_road::Entity::find_by_id(payload.road_id)
        .filter(schedule_road::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Маршрут не найден".to_string()))?;
    let schedule_row = owned_schedule(&state, claims.sub, road.schedule_id).await?;

    let reprice = payload.addresses.is_some()
        || payload.type_drive.is_some_and(|t| t != road.type_drive);

    let new_type_drive = payload.type_drive.unwrap_or(road.type_drive);
    let addresses_payload: Vec<AddressPayload> = match &payload.addresses {
        Some(addresses) => addresses.clone(),
        None => road_address::Entity::find()
            .filter(road_address::Column::RoadId.eq(road.id))
            .order_by_asc(road_address::Column::Id)
            .all(&state.db)
            .await?
            .into_iter()
            .map(|a| AddressPayload {
                address_from: a.address_from,
                address_to: a.address_to,
                from_lat: a.from_lat,
                from_lon: a.from_lon,
                to_lat: a.to_lat,
                to_lon: a.to_lon,
            })
            .collect(),
    };

    if let Some(start) = &payload.start_time {
        parse_hhmm(start)
            .ok_or_else(|| AppError::BadRequest("Время должно быть в формате ЧЧ:ММ".to_string()))?;
    }
    if let Some(end) = &payload.end_time {
        parse_hhmm(end)
            .ok_or_else(|| AppError::BadRequest("Время должно быть в формате ЧЧ:ММ".to_string()))?;
    }

    let priced = if reprice {
        let tariff_row = active_tariff(&state, schedule_row.tariff_id).await?;
        let coefficients = active_coefficients(&state).await?;
        let per_km = tariff_row
            .cost_per_km
            .to_f64()
            .ok_or_else(|| AppError::Internal("tariff rate out of range".to_string()))?;
        Some(
            price_road(
                &state,
                RoadPayload {
                    week_day: payload.week_day.unwrap_or(road.week_day as u8),
                    start_time: payload.start_time.clone().unwrap_or_else(|| road.start_time.clone()),
                    end_time: payload.end_time.clone().unwrap_or_else(|| road.end_time.clone()),
                    type_drive: new_type_drive,
                    addresses: addresses_payload,
                    children: payload.children.clone().unwrap_or_default(),
                    contact: None,
                },
                per_km,
                &coefficients,
            )
            .await?,
        )
    } else {
        None
    };

    let txn = state.db.begin().await?;

    let road_id = road.id;
    if let Some(children) = &payload.children {
        let others = schedule_children_total(&txn, schedule_row.id, Some(road_id)).await?;
        ensure_children_cap(others + children.len())?;
    }
    let mut active: schedule_road::ActiveModel = road.into();
    if let Some(week_day) = payload.week_day {
        if week_day > 6 {
            return Err(AppError::BadRequest("Некорректный день недели".to_string()));
        }
        active.week_day = Set(week_day as i16);
    }
    if let Some(start) = payload.start_time {
        active.start_time = Set(start);
    }
    if let Some(end) = payload.end_time {
        active.end_time = Set(end);
    }
    active.type_drive = Set(new_type_drive);
    if let Some(priced) = &priced {
        active.amount = Set(priced.amount);
    }
    let updated = active.update(&txn).await?;

    if let Some(priced) = priced {
        road_address::Entity::delete_many()
            .filter(road_address::Column::RoadId.eq(road_id))
            .exec(&txn)
            .await?;
        for leg in priced.legs {
            road_address::ActiveModel {
                road_id: Set(road_id),
                address_from: Set(leg.payload.address_from),
                address_to: Set(leg.payload.address_to),
                from_lat: Set(leg.from.lat),
                from_lon: Set(leg.from.lon),
                to_lat: Set(leg.to.lat),
                to_lon: Set(leg.to.lon),
                distance_m: Set(Some(leg.distance_m as i32)),
                duration_s: Set(Some(leg.duration_s as i32)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    if let Some(children) = payload.children {
        use sea_orm::sea_query::Expr;
        road_child::Entity::update_many()
            .col_expr(road_child::Column::Active, Expr::value(false))
            .filter(road_child::Column::RoadId.eq(road_id))
            .exec(&txn)
            .await?;
        for child_id in children {
            child::Entity::find_by_id(child_id)
                .filter(child::Column::ParentId.eq(claims.sub))
                .filter(child::Column::Active.eq(true))
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::BadRequest("Ребёнок не найден".to_string()))?;
            road_child::ActiveModel {
                road_id: Set(road_id),
                child_id: Set(child_id),
                active: Set(true),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    let addresses = road_address::Entity::find()
        .filter(road_address::Column::RoadId.eq(road_id))
        .order_by_asc(road_address::Column::Id)
        .all(&state.db)
        .await?;
    let children = road_child::Entity::find()
        .filter(road_child::Column::RoadId.eq(road_id))
        .filter(road_child::Column::Active.eq(true))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| c.child_id)
        .collect();
    let contact = road_contact::Entity::find()
        .filter(road_contact::Column::RoadId.eq(road_id))
        .filter(road_contact::Column::Active.eq(true))
        .one(&state.db)
        .await?;

    Ok(Json(RoadResponse {
        status: true,
        road: RoadView {
            road: updated,
            addresses,
            children,
            contact,
        },
    }))
}

/// Remove a road from a program
pub async fn delete_road(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(road_id): Path<i32>,
) -> AppResult<Json<StatusResponse>> {
    use sea_orm::sea_query::Expr;

    let road = schedule_road::Entity::find_by_id(road_id)
        .filter(schedule_road::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Маршрут не найден".to_string()))?;
    owned_schedule(&state, claims.sub, road.schedule_id).await?;

    let txn = state.db.begin().await?;

    let mut active: schedule_road::ActiveModel = road.into();
    active.active = Set(false);
    active.update(&txn).await?;

    road_driver::Entity::update_many()
        .col_expr(road_driver::Column::Active, Expr::value(false))
        .filter(road_driver::Column::RoadId.eq(road_id))
        .exec(&txn)
        .await?;
    road_child::Entity::update_many()
        .col_expr(road_child::Column::Active, Expr::value(false))
        .filter(road_child::Column::RoadId.eq(road_id))
        .exec(&txn)
        .await?;
    road_contact::Entity::update_many()
        .col_expr(road_contact::Column::Active, Expr::value(false))
        .filter(road_contact::Column::RoadId.eq(road_id))
        .exec(&txn)
        .await?;
    driver_bid::Entity::update_many()
        .col_expr(
            driver_bid::Column::Status,
            Expr::value(driver_bid::BidStatus::Declined),
        )
        .filter(driver_bid::Column::RoadId.eq(road_id))
        .filter(driver_bid::Column::Status.eq(driver_bid::BidStatus::Pending))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Маршрут удалён".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn week_days_round_trip() {
        let encoded = encode_week_days(&[0, 2, 4]);
        assert_eq!(encoded, "0;2;4");
        assert_eq!(parse_week_days(&encoded).unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn week_days_reject_bad_input() {
        assert!(parse_week_days("").is_err());
        assert!(parse_week_days("7").is_err());
        assert!(parse_week_days("1;x").is_err());
    }

    #[test]
    fn hhmm_parsing() {
        assert_eq!(parse_hhmm("07:30"), Some(450));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("7:30"), None);
        assert_eq!(parse_hhmm("0730"), None);
    }

    #[test]
    fn next_occurrence_same_day_later() {
        // Monday 08:00 now, road Monday 08:20.
        assert_eq!(minutes_until_next(0, 480, 0, 500), 20);
    }

    #[test]
    fn next_occurrence_folds_across_week() {
        // Monday 08:00 now, road Monday 07:30 is next week.
        assert_eq!(minutes_until_next(0, 480, 0, 450), MINUTES_PER_WEEK - 30);
        // Sunday 23:50 now, road Monday 00:10.
        assert_eq!(minutes_until_next(6, 1430, 0, 10), 20);
    }

    #[test]
    fn cancellation_fee_halves_and_floors() {
        assert_eq!(cancellation_fee(dec!(2135.46)), dec!(1067.73));
        assert_eq!(cancellation_fee(dec!(100.01)), dec!(50.00));
        assert_eq!(cancellation_fee(dec!(0.01)), dec!(0.00));
    }

    #[test]
    fn children_cap_enforced() {
        assert!(ensure_children_cap(4).is_ok());
        assert!(ensure_children_cap(5).is_err());
    }

    #[test]
    fn children_cap_counts_the_whole_program() {
        // Two roads with three riders each stay under the per-road
        // limit but blow the program total.
        let per_road: [usize; 2] = [3, 3];
        assert!(ensure_children_cap(per_road.iter().sum()).is_err());
        assert!(ensure_children_cap(2 + 2).is_ok());
    }
}
