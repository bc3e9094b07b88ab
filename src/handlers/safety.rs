use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::entities::order::{self, DrivingStatus};
use crate::entities::sos_event::{self, SosStatus};
use crate::entities::user::UserRole;
use crate::entities::{
    child, emergency_contact, meeting_code, road_child, schedule, schedule_road, user, user_role,
};
use crate::error::{AppError, AppResult};
use crate::notify;
use crate::utils::jwt::Claims;

use super::auth::StatusResponse;

// ============ SOS ============

#[derive(Debug, Deserialize)]
pub struct SosRequest {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub message: Option<String>,
    pub order_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SosResponse {
    pub status: bool,
    pub sos_event_id: i32,
    pub admin_notifications_sent: usize,
    pub emergency_notifications_sent: usize,
}

/// Composite alert text: who, where, which trip, and the user's words.
pub fn sos_body(
    activator: &str,
    activator_id: i32,
    order_id: Option<i32>,
    coords: Option<(f64, f64)>,
    message: Option<&str>,
) -> String {
    let mut body = format!("SOS! {} (id {})", activator, activator_id);
    if let Some(order_id) = order_id {
        body.push_str(&format!(", поездка #{}", order_id));
    }
    if let Some((lat, lon)) = coords {
        body.push_str(&format!(
            ". Координаты: {}, {}. https://maps.google.com/?q={},{}",
            lat, lon, lat, lon
        ));
    }
    if let Some(message) = message {
        if !message.trim().is_empty() {
            body.push_str(&format!(". Сообщение: {}", message.trim()));
        }
    }
    body
}

/// Raise an SOS: alert every admin and the riders' emergency contacts
pub async fn activate_sos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SosRequest>,
) -> AppResult<Json<SosResponse>> {
    let coords = match (payload.lat, payload.lon) {
        (Some(lat), Some(lon)) => Some((lat, lon)),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "Координаты передаются парой".to_string(),
            ));
        }
    };

    let activator = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Пользователь не найден".to_string()))?;

    let event = sos_event::ActiveModel {
        user_id: Set(claims.sub),
        order_id: Set(payload.order_id),
        lat: Set(payload.lat),
        lon: Set(payload.lon),
        message: Set(payload.message.clone()),
        status: Set(SosStatus::Active),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let body = sos_body(
        &format!("{} {}", activator.name, activator.surname),
        activator.id,
        payload.order_id,
        coords,
        payload.message.as_deref(),
    );

    tracing::warn!(sos_event_id = event.id, user_id = claims.sub, "SOS activated");

    // Leg 1: every admin, push plus in-app row.
    let admins = user_role::Entity::find()
        .filter(user_role::Column::Role.eq(UserRole::Admin))
        .all(&state.db)
        .await?;
    let mut admin_sent = 0;
    for admin in admins {
        match notify::notify_user(
            &state,
            admin.user_id,
            "SOS",
            &body,
            serde_json::json!({ "action": "sos", "sos_event_id": event.id }),
        )
        .await
        {
            Ok(_) => admin_sent += 1,
            Err(e) => {
                tracing::error!(admin_id = admin.user_id, error = %e, "SOS admin leg failed");
            }
        }
    }

    // Leg 2: emergency contacts of every child on the trip's road, by
    // ascending priority, over SMS.
    let mut contact_sent = 0;
    if let Some(order_id) = payload.order_id {
        for contact in contacts_for_order(&state, order_id).await? {
            match state.sms.send(&contact.phone, &body).await {
                Ok(()) => {
                    contact_sent += 1;
                    tracing::info!(
                        sos_event_id = event.id,
                        contact_id = contact.id,
                        "SOS contact notified"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        sos_event_id = event.id,
                        contact_id = contact.id,
                        error = %e,
                        "SOS contact leg failed"
                    );
                }
            }
        }
    }

    Ok(Json(SosResponse {
        status: true,
        sos_event_id: event.id,
        admin_notifications_sent: admin_sent,
        emergency_notifications_sent: contact_sent,
    }))
}

async fn contacts_for_order(
    state: &AppState,
    order_id: i32,
) -> AppResult<Vec<emergency_contact::Model>> {
    let Some(order_row) = order::Entity::find_by_id(order_id).one(&state.db).await? else {
        return Ok(Vec::new());
    };
    let Some(road_id) = order_row.schedule_road_id else {
        return Ok(Vec::new());
    };

    let child_ids: Vec<i32> = road_child::Entity::find()
        .filter(road_child::Column::RoadId.eq(road_id))
        .filter(road_child::Column::Active.eq(true))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| c.child_id)
        .collect();
    if child_ids.is_empty() {
        return Ok(Vec::new());
    }

    let contacts = emergency_contact::Entity::find()
        .filter(emergency_contact::Column::ChildId.is_in(child_ids))
        .filter(emergency_contact::Column::Active.eq(true))
        .order_by_asc(emergency_contact::Column::Priority)
        .all(&state.db)
        .await?;
    Ok(contacts)
}

#[derive(Debug, Deserialize)]
pub struct ResolveSosRequest {
    pub resolved: bool,
}

/// Close an SOS event (staff only)
pub async fn resolve_sos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(sos_event_id): Path<i32>,
    Json(payload): Json<ResolveSosRequest>,
) -> AppResult<Json<StatusResponse>> {
    let event = sos_event::Entity::find_by_id(sos_event_id)
        .filter(sos_event::Column::Status.eq(SosStatus::Active))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Событие не найдено".to_string()))?;

    let mut active: sos_event::ActiveModel = event.into();
    active.status = Set(if payload.resolved {
        SosStatus::Resolved
    } else {
        SosStatus::Cancelled
    });
    active.resolved_by = Set(Some(claims.sub));
    active.resolved_at = Set(Some(Utc::now().into()));
    active.update(&state.db).await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Событие закрыто".to_string(),
    }))
}

// ============ Meeting codes ============

#[derive(Debug, Deserialize)]
pub struct GenerateCodeRequest {
    pub schedule_road_id: i32,
}

#[derive(Debug, Serialize)]
pub struct GenerateCodeResponse {
    pub status: bool,
    pub code: i32,
    pub expires_at: chrono::DateTime<chrono::FixedOffset>,
}

/// Driver requests a fresh meeting code for a road; older codes for the
/// same road die immediately
pub async fn generate_meeting_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateCodeRequest>,
) -> AppResult<Json<GenerateCodeResponse>> {
    schedule_road::Entity::find_by_id(payload.schedule_road_id)
        .filter(schedule_road::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Маршрут не найден".to_string()))?;

    let code = rand::thread_rng().gen_range(1000..=9999);
    let now = Utc::now();
    let expires_at = now + Duration::hours(state.config.meeting_code_ttl_hours);

    let txn = state.db.begin().await?;

    meeting_code::Entity::update_many()
        .col_expr(
            meeting_code::Column::Active,
            sea_orm::sea_query::Expr::value(false),
        )
        .filter(meeting_code::Column::DriverId.eq(claims.sub))
        .filter(meeting_code::Column::ScheduleRoadId.eq(payload.schedule_road_id))
        .filter(meeting_code::Column::Active.eq(true))
        .exec(&txn)
        .await?;

    let row = meeting_code::ActiveModel {
        driver_id: Set(claims.sub),
        schedule_road_id: Set(payload.schedule_road_id),
        code: Set(code),
        issued_at: Set(now.into()),
        expires_at: Set(expires_at.into()),
        used: Set(false),
        active: Set(true),
        verified_by: Set(None),
        used_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(
        driver_id = claims.sub,
        road_id = payload.schedule_road_id,
        meeting_code_id = row.id,
        "meeting code issued"
    );

    Ok(Json(GenerateCodeResponse {
        status: true,
        code,
        expires_at: row.expires_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub schedule_road_id: i32,
    pub code: i32,
}

/// Parent checks the driver's 4-digit code at the meeting point
pub async fn verify_meeting_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<VerifyCodeRequest>,
) -> AppResult<Json<StatusResponse>> {
    let limiter_key = (claims.sub, payload.schedule_road_id);
    if state.verify_limiter.is_blocked(limiter_key) {
        return Err(AppError::Forbidden(
            "Слишком много неудачных попыток, подождите".to_string(),
        ));
    }

    // Only the schedule's owner may verify its roads.
    let road = schedule_road::Entity::find_by_id(payload.schedule_road_id)
        .filter(schedule_road::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Маршрут не найден".to_string()))?;
    schedule::Entity::find_by_id(road.schedule_id)
        .filter(schedule::Column::ParentId.eq(claims.sub))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Forbidden("Это не ваш маршрут".to_string()))?;

    let now = Utc::now();
    let live = meeting_code::Entity::find()
        .filter(meeting_code::Column::ScheduleRoadId.eq(payload.schedule_road_id))
        .filter(meeting_code::Column::Active.eq(true))
        .filter(meeting_code::Column::Used.eq(false))
        .filter(meeting_code::Column::ExpiresAt.gte(now))
        .order_by_desc(meeting_code::Column::Id)
        .one(&state.db)
        .await?;

    let Some(live) = live else {
        state.verify_limiter.register_failure(limiter_key);
        return Err(AppError::NotFound("Код не найден или истёк".to_string()));
    };

    if live.code != payload.code {
        state.verify_limiter.register_failure(limiter_key);
        return Err(AppError::BadRequest("Неверный код".to_string()));
    }

    let driver_id = live.driver_id;
    let mut active: meeting_code::ActiveModel = live.into();
    active.used = Set(true);
    active.verified_by = Set(Some(claims.sub));
    active.used_at = Set(Some(now.into()));
    active.update(&state.db).await?;

    state.verify_limiter.clear(limiter_key);

    tracing::info!(
        parent_id = claims.sub,
        driver_id,
        road_id = payload.schedule_road_id,
        "meeting code verified"
    );

    let data = serde_json::json!({ "action": "meeting_code_verified", "road_id": payload.schedule_road_id });
    notify::notify_user(
        &state,
        driver_id,
        "Код подтверждён",
        "Родитель подтвердил встречу",
        data.clone(),
    )
    .await?;
    notify::notify_user(
        &state,
        claims.sub,
        "Код подтверждён",
        "Встреча с водителем подтверждена",
        data,
    )
    .await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Код подтверждён".to_string(),
    }))
}

// ============ Trip status ============

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub order_id: i32,
    pub status_id: i32,
}

fn parse_driving_status(raw: i32) -> Option<DrivingStatus> {
    match raw {
        1 => Some(DrivingStatus::Created),
        2 => Some(DrivingStatus::EnRoute),
        3 => Some(DrivingStatus::Arrived),
        4 => Some(DrivingStatus::InTrip),
        5 => Some(DrivingStatus::Completed),
        6 => Some(DrivingStatus::Cancelled),
        7 => Some(DrivingStatus::Searching),
        8 => Some(DrivingStatus::Assigned),
        _ => None,
    }
}

/// Wording the parent sees for each trip milestone.
pub fn status_notification(status: DrivingStatus) -> Option<(&'static str, &'static str)> {
    match status {
        DrivingStatus::EnRoute => Some(("Водитель выехал", "Водитель уже в пути к вам")),
        DrivingStatus::Arrived => Some(("Водитель на месте", "Водитель ждёт у точки встречи")),
        DrivingStatus::InTrip => Some(("Поездка началась", "Ребёнок в машине, поездка началась")),
        DrivingStatus::Completed => Some(("Поездка завершена", "Ребёнок доставлен на место")),
        _ => None,
    }
}

/// Driver advances the trip status; the parent is notified on each
/// milestone
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<OrderStatusRequest>,
) -> AppResult<Json<StatusResponse>> {
    let status = parse_driving_status(payload.status_id)
        .ok_or_else(|| AppError::BadRequest("Неизвестный статус поездки".to_string()))?;

    let order_row = order::Entity::find_by_id(payload.order_id)
        .filter(order::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Поездка не найдена".to_string()))?;

    if order_row.driver_id != Some(claims.sub) {
        return Err(AppError::Forbidden(
            "Статус меняет только назначенный водитель".to_string(),
        ));
    }

    let parent_id = order_row.parent_id;
    let order_id = order_row.id;
    let completed = status == DrivingStatus::Completed || status == DrivingStatus::Cancelled;

    let mut active: order::ActiveModel = order_row.into();
    active.status_id = Set(status);
    if completed {
        active.active = Set(false);
    }
    active.update(&state.db).await?;

    if let Some((title, body)) = status_notification(status) {
        notify::notify_user(
            &state,
            parent_id,
            title,
            body,
            serde_json::json!({
                "action": "order_status",
                "order_id": order_id,
                "status_id": status as i32,
            }),
        )
        .await?;
    }

    Ok(Json(StatusResponse {
        status: true,
        message: "Статус обновлён".to_string(),
    }))
}

/// Children riding a road, driver view (names only)
#[derive(Debug, Serialize)]
pub struct RoadChildrenResponse {
    pub status: bool,
    pub children: Vec<RoadChildView>,
}

#[derive(Debug, Serialize)]
pub struct RoadChildView {
    pub id: i32,
    pub surname: String,
    pub name: String,
    pub school_class: Option<String>,
}

pub async fn road_children(
    State(state): State<AppState>,
    Path(road_id): Path<i32>,
) -> AppResult<Json<RoadChildrenResponse>> {
    let child_ids: Vec<i32> = road_child::Entity::find()
        .filter(road_child::Column::RoadId.eq(road_id))
        .filter(road_child::Column::Active.eq(true))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| c.child_id)
        .collect();

    let children = if child_ids.is_empty() {
        Vec::new()
    } else {
        child::Entity::find()
            .filter(child::Column::Id.is_in(child_ids))
            .filter(child::Column::Active.eq(true))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|c| RoadChildView {
                id: c.id,
                surname: c.surname,
                name: c.name,
                school_class: c.school_class,
            })
            .collect()
    };

    Ok(Json(RoadChildrenResponse {
        status: true,
        children,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sos_body_with_everything() {
        let body = sos_body(
            "Анна Иванова",
            12,
            Some(7),
            Some((55.75, 37.61)),
            Some("машина не та"),
        );
        assert!(body.starts_with("SOS! Анна Иванова (id 12)"));
        assert!(body.contains("поездка #7"));
        assert!(body.contains("https://maps.google.com/?q=55.75,37.61"));
        assert!(body.ends_with("Сообщение: машина не та"));
    }

    #[test]
    fn sos_body_minimal() {
        let body = sos_body("Пётр Сидоров", 3, None, None, None);
        assert_eq!(body, "SOS! Пётр Сидоров (id 3)");
    }

    #[test]
    fn sos_body_skips_blank_message() {
        let body = sos_body("А Б", 1, None, None, Some("   "));
        assert!(!body.contains("Сообщение"));
    }

    #[test]
    fn milestone_wording_only_for_trip_statuses() {
        assert!(status_notification(DrivingStatus::EnRoute).is_some());
        assert!(status_notification(DrivingStatus::Completed).is_some());
        assert!(status_notification(DrivingStatus::Created).is_none());
        assert!(status_notification(DrivingStatus::Cancelled).is_none());
    }
}
