use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::entities::user::{self, UserRole};
use crate::entities::{chat, chat_participant, chat_participant_token, notification, push_token, user_role};
use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::utils::jwt::{Claims, create_token};
use crate::utils::phone;
use crate::utils::profanity;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub password: String,
    pub surname: String,
    pub name: String,
    pub patronymic: Option<String>,
    pub email: Option<String>,
    /// "parent" (default) or "driver". Staff roles are assigned by admins.
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: bool,
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: i32,
    pub phone: String,
    pub surname: String,
    pub name: String,
    pub patronymic: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<UserRole>,
}

async fn roles_of(state: &AppState, user_id: i32) -> AppResult<Vec<UserRole>> {
    let roles = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|r| r.role)
        .collect();
    Ok(roles)
}

fn user_info(user: &user::Model, roles: Vec<UserRole>) -> UserInfo {
    UserInfo {
        id: user.id,
        phone: phone::display(&user.phone),
        surname: user.surname.clone(),
        name: user.name.clone(),
        patronymic: user.patronymic.clone(),
        email: user.email.clone(),
        roles,
    }
}

/// Register a parent or driver account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let canonical = phone::normalize(&payload.phone)
        .ok_or_else(|| AppError::BadRequest("Некорректный номер телефона".to_string()))?;

    let role = match payload.role {
        None | Some(UserRole::Parent) => UserRole::Parent,
        Some(UserRole::Driver) => UserRole::Driver,
        Some(_) => {
            return Err(AppError::Forbidden(
                "Эту роль нельзя выбрать при регистрации".to_string(),
            ));
        }
    };

    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Пароль должен быть не короче 6 символов".to_string(),
        ));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Phone.eq(&canonical))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "Пользователь с таким номером уже зарегистрирован".to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    let txn = state.db.begin().await?;

    let created = user::ActiveModel {
        phone: Set(canonical),
        password_hash: Set(password_hash),
        surname: Set(payload.surname.clone()),
        name: Set(payload.name.clone()),
        patronymic: Set(payload.patronymic.clone()),
        email: Set(payload.email.clone()),
        franchise_id: Set(Some(state.config.default_franchise_id)),
        active: Set(true),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    user_role::ActiveModel {
        user_id: Set(created.id),
        role: Set(role),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(user_id = created.id, role = ?role, "user registered");

    let roles = vec![role];
    let token = create_token(
        created.id,
        &created.phone,
        roles.clone(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    Ok(Json(AuthResponse {
        status: true,
        token,
        user: user_info(&created, roles),
    }))
}

/// Login with phone and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let canonical = phone::normalize(&payload.phone)
        .ok_or_else(|| AppError::Unauthorized("Неверный телефон или пароль".to_string()))?;

    let found = user::Entity::find()
        .filter(user::Column::Phone.eq(&canonical))
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Неверный телефон или пароль".to_string()))?;

    let parsed_hash = PasswordHash::new(&found.password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Неверный телефон или пароль".to_string()))?;

    let roles = roles_of(&state, found.id).await?;
    let token = create_token(
        found.id,
        &found.phone,
        roles.clone(),
        &state.config.jwt_secret,
        state.config.jwt_expiration_hours,
    )?;

    Ok(Json(AuthResponse {
        status: true,
        token,
        user: user_info(&found, roles),
    }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub status: bool,
    pub user: UserInfo,
    pub balance: rust_decimal::Decimal,
}

/// Current user's profile and balance
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<MeResponse>> {
    let found = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Пользователь не найден".to_string()))?;

    let roles = roles_of(&state, found.id).await?;
    let balance = ledger::balance(&state.db, found.id).await?;

    Ok(Json(MeResponse {
        status: true,
        user: user_info(&found, roles),
        balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub surname: Option<String>,
    pub name: Option<String>,
    pub patronymic: Option<String>,
    pub email: Option<String>,
}

/// Display names pass moderation: they end up in chats, pushes and the
/// driver's rider list.
fn moderated_name(raw: &str) -> AppResult<(String, bool)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Имя не может быть пустым".to_string()));
    }
    let (clean, was_filtered) = profanity::filter(trimmed);
    Ok((clean, was_filtered))
}

/// Update the current user's profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateMeRequest>,
) -> AppResult<Json<MeResponse>> {
    let found = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Пользователь не найден".to_string()))?;

    let mut masked = false;
    let mut active: user::ActiveModel = found.into();
    if let Some(surname) = &payload.surname {
        let (clean, was_filtered) = moderated_name(surname)?;
        masked |= was_filtered;
        active.surname = Set(clean);
    }
    if let Some(name) = &payload.name {
        let (clean, was_filtered) = moderated_name(name)?;
        masked |= was_filtered;
        active.name = Set(clean);
    }
    if let Some(patronymic) = &payload.patronymic {
        let (clean, was_filtered) = moderated_name(patronymic)?;
        masked |= was_filtered;
        active.patronymic = Set(Some(clean));
    }
    if let Some(email) = &payload.email {
        active.email = Set(Some(email.trim().to_string()));
    }
    let updated = active.update(&state.db).await?;

    if masked {
        tracing::info!(user_id = claims.sub, "profile name masked by moderation");
    }

    let roles = roles_of(&state, updated.id).await?;
    let balance = ledger::balance(&state.db, updated.id).await?;
    Ok(Json(MeResponse {
        status: true,
        user: user_info(&updated, roles),
        balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterPushTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

/// Register a device push token for the current user
pub async fn register_push_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RegisterPushTokenRequest>,
) -> AppResult<Json<StatusResponse>> {
    if payload.token.trim().is_empty() {
        return Err(AppError::BadRequest("Пустой токен устройства".to_string()));
    }

    let existing = push_token::Entity::find()
        .filter(push_token::Column::Token.eq(&payload.token))
        .one(&state.db)
        .await?;

    match existing {
        // A device changing hands moves its token to the new account.
        Some(row) if row.user_id != claims.sub || !row.active => {
            let mut active: push_token::ActiveModel = row.into();
            active.user_id = Set(claims.sub);
            active.active = Set(true);
            active.update(&state.db).await?;
        }
        Some(_) => {}
        None => {
            push_token::ActiveModel {
                user_id: Set(claims.sub),
                token: Set(payload.token.clone()),
                active: Set(true),
                ..Default::default()
            }
            .insert(&state.db)
            .await?;
        }
    }

    Ok(Json(StatusResponse {
        status: true,
        message: "Токен сохранён".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub status: bool,
    pub notifications: Vec<notification::Model>,
}

/// In-app notifications, newest first. Fetching marks them read.
pub async fn notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<NotificationsResponse>> {
    let rows = notification::Entity::find()
        .filter(notification::Column::UserId.eq(claims.sub))
        .order_by_desc(notification::Column::Id)
        .all(&state.db)
        .await?;

    notification::Entity::update_many()
        .col_expr(
            notification::Column::IsReaded,
            sea_orm::sea_query::Expr::value(true),
        )
        .filter(notification::Column::UserId.eq(claims.sub))
        .filter(notification::Column::IsReaded.eq(false))
        .exec(&state.db)
        .await?;

    Ok(Json(NotificationsResponse {
        status: true,
        notifications: rows,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateUserRequest {
    pub user_id: i32,
}

/// Deactivate an account (staff only). The phone gets a tombstone suffix
/// so the number can register again later.
pub async fn deactivate_user(
    State(state): State<AppState>,
    Json(payload): Json<DeactivateUserRequest>,
) -> AppResult<Json<StatusResponse>> {
    let found = user::Entity::find_by_id(payload.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Пользователь не найден".to_string()))?;

    if !found.active {
        return Ok(Json(StatusResponse {
            status: true,
            message: "Пользователь уже деактивирован".to_string(),
        }));
    }

    let txn = state.db.begin().await?;

    let user_id = found.id;
    let tombstoned = format!("{}#del{}", found.phone, found.id);
    let mut active: user::ActiveModel = found.into();
    active.active = Set(false);
    active.phone = Set(tombstoned);
    active.update(&txn).await?;

    push_token::Entity::update_many()
        .col_expr(
            push_token::Column::Active,
            sea_orm::sea_query::Expr::value(false),
        )
        .filter(push_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    // Live sockets die with their credentials.
    chat_participant_token::Entity::delete_many()
        .filter(chat_participant_token::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    // Chats with a deactivated side stay readable but closed for sending.
    let chat_ids: Vec<i32> = chat_participant::Entity::find()
        .filter(chat_participant::Column::UserId.eq(user_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| p.chat_id)
        .collect();
    if !chat_ids.is_empty() {
        chat::Entity::update_many()
            .col_expr(chat::Column::Active, sea_orm::sea_query::Expr::value(false))
            .filter(chat::Column::Id.is_in(chat_ids))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(user_id, "user deactivated");

    Ok(Json(StatusResponse {
        status: true,
        message: "Пользователь деактивирован".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_names_are_moderated() {
        let (clean, masked) = moderated_name("Сука Иванов").unwrap();
        assert_eq!(clean, "*** Иванов");
        assert!(masked);
    }

    #[test]
    fn ordinary_names_pass_unchanged() {
        let (clean, masked) = moderated_name("  Мария ").unwrap();
        assert_eq!(clean, "Мария");
        assert!(!masked);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(moderated_name("   ").is_err());
    }
}
