use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::AppState;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::jwt::{Claims, verify_token};

/// Extract and validate JWT token from Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = verify_token(auth.token(), &state.config.jwt_secret)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn claims_of(request: &Request) -> AppResult<&Claims> {
    request
        .extensions()
        .get::<Claims>()
        .ok_or_else(|| AppError::Unauthorized("Требуется авторизация".to_string()))
}

/// Require parent role
pub async fn require_parent(request: Request, next: Next) -> AppResult<Response> {
    let claims = claims_of(&request)?;
    if !claims.has_role(UserRole::Parent) {
        return Err(AppError::Forbidden(
            "Доступно только родителям".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Require driver role
pub async fn require_driver(request: Request, next: Next) -> AppResult<Response> {
    let claims = claims_of(&request)?;
    if !claims.has_role(UserRole::Driver) {
        return Err(AppError::Forbidden(
            "Доступно только водителям".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Require admin or operator role
pub async fn require_staff(request: Request, next: Next) -> AppResult<Response> {
    let claims = claims_of(&request)?;
    if !claims.has_role(UserRole::Admin) && !claims.has_role(UserRole::Operator) {
        return Err(AppError::Forbidden(
            "Доступно только сотрудникам".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Require admin role
pub async fn require_admin(request: Request, next: Next) -> AppResult<Response> {
    let claims = claims_of(&request)?;
    if !claims.has_role(UserRole::Admin) {
        return Err(AppError::Forbidden(
            "Доступно только администраторам".to_string(),
        ));
    }
    Ok(next.run(request).await)
}
