// ============ Notification bus ============
//
// Single funnel for user-facing notifications: persist an in-app row,
// then best-effort push to every active device. Push failures are
// logged and swallowed so business flows never roll back on delivery
// problems.

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::AppState;
use crate::entities::user::UserRole;
use crate::entities::{notification, push_token, user_role};
use crate::error::AppResult;
use crate::gateways::PushApp;

/// Persist a notification row and push it to the user's devices.
/// Returns the stored row; delivery problems do not fail the call.
pub async fn notify_user(
    state: &AppState,
    user_id: i32,
    title: &str,
    body: &str,
    data: serde_json::Value,
) -> AppResult<notification::Model> {
    let row = notification::ActiveModel {
        user_id: Set(user_id),
        title: Set(title.to_string()),
        description: Set(body.to_string()),
        is_readed: Set(false),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    push_to_user(state, user_id, title, body, data).await;

    Ok(row)
}

/// Best-effort push without an in-app row. Chat uses this for message
/// previews, which live in chat_notification instead.
pub async fn push_to_user(
    state: &AppState,
    user_id: i32,
    title: &str,
    body: &str,
    data: serde_json::Value,
) {
    let app = match target_app(state, user_id).await {
        Ok(app) => app,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "push skipped, role lookup failed");
            return;
        }
    };

    let tokens = match push_token::Entity::find()
        .filter(push_token::Column::UserId.eq(user_id))
        .filter(push_token::Column::Active.eq(true))
        .all(&state.db)
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "push skipped, token lookup failed");
            return;
        }
    };

    for token in tokens {
        if let Err(e) = state
            .push
            .send(app, &token.token, title, body, data.clone())
            .await
        {
            tracing::warn!(user_id, token_id = token.id, error = %e, "push delivery failed");
        }
    }
}

/// Drivers get the driver app, everyone else the client app.
async fn target_app(state: &AppState, user_id: i32) -> AppResult<PushApp> {
    let is_driver = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::Role.eq(UserRole::Driver))
        .one(&state.db)
        .await?
        .is_some();

    Ok(if is_driver { PushApp::Driver } else { PushApp::Client })
}
