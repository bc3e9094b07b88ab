use axum::{
    Extension, Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use crate::chat::{self, OutgoingFrame};
use crate::entities::{chat as chat_entity, chat_notification, chat_participant, chat_participant_token, message, user};
use crate::error::{AppError, AppResult};
use crate::utils::jwt::Claims;

// ============ Socket credential ============

#[derive(Debug, Serialize)]
pub struct ConnectTokenResponse {
    pub status: bool,
    pub token: String,
}

/// Rotate the caller's socket credential. Any previous token stops
/// working immediately, which also tears down stale sessions on
/// reconnect.
pub async fn connect_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ConnectTokenResponse>> {
    chat_participant_token::Entity::delete_many()
        .filter(chat_participant_token::Column::UserId.eq(claims.sub))
        .exec(&state.db)
        .await?;

    let token = Uuid::new_v4().to_string();
    chat_participant_token::ActiveModel {
        user_id: Set(claims.sub),
        token: Set(token.clone()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(Json(ConnectTokenResponse {
        status: true,
        token,
    }))
}

// ============ Websocket session ============

pub async fn ws_connect(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let credential = chat_participant_token::Entity::find()
        .filter(chat_participant_token::Column::Token.eq(token))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Недействительный токен чата".to_string()))?;

    let user_id = credential.user_id;
    Ok(ws.on_upgrade(move |socket| socket_session(state, user_id, socket)))
}

async fn socket_session(state: AppState, user_id: i32, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<WsMessage>();
    let connection_id = state.sockets.register(user_id, tx);
    tracing::debug!(user_id, connection_id, "chat socket attached");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if let Err(e) = chat::handle_text_frame(&state, user_id, text.as_str()).await {
                    // Policy rejections go back over the same socket; the
                    // connection itself stays up.
                    tracing::warn!(user_id, error = %e, "chat frame rejected");
                    let reply = serde_json::json!({ "status": false, "message": e.to_string() });
                    state.sockets.send_to_user(user_id, &reply.to_string());
                }
            }
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.sockets.unregister(user_id, connection_id);
    writer.abort();
    tracing::debug!(user_id, connection_id, "chat socket detached");
}

// ============ REST surface ============

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub id: i32,
    pub active: bool,
    pub companion: Option<Companion>,
    pub unread: u64,
    pub last_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Companion {
    pub id: i32,
    pub surname: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ChatsResponse {
    pub status: bool,
    pub chats: Vec<ChatView>,
}

/// All chats the caller participates in, with unread counters
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ChatsResponse>> {
    let memberships = chat_participant::Entity::find()
        .filter(chat_participant::Column::UserId.eq(claims.sub))
        .all(&state.db)
        .await?;

    let mut chats = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let Some(chat_row) = chat_entity::Entity::find_by_id(membership.chat_id)
            .one(&state.db)
            .await?
        else {
            continue;
        };

        let companion = chat_participant::Entity::find()
            .filter(chat_participant::Column::ChatId.eq(chat_row.id))
            .filter(chat_participant::Column::UserId.ne(claims.sub))
            .one(&state.db)
            .await?;
        let companion = match companion {
            Some(p) => user::Entity::find_by_id(p.user_id)
                .one(&state.db)
                .await?
                .map(|u| Companion {
                    id: u.id,
                    surname: u.surname,
                    name: u.name,
                }),
            None => None,
        };

        let unread = chat_notification::Entity::find()
            .filter(chat_notification::Column::ChatId.eq(chat_row.id))
            .filter(chat_notification::Column::UserId.eq(claims.sub))
            .filter(chat_notification::Column::IsReaded.eq(false))
            .count(&state.db)
            .await?;

        let last_message = message::Entity::find()
            .filter(message::Column::ChatId.eq(chat_row.id))
            .order_by_desc(message::Column::Id)
            .one(&state.db)
            .await?
            .map(|m| chat::preview(&m.msg));

        chats.push(ChatView {
            id: chat_row.id,
            active: chat_row.active,
            companion,
            unread,
            last_message,
        });
    }

    Ok(Json(ChatsResponse {
        status: true,
        chats,
    }))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status: bool,
    pub messages: Vec<OutgoingFrame>,
}

/// Message history, oldest first. Opening the history clears the
/// caller's unread backlog for this chat. Closed chats stay readable.
pub async fn chat_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<i32>,
) -> AppResult<Json<HistoryResponse>> {
    chat_participant::Entity::find()
        .filter(chat_participant::Column::ChatId.eq(chat_id))
        .filter(chat_participant::Column::UserId.eq(claims.sub))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            AppError::Forbidden("Вы не являетесь участником этого чата".to_string())
        })?;

    let rows = message::Entity::find()
        .filter(message::Column::ChatId.eq(chat_id))
        .order_by_asc(message::Column::Id)
        .all(&state.db)
        .await?;

    chat_notification::Entity::update_many()
        .col_expr(
            chat_notification::Column::IsReaded,
            sea_orm::sea_query::Expr::value(true),
        )
        .filter(chat_notification::Column::ChatId.eq(chat_id))
        .filter(chat_notification::Column::UserId.eq(claims.sub))
        .filter(chat_notification::Column::IsReaded.eq(false))
        .exec(&state.db)
        .await?;

    let messages = rows
        .iter()
        .map(|row| OutgoingFrame::from_message(row, claims.sub, false))
        .collect();

    Ok(Json(HistoryResponse {
        status: true,
        messages,
    }))
}
