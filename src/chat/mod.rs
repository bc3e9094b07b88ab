// ============ Chat pipeline ============
//
// Frames arrive over the participant websocket, go through moderation,
// are persisted, and fan out to every participant. Offline recipients
// get a push preview instead of a frame.

pub mod registry;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::entities::message::MsgType;
use crate::entities::{chat, chat_notification, chat_participant, message, user};
use crate::error::{AppError, AppResult};
use crate::notify;
use crate::utils::profanity;

/// Push preview length, characters.
const PREVIEW_CHARS: usize = 50;

/// Client frame. `id` present means an edit of an existing message.
#[derive(Debug, Deserialize)]
pub struct IncomingFrame {
    pub id: Option<i32>,
    pub id_chat: i32,
    pub msg: String,
    #[serde(rename = "msgType")]
    pub msg_type: i32,
}

/// Frame delivered to participants. `is_me` is computed per recipient.
#[derive(Debug, Serialize)]
pub struct OutgoingFrame {
    pub id: i32,
    pub id_chat: i32,
    pub id_sender: i32,
    pub msg: String,
    #[serde(rename = "msgType")]
    pub msg_type: i32,
    pub timestamp_send: i64,
    #[serde(rename = "isMe")]
    pub is_me: bool,
    pub edited: bool,
}

impl OutgoingFrame {
    pub fn from_message(row: &message::Model, recipient_id: i32, edited: bool) -> Self {
        Self {
            id: row.id,
            id_chat: row.chat_id,
            id_sender: row.sender_id,
            msg: row.msg.clone(),
            msg_type: row.msg_type as i32,
            timestamp_send: row.timestamp_send,
            is_me: row.sender_id == recipient_id,
            edited,
        }
    }
}

fn parse_msg_type(raw: i32) -> Option<MsgType> {
    match raw {
        1 => Some(MsgType::Text),
        2 => Some(MsgType::Image),
        3 => Some(MsgType::Video),
        4 => Some(MsgType::File),
        5 => Some(MsgType::TripToken),
        _ => None,
    }
}

/// First `PREVIEW_CHARS` characters, safe on multibyte text.
pub fn preview(msg: &str) -> String {
    msg.chars().take(PREVIEW_CHARS).collect()
}

/// Process one text frame from an authenticated socket. Malformed frames
/// are logged and dropped without tearing the connection down.
pub async fn handle_text_frame(state: &AppState, sender_id: i32, raw: &str) -> AppResult<()> {
    let frame: IncomingFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(sender_id, error = %e, "dropping malformed chat frame");
            return Ok(());
        }
    };

    let Some(msg_type) = parse_msg_type(frame.msg_type) else {
        tracing::warn!(sender_id, msg_type = frame.msg_type, "dropping frame with unknown type");
        return Ok(());
    };

    let participants = participants_of_active_chat(state, frame.id_chat).await?;
    if !participants.iter().any(|p| p.user_id == sender_id) {
        return Err(AppError::Forbidden(
            "Вы не являетесь участником этого чата".to_string(),
        ));
    }

    let (text, was_filtered) = if msg_type == MsgType::Text {
        profanity::filter(&frame.msg)
    } else {
        (frame.msg.clone(), false)
    };
    if was_filtered {
        tracing::info!(sender_id, chat_id = frame.id_chat, "chat message masked by moderation");
    }

    match frame.id {
        Some(message_id) => {
            edit_message(
                state,
                sender_id,
                frame.id_chat,
                message_id,
                text,
                msg_type,
                &participants,
            )
            .await
        }
        None => {
            create_message(state, sender_id, frame.id_chat, text, msg_type, &participants).await
        }
    }
}

async fn participants_of_active_chat(
    state: &AppState,
    chat_id: i32,
) -> AppResult<Vec<chat_participant::Model>> {
    let chat_row = chat::Entity::find_by_id(chat_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Чат не найден".to_string()))?;
    if !chat_row.active {
        return Err(AppError::Forbidden("Чат закрыт".to_string()));
    }

    let participants = chat_participant::Entity::find()
        .filter(chat_participant::Column::ChatId.eq(chat_id))
        .all(&state.db)
        .await?;
    Ok(participants)
}

async fn create_message(
    state: &AppState,
    sender_id: i32,
    chat_id: i32,
    text: String,
    msg_type: MsgType,
    participants: &[chat_participant::Model],
) -> AppResult<()> {
    let row = message::ActiveModel {
        chat_id: Set(chat_id),
        sender_id: Set(sender_id),
        msg: Set(text),
        msg_type: Set(msg_type),
        timestamp_send: Set(chrono::Utc::now().timestamp()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    // Reading happens implicitly: the sender sees the chat open, so their
    // own backlog in it is cleared on every send.
    chat_notification::Entity::update_many()
        .col_expr(
            chat_notification::Column::IsReaded,
            sea_orm::sea_query::Expr::value(true),
        )
        .filter(chat_notification::Column::ChatId.eq(chat_id))
        .filter(chat_notification::Column::UserId.eq(sender_id))
        .filter(chat_notification::Column::IsReaded.eq(false))
        .exec(&state.db)
        .await?;

    for participant in participants {
        if participant.user_id != sender_id {
            chat_notification::ActiveModel {
                chat_id: Set(chat_id),
                message_id: Set(row.id),
                user_id: Set(participant.user_id),
                is_readed: Set(false),
                ..Default::default()
            }
            .insert(&state.db)
            .await?;
        }
    }

    deliver(state, &row, participants, false).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn edit_message(
    state: &AppState,
    sender_id: i32,
    chat_id: i32,
    message_id: i32,
    text: String,
    msg_type: MsgType,
    participants: &[chat_participant::Model],
) -> AppResult<()> {
    let row = message::Entity::find_by_id(message_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Сообщение не найдено".to_string()))?;
    if row.sender_id != sender_id || row.chat_id != chat_id {
        return Err(AppError::Forbidden(
            "Можно редактировать только свои сообщения".to_string(),
        ));
    }

    // An edit replaces the content and the content kind together.
    let mut active: message::ActiveModel = row.into();
    active.msg = Set(text);
    active.msg_type = Set(msg_type);
    let row = active.update(&state.db).await?;

    deliver(state, &row, participants, true).await?;
    Ok(())
}

/// Fan a message out: websocket frame per participant, plus a push and
/// in-app preview for recipients of new messages even when their socket
/// is live.
async fn deliver(
    state: &AppState,
    row: &message::Model,
    participants: &[chat_participant::Model],
    edited: bool,
) -> AppResult<()> {
    let sender_name = user::Entity::find_by_id(row.sender_id)
        .one(&state.db)
        .await?
        .map(|u| format!("{} {}", u.name, u.surname))
        .unwrap_or_else(|| "Сообщение".to_string());

    for participant in participants {
        let frame = OutgoingFrame::from_message(row, participant.user_id, edited);
        let encoded = serde_json::to_string(&frame)
            .map_err(|e| AppError::Internal(format!("frame encode: {}", e)))?;

        state.sockets.send_to_user(participant.user_id, &encoded);
        if !edited && participant.user_id != row.sender_id {
            notify::notify_user(
                state,
                participant.user_id,
                &sender_name,
                &preview(&row.msg),
                serde_json::json!({ "action": "message", "id": row.chat_id }),
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_respects_char_boundaries() {
        let long = "Привет".repeat(20);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 50);
        assert!(long.starts_with(&p));
    }

    #[test]
    fn preview_keeps_short_messages() {
        assert_eq!(preview("Выезжаю"), "Выезжаю");
    }

    #[test]
    fn incoming_frame_field_names() {
        let frame: IncomingFrame =
            serde_json::from_str(r#"{"id_chat": 3, "msg": "привет", "msgType": 1}"#).unwrap();
        assert_eq!(frame.id, None);
        assert_eq!(frame.id_chat, 3);
        assert_eq!(frame.msg_type, 1);
    }

    #[test]
    fn outgoing_frame_field_names() {
        let row = message::Model {
            id: 10,
            chat_id: 3,
            sender_id: 5,
            msg: "привет".to_string(),
            msg_type: MsgType::Text,
            timestamp_send: 1_700_000_000,
        };
        let frame = OutgoingFrame::from_message(&row, 5, false);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["msgType"], 1);
        assert_eq!(json["isMe"], true);
        assert_eq!(json["id_chat"], 3);
        assert_eq!(json["timestamp_send"], 1_700_000_000);
    }

    #[test]
    fn unknown_msg_type_is_rejected() {
        assert_eq!(parse_msg_type(9), None);
        assert_eq!(parse_msg_type(5), Some(MsgType::TripToken));
    }

    #[test]
    fn edit_frame_replaces_content_kind() {
        // A text message edited into an image frame carries the new type.
        let frame: IncomingFrame =
            serde_json::from_str(r#"{"id": 10, "id_chat": 3, "msg": "photo.png", "msgType": 2}"#)
                .unwrap();
        assert_eq!(frame.id, Some(10));
        assert_eq!(parse_msg_type(frame.msg_type), Some(MsgType::Image));

        let row = message::Model {
            id: 10,
            chat_id: 3,
            sender_id: 5,
            msg: "photo.png".to_string(),
            msg_type: MsgType::Image,
            timestamp_send: 1_700_000_100,
        };
        let echoed = OutgoingFrame::from_message(&row, 5, true);
        let json = serde_json::to_value(&echoed).unwrap();
        assert_eq!(json["msgType"], 2);
        assert_eq!(json["edited"], true);
    }
}
