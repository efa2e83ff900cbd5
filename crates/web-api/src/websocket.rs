//! WebSocket 端点
//!
//! 连接建立后自动订阅本用户的个人频道（接收新会话的 created
//! 通知），之后由客户端通过 joinChat / leaveChat 帧管理会话
//! 房间订阅。认证在上游完成，这里信任查询串里的用户名，
//! 只负责把它解析成用户ID。

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use application::{ApplicationError, Channel};
use domain::{ChatEvent, ChatId, ConnectionId, User, Username};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    username: String,
}

/// 客户端发来的帧
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame {
    JoinChat {
        #[serde(rename = "chatId")]
        chat_id: Uuid,
    },
    LeaveChat {
        #[serde(rename = "chatId", default)]
        chat_id: Option<Uuid>,
    },
}

/// 推送给客户端的帧
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame {
    ChatUpdate { payload: ChatEvent },
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let username = Username::parse(query.username.as_str())
        .map_err(|_| ApiError::unauthorized("username required"))?;
    let user = state
        .user_directory
        .find_by_username(&username)
        .await
        .map_err(|err| ApiError::from(ApplicationError::Repository(err)))?
        .ok_or_else(|| ApiError::unauthorized("unknown username"))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let connection_id = ConnectionId::generate();
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatEvent>();

    state.registry.register(connection_id, tx).await;
    state
        .registry
        .join(connection_id, Channel::User(user.id))
        .await;
    tracing::info!(connection_id = %connection_id, user_id = %user.id, "websocket connected");

    let (mut sender, mut incoming) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = ServerFrame::ChatUpdate { payload: event };
            let payload = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize chat update");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let registry = state.registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::JoinChat { chat_id }) => {
                        registry
                            .join(connection_id, Channel::Chat(ChatId::from(chat_id)))
                            .await;
                    }
                    Ok(ClientFrame::LeaveChat { chat_id }) => {
                        registry
                            .leave_chat(connection_id, chat_id.map(ChatId::from))
                            .await;
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "ignoring malformed client frame");
                    }
                },
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.disconnect(connection_id).await;
    tracing::info!(connection_id = %connection_id, "websocket disconnected");
}
