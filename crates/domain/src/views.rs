//! 读取时投影
//!
//! 跨 API 边界返回的会话永远是富化后的 `ChatView`，
//! 消息附带发送者快照；发送者无法解析时只降级为 `user: null`，
//! 不会让整个读取失败。

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageKind};
use crate::user::User;
use crate::value_objects::{ChatId, MessageId, Timestamp, UserId};

/// 消息发送者的展示快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderRef {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for SenderRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_owned(),
        }
    }
}

/// 富化后的消息：存储的消息加上读取时解析的发送者。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: MessageId,
    pub text: String,
    pub sender_username: String,
    pub sent_at: Timestamp,
    pub kind: MessageKind,
    pub user: Option<SenderRef>,
}

impl MessageView {
    pub fn enrich(message: &Message, user: Option<&User>) -> Self {
        Self {
            id: message.id,
            text: message.text.as_str().to_owned(),
            sender_username: message.sender_username.as_str().to_owned(),
            sent_at: message.sent_at,
            kind: message.kind,
            user: user.map(SenderRef::from),
        }
    }
}

/// 富化后的会话，消息顺序与聚合中的追加顺序一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: ChatId,
    pub participants: Vec<UserId>,
    pub messages: Vec<MessageView>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
