use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{MessageId, MessageText, Timestamp, Username};

/// 消息类别，当前只有点对点直发消息。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Direct,
}

impl MessageKind {
    /// 存储层使用的文本形式，与 JSON 表示一致。
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Direct => "direct",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "direct" => Ok(MessageKind::Direct),
            other => Err(DomainError::invalid_message(format!(
                "unknown message kind: {other}"
            ))),
        }
    }
}

/// 一条已持久化的消息。创建后不可变，归属于恰好一个会话。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: MessageText,
    pub sender_username: Username,
    pub sent_at: Timestamp,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(
        id: MessageId,
        text: MessageText,
        sender_username: Username,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id,
            text,
            sender_username,
            sent_at,
            kind: MessageKind::Direct,
        }
    }
}
