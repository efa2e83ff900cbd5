//! 领域模型错误定义
//!
//! 每个 Chat Service 操作都返回显式的错误值，不抛不可捕获的异常。

use thiserror::Error;

use crate::value_objects::{ChatId, MessageId, UserId};

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 创建会话时有参与者无法解析
    #[error("unknown participant: {username}")]
    UnknownParticipant { username: String },

    /// 消息发送者无法解析
    #[error("unknown sender: {username}")]
    UnknownSender { username: String },

    /// 用户ID无法解析为已存在的用户
    #[error("unknown user: {user_id}")]
    UnknownUser { user_id: UserId },

    /// 消息内容非法
    #[error("invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// 会话不存在
    #[error("chat not found: {chat_id}")]
    ChatNotFound { chat_id: ChatId },

    /// 消息不存在
    #[error("message not found: {message_id}")]
    MessageNotFound { message_id: MessageId },

    /// 参数验证错误
    #[error("invalid argument: {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    pub fn unknown_participant(username: impl Into<String>) -> Self {
        Self::UnknownParticipant {
            username: username.into(),
        }
    }

    pub fn unknown_sender(username: impl Into<String>) -> Self {
        Self::UnknownSender {
            username: username.into(),
        }
    }

    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储层错误，聚合为三类：未找到、冲突、底层存储失败。
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
