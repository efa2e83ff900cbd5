//! 聊天核心领域模型
//!
//! 包含消息、会话（Chat）两个核心实体，以及供展示层使用的
//! 读取时投影（enrichment）和实时事件定义。

pub mod chat;
pub mod errors;
pub mod events;
pub mod message;
pub mod user;
pub mod value_objects;
pub mod views;

pub use chat::Chat;
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use events::ChatEvent;
pub use message::{Message, MessageKind};
pub use user::User;
pub use value_objects::{
    ChatId, ConnectionId, MessageId, MessageText, Timestamp, UserId, Username,
};
pub use views::{ChatView, MessageView, SenderRef};
