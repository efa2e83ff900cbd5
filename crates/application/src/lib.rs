//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理领域规则校验、写入的原子边界、
//! 以及对外部适配器（用户目录、存储、房间广播）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod repository;
pub mod services;

pub use broadcaster::{Channel, RoomBroadcaster};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use repository::{ChatRepository, MessageRepository, UserDirectory};
pub use services::{
    ChatService, ChatServiceDependencies, CreateChatRequest, CreateMessageRequest,
};
