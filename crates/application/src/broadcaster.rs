use std::fmt;

use async_trait::async_trait;
use domain::{ChatEvent, ChatId, ConnectionId, UserId};

/// 广播目标频道。
///
/// 会话房间承载 `newMessage` 事件；个人频道承载新会话的
/// `created` 通知（连接建立时自动订阅自己的个人频道）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Chat(ChatId),
    User(UserId),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Chat(id) => write!(f, "chat:{id}"),
            Channel::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// 房间广播器：把会话更新事件投递给当前订阅该频道的连接。
///
/// 投递是尽力而为的，至少一次送达当前订阅者；失败只记录日志，
/// 永远不向调用方或连接暴露错误（无持久化投递保证，
/// 客户端重连后通过查询接口重新同步）。
#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    async fn broadcast(&self, channel: Channel, event: ChatEvent, exclude: Option<ConnectionId>);
}
