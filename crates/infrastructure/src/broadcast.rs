//! 进程内房间广播器
//!
//! 维护"频道 → 已订阅连接"的成员表，把会话更新事件投递给
//! 当前订阅的连接。实例在进程启动时创建一次，按引用传给
//! 需要它的组件，没有全局单例。
//!
//! 广播器本身不做授权：连接加入/离开房间与会话成员资格检查
//! 无关，授权属于 API 边界。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use application::{Channel, RoomBroadcaster};
use domain::{ChatEvent, ChatId, ConnectionId};

#[derive(Default)]
pub struct RoomRegistry {
    /// 连接出口：连接注册时交来的发送端
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ChatEvent>>>,
    /// 频道成员表
    rooms: RwLock<HashMap<Channel, HashSet<ConnectionId>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接的事件出口。连接建立时调用一次。
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<ChatEvent>,
    ) {
        self.senders.write().await.insert(connection_id, sender);
        debug!(connection_id = %connection_id, "connection registered");
    }

    /// 注销连接并把它从所有频道移除。
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        self.senders.write().await.remove(&connection_id);

        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
        debug!(connection_id = %connection_id, "connection removed from all rooms");
    }

    /// 订阅频道。重复加入与加入一次效果相同。
    pub async fn join(&self, connection_id: ConnectionId, channel: Channel) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(channel).or_default().insert(connection_id);
        debug!(connection_id = %connection_id, channel = %channel, "joined channel");
    }

    /// 退订会话房间。未订阅或会话ID缺失时是空操作。
    pub async fn leave_chat(&self, connection_id: ConnectionId, chat_id: Option<ChatId>) {
        let Some(chat_id) = chat_id else {
            return;
        };
        let channel = Channel::Chat(chat_id);

        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&channel) {
            members.remove(&connection_id);
            if members.is_empty() {
                rooms.remove(&channel);
            }
        }
        debug!(connection_id = %connection_id, channel = %channel, "left channel");
    }

    pub async fn member_count(&self, channel: Channel) -> usize {
        self.rooms
            .read()
            .await
            .get(&channel)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RoomBroadcaster for RoomRegistry {
    /// 尽力而为的投递：广播时取成员快照，逐个发送；
    /// 发送失败的连接视为已断开并剔除。不向调用方返回错误。
    async fn broadcast(&self, channel: Channel, event: ChatEvent, exclude: Option<ConnectionId>) {
        let members: Vec<ConnectionId> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&channel) {
                Some(members) => members.iter().copied().collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        {
            let senders = self.senders.read().await;
            for connection_id in members {
                if Some(connection_id) == exclude {
                    continue;
                }
                match senders.get(&connection_id) {
                    Some(sender) => {
                        if sender.send(event.clone()).is_err() {
                            dead.push(connection_id);
                        }
                    }
                    None => dead.push(connection_id),
                }
            }
        }

        for connection_id in dead {
            warn!(connection_id = %connection_id, channel = %channel, "pruning dead subscriber");
            self.disconnect(connection_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ChatView, UserId};
    use uuid::Uuid;

    fn test_event() -> ChatEvent {
        ChatEvent::NewMessage {
            chat: ChatView {
                id: ChatId::from(Uuid::new_v4()),
                participants: Vec::new(),
                messages: Vec::new(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
        }
    }

    async fn connect(registry: &RoomRegistry) -> (ConnectionId, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::generate();
        registry.register(id, tx).await;
        (id, rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_joined_connections_only() {
        let registry = RoomRegistry::new();
        let chat_id = ChatId::from(Uuid::new_v4());
        let channel = Channel::Chat(chat_id);

        let (first, mut first_rx) = connect(&registry).await;
        let (second, mut second_rx) = connect(&registry).await;
        let (_outsider, mut outsider_rx) = connect(&registry).await;

        registry.join(first, channel).await;
        registry.join(second, channel).await;

        let event = test_event();
        registry.broadcast(channel, event.clone(), None).await;

        assert_eq!(first_rx.try_recv().unwrap(), event);
        assert_eq!(second_rx.try_recv().unwrap(), event);
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let channel = Channel::Chat(ChatId::from(Uuid::new_v4()));

        let (conn, mut rx) = connect(&registry).await;
        registry.join(conn, channel).await;
        registry.join(conn, channel).await;

        assert_eq!(registry.member_count(channel).await, 1);

        registry.broadcast(channel, test_event(), None).await;
        assert!(rx.try_recv().is_ok());
        // 只投递一次
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_tolerates_missing_subscription_and_chat_id() {
        let registry = RoomRegistry::new();
        let chat_id = ChatId::from(Uuid::new_v4());
        let (conn, _rx) = connect(&registry).await;

        // 从未订阅，以及 chat_id 缺失，都不报错
        registry.leave_chat(conn, Some(chat_id)).await;
        registry.leave_chat(conn, None).await;

        let channel = Channel::Chat(chat_id);
        registry.join(conn, channel).await;
        registry.leave_chat(conn, Some(chat_id)).await;
        assert_eq!(registry.member_count(channel).await, 0);
    }

    #[tokio::test]
    async fn broadcast_can_exclude_originating_connection() {
        let registry = RoomRegistry::new();
        let channel = Channel::Chat(ChatId::from(Uuid::new_v4()));

        let (origin, mut origin_rx) = connect(&registry).await;
        let (other, mut other_rx) = connect(&registry).await;
        registry.join(origin, channel).await;
        registry.join(other, channel).await;

        registry.broadcast(channel, test_event(), Some(origin)).await;

        assert!(origin_rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dead_subscribers_are_pruned() {
        let registry = RoomRegistry::new();
        let channel = Channel::Chat(ChatId::from(Uuid::new_v4()));

        let (dead, dead_rx) = connect(&registry).await;
        let (alive, mut alive_rx) = connect(&registry).await;
        registry.join(dead, channel).await;
        registry.join(alive, channel).await;

        drop(dead_rx);
        registry.broadcast(channel, test_event(), None).await;

        assert!(alive_rx.try_recv().is_ok());
        assert_eq!(registry.member_count(channel).await, 1);
    }

    #[tokio::test]
    async fn disconnect_removes_connection_from_every_room() {
        let registry = RoomRegistry::new();
        let chat_channel = Channel::Chat(ChatId::from(Uuid::new_v4()));
        let user_channel = Channel::User(UserId::from(Uuid::new_v4()));

        let (conn, _rx) = connect(&registry).await;
        registry.join(conn, chat_channel).await;
        registry.join(conn, user_channel).await;

        registry.disconnect(conn).await;

        assert_eq!(registry.member_count(chat_channel).await, 0);
        assert_eq!(registry.member_count(user_channel).await, 0);
    }
}
