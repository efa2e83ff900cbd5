//! 实时事件
//!
//! 会话有更新时经 Room Broadcaster 推送给已订阅连接。
//! 投递是尽力而为的：掉线的客户端错过事件后，
//! 重连时通过 `get_chat` / 按参与者查询重新同步。

use serde::{Deserialize, Serialize};

use crate::views::ChatView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    /// 新会话创建，推送给每个参与者的个人频道。
    Created { chat: ChatView },
    /// 会话里追加了新消息，推送给会话房间。
    NewMessage { chat: ChatView },
}

impl ChatEvent {
    pub fn chat(&self) -> &ChatView {
        match self {
            ChatEvent::Created { chat } => chat,
            ChatEvent::NewMessage { chat } => chat,
        }
    }
}
