use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, MessageId, Timestamp, UserId};

/// 会话聚合：持有有序的消息引用列表和参与者集合。
///
/// 不变量：
/// - `participants` 无重复，保持加入顺序；
/// - `message_ids` 只追加，追加顺序即提交顺序，读取时不重排；
/// - 会话不提供删除操作，参与者只增不减。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub participants: Vec<UserId>,
    pub message_ids: Vec<MessageId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Chat {
    pub fn new(id: ChatId, participants: Vec<UserId>, created_at: Timestamp) -> Self {
        let mut chat = Self {
            id,
            participants: Vec::with_capacity(participants.len()),
            message_ids: Vec::new(),
            created_at,
            updated_at: created_at,
        };
        for participant in participants {
            chat.add_participant(participant, created_at);
        }
        chat
    }

    /// 追加参与者。重复加入是无副作用的空操作，返回是否实际加入。
    pub fn add_participant(&mut self, user_id: UserId, now: Timestamp) -> bool {
        if self.participants.contains(&user_id) {
            return false;
        }
        self.participants.push(user_id);
        self.updated_at = now;
        true
    }

    /// 在尾部追加一条消息引用。
    pub fn append_message(&mut self, message_id: MessageId, now: Timestamp) {
        self.message_ids.push(message_id);
        self.updated_at = now;
    }

    /// 给定的用户是否全部为该会话的参与者。
    pub fn has_all_participants(&self, user_ids: &[UserId]) -> bool {
        user_ids.iter().all(|id| self.participants.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn chat_with(participants: Vec<UserId>) -> Chat {
        Chat::new(ChatId::from(Uuid::new_v4()), participants, chrono::Utc::now())
    }

    #[test]
    fn duplicate_participants_are_collapsed_at_creation() {
        let user = UserId::from(Uuid::new_v4());
        let chat = chat_with(vec![user, user]);
        assert_eq!(chat.participants, vec![user]);
    }

    #[test]
    fn re_adding_participant_is_a_noop() {
        let user = UserId::from(Uuid::new_v4());
        let mut chat = chat_with(vec![user]);
        let before = chat.updated_at;

        assert!(!chat.add_participant(user, chrono::Utc::now()));
        assert_eq!(chat.participants.len(), 1);
        assert_eq!(chat.updated_at, before);
    }

    #[test]
    fn messages_keep_append_order() {
        let mut chat = chat_with(vec![UserId::from(Uuid::new_v4())]);
        let first = MessageId::from(Uuid::new_v4());
        let second = MessageId::from(Uuid::new_v4());

        chat.append_message(first, chrono::Utc::now());
        chat.append_message(second, chrono::Utc::now());

        assert_eq!(chat.message_ids, vec![first, second]);
    }

    #[test]
    fn superset_participant_match() {
        let alice = UserId::from(Uuid::new_v4());
        let bob = UserId::from(Uuid::new_v4());
        let carol = UserId::from(Uuid::new_v4());
        let chat = chat_with(vec![alice, bob]);

        assert!(chat.has_all_participants(&[alice]));
        assert!(chat.has_all_participants(&[alice, bob]));
        assert!(!chat.has_all_participants(&[alice, carol]));
    }
}
