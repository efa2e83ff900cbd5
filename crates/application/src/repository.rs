use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use domain::{Chat, ChatId, Message, MessageId, RepositoryError, User, UserId, Username};

/// 用户目录。由外部系统维护，核心只做只读解析。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
}

/// 消息存储。消息创建后不可变。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError>;
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;
    /// 批量查找，用于读取时富化；结果顺序不保证。
    async fn find_by_ids(&self, ids: &[MessageId]) -> Result<Vec<Message>, RepositoryError>;
}

/// 会话存储。对同一会话的并发修改在这一层串行化：
/// 追加消息、追加参与者都是按会话ID的原子更新，
/// 不是基于过期快照的读改写。
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 原子创建：会话、参与者、全部初始消息一起提交，失败时什么都不落盘。
    async fn create_with_messages(
        &self,
        chat: Chat,
        messages: Vec<Message>,
    ) -> Result<Chat, RepositoryError>;

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;

    /// 在会话的消息序列尾部追加一条引用并返回更新后的会话。
    ///
    /// 并发追加都会保留，相对顺序是底层插入的提交顺序
    /// （后提交者排在后面），不按发送时间重排。
    async fn append_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Chat, RepositoryError>;

    /// 追加参与者，集合语义：重复追加等同一次。
    async fn add_participant(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Chat, RepositoryError>;

    /// 返回参与者集合是给定用户集合超集的全部会话。
    async fn find_by_participants(&self, user_ids: &[UserId])
        -> Result<Vec<Chat>, RepositoryError>;
}
