use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    Chat, ChatEvent, ChatId, ChatView, DomainError, Message, MessageId, MessageText, MessageView,
    RepositoryError, Timestamp, User, UserId, Username,
};
use uuid::Uuid;

use crate::{
    broadcaster::{Channel, RoomBroadcaster},
    clock::Clock,
    error::ApplicationError,
    repository::{ChatRepository, MessageRepository, UserDirectory},
};

#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub text: String,
    pub sender_username: String,
    /// 省略时取服务端当前时间。
    pub sent_at: Option<Timestamp>,
}

#[derive(Debug, Clone)]
pub struct CreateChatRequest {
    pub participants: Vec<String>,
    pub initial_messages: Vec<CreateMessageRequest>,
}

pub struct ChatServiceDependencies {
    pub user_directory: Arc<dyn UserDirectory>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
}

/// 聊天核心服务：创建会话、追加消息、追加参与者、按参与者查询。
///
/// 所有校验（用户名可解析、消息非空）都发生在任何写入之前；
/// 对同一会话的并发写入由存储层的原子更新串行化。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 创建会话。参与者和全部初始消息先整体校验，再一次性原子落盘：
    /// 任何一项失败时不产生会话，也不残留孤儿消息。
    pub async fn create_chat(
        &self,
        request: CreateChatRequest,
    ) -> Result<ChatView, ApplicationError> {
        if request.participants.is_empty() {
            return Err(DomainError::invalid_argument("participants", "cannot be empty").into());
        }

        let mut participant_ids = Vec::with_capacity(request.participants.len());
        for raw in &request.participants {
            let user = self.resolve_participant(raw).await?;
            participant_ids.push(user.id);
        }

        // 先全部校验、组装，后提交
        let mut staged = Vec::with_capacity(request.initial_messages.len());
        for message_request in &request.initial_messages {
            staged.push(self.stage_message(message_request).await?);
        }

        let now = self.deps.clock.now();
        let mut chat = Chat::new(ChatId::from(Uuid::new_v4()), participant_ids, now);
        for message in &staged {
            chat.append_message(message.id, now);
        }

        let stored = self
            .deps
            .chat_repository
            .create_with_messages(chat, staged)
            .await?;

        let view = self.enrich(&stored).await?;
        tracing::info!(
            chat_id = %view.id,
            participants = view.participants.len(),
            messages = view.messages.len(),
            "chat created"
        );

        for user_id in &view.participants {
            self.deps
                .broadcaster
                .broadcast(
                    Channel::User(*user_id),
                    ChatEvent::Created { chat: view.clone() },
                    None,
                )
                .await;
        }

        Ok(view)
    }

    /// 创建一条独立消息，不挂到任何会话上。
    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let message = self.stage_message(&request).await?;
        let stored = self.deps.message_repository.create(message).await?;
        Ok(stored)
    }

    /// 把已存在的消息追加到会话尾部并返回富化后的会话。
    pub async fn add_message_to_chat(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<ChatView, ApplicationError> {
        let message = self
            .deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound { message_id })?;

        self.require_chat(chat_id).await?;
        self.append_and_publish(chat_id, message.id).await
    }

    /// API 路径用的组合操作：先确认会话存在，再创建消息并追加。
    /// 会话不存在时不会留下未挂载的消息。
    pub async fn send_message_to_chat(
        &self,
        chat_id: ChatId,
        request: CreateMessageRequest,
    ) -> Result<ChatView, ApplicationError> {
        self.require_chat(chat_id).await?;
        let message = self.stage_message(&request).await?;
        let stored = self.deps.message_repository.create(message).await?;
        self.append_and_publish(chat_id, stored.id).await
    }

    pub async fn get_chat(&self, chat_id: ChatId) -> Result<ChatView, ApplicationError> {
        let chat = self.require_chat(chat_id).await?;
        self.enrich(&chat).await
    }

    /// 返回参与者集合包含全部给定用户的会话（超集匹配，不是精确匹配）。
    ///
    /// 调用方可以区分"没有匹配"和"存储失败"；对外接口是否把失败
    /// 折叠成空列表由调用方决定。
    pub async fn get_chats_by_participants(
        &self,
        usernames: &[String],
    ) -> Result<Vec<ChatView>, ApplicationError> {
        let mut user_ids = Vec::with_capacity(usernames.len());
        for raw in usernames {
            let Ok(username) = Username::parse(raw.as_str()) else {
                return Ok(Vec::new());
            };
            match self.deps.user_directory.find_by_username(&username).await? {
                Some(user) => user_ids.push(user.id),
                // 无法解析的用户不可能是任何会话的参与者
                None => return Ok(Vec::new()),
            }
        }

        let chats = self
            .deps
            .chat_repository
            .find_by_participants(&user_ids)
            .await?;

        let mut views = Vec::with_capacity(chats.len());
        for chat in &chats {
            views.push(self.enrich(chat).await?);
        }
        Ok(views)
    }

    /// 追加参与者。重复追加是无副作用的空操作（集合语义）。
    pub async fn add_participant_to_chat(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatView, ApplicationError> {
        let user = self
            .deps
            .user_directory
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UnknownUser { user_id })?;

        self.require_chat(chat_id).await?;

        let updated = self
            .deps
            .chat_repository
            .add_participant(chat_id, user.id)
            .await
            .map_err(|err| Self::map_chat_not_found(err, chat_id))?;

        tracing::info!(chat_id = %chat_id, user_id = %user_id, "participant added");
        self.enrich(&updated).await
    }

    async fn append_and_publish(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<ChatView, ApplicationError> {
        let updated = self
            .deps
            .chat_repository
            .append_message(chat_id, message_id)
            .await
            .map_err(|err| Self::map_chat_not_found(err, chat_id))?;

        let view = self.enrich(&updated).await?;
        self.deps
            .broadcaster
            .broadcast(
                Channel::Chat(chat_id),
                ChatEvent::NewMessage { chat: view.clone() },
                None,
            )
            .await;

        Ok(view)
    }

    /// 校验并组装一条消息，不落盘。发送者必须当下可解析。
    async fn stage_message(
        &self,
        request: &CreateMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let text = MessageText::new(request.text.clone())?;
        let username = Username::parse(request.sender_username.as_str())?;

        self.deps
            .user_directory
            .find_by_username(&username)
            .await?
            .ok_or_else(|| DomainError::unknown_sender(username.as_str()))?;

        let sent_at = request.sent_at.unwrap_or_else(|| self.deps.clock.now());
        Ok(Message::new(
            MessageId::from(Uuid::new_v4()),
            text,
            username,
            sent_at,
        ))
    }

    async fn resolve_participant(&self, raw: &str) -> Result<User, ApplicationError> {
        let username = Username::parse(raw)
            .map_err(|_| DomainError::invalid_argument("participants", "contains empty username"))?;
        self.deps
            .user_directory
            .find_by_username(&username)
            .await?
            .ok_or_else(|| DomainError::unknown_participant(raw).into())
    }

    async fn require_chat(&self, chat_id: ChatId) -> Result<Chat, ApplicationError> {
        self.deps
            .chat_repository
            .find_by_id(chat_id)
            .await?
            .ok_or_else(|| DomainError::ChatNotFound { chat_id }.into())
    }

    fn map_chat_not_found(err: RepositoryError, chat_id: ChatId) -> ApplicationError {
        match err {
            RepositoryError::NotFound => DomainError::ChatNotFound { chat_id }.into(),
            other => other.into(),
        }
    }

    /// 读取时富化：消息顺序保持聚合中的追加顺序，
    /// 发送者解析失败只降级为 `user: None`，不让读取失败。
    async fn enrich(&self, chat: &Chat) -> Result<ChatView, ApplicationError> {
        let messages = self
            .deps
            .message_repository
            .find_by_ids(&chat.message_ids)
            .await?;
        let by_id: HashMap<MessageId, Message> =
            messages.into_iter().map(|m| (m.id, m)).collect();

        let mut sender_cache: HashMap<String, Option<User>> = HashMap::new();
        let mut views = Vec::with_capacity(chat.message_ids.len());
        for id in &chat.message_ids {
            let Some(message) = by_id.get(id) else {
                tracing::warn!(chat_id = %chat.id, message_id = %id, "chat references a missing message");
                continue;
            };

            let key = message.sender_username.as_str().to_owned();
            if !sender_cache.contains_key(&key) {
                let resolved = match self
                    .deps
                    .user_directory
                    .find_by_username(&message.sender_username)
                    .await
                {
                    Ok(user) => user,
                    Err(err) => {
                        tracing::warn!(
                            username = %message.sender_username,
                            error = %err,
                            "sender lookup failed during enrichment"
                        );
                        None
                    }
                };
                sender_cache.insert(key.clone(), resolved);
            }

            let sender = sender_cache.get(&key).and_then(Option::as_ref);
            views.push(MessageView::enrich(message, sender));
        }

        Ok(ChatView {
            id: chat.id,
            participants: chat.participants.clone(),
            messages: views,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        })
    }
}
