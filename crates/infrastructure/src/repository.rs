//! PostgreSQL 存储适配器。
//!
//! 对同一会话的并发更新在这里串行化：追加消息/参与者先用
//! `UPDATE chats` 拿到会话行锁，再写关联表；`chat_messages.seq`
//! 是全局单调序列，读取按 `seq` 排序，因此并发追加的相对顺序
//! 就是各自插入提交的顺序。

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use application::{ChatRepository, MessageRepository, UserDirectory};
use domain::{
    Chat, ChatId, Message, MessageId, MessageKind, MessageText, RepositoryError, Timestamp, User,
    UserId, Username,
};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        Ok(User {
            id: UserId::from(value.id),
            username,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    text: String,
    sender_username: String,
    sent_at: Timestamp,
    kind: String,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let text = MessageText::new(value.text).map_err(|err| invalid_data(err.to_string()))?;
        let sender = Username::parse(value.sender_username)
            .map_err(|err| invalid_data(err.to_string()))?;
        let kind = MessageKind::parse(&value.kind).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Message {
            id: MessageId::from(value.id),
            text,
            sender_username: sender,
            sent_at: value.sent_at,
            kind,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: Uuid,
    created_at: Timestamp,
    updated_at: Timestamp,
}

/// 只读的用户目录。`users` 表由外部（账号系统）维护。
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username FROM users WHERE username = $1"#,
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record =
            sqlx::query_as::<_, UserRecord>(r#"SELECT id, username FROM users WHERE id = $1"#)
                .bind(Uuid::from(id))
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, text, sender_username, sent_at, kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, text, sender_username, sent_at, kind
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(message.text.as_str())
        .bind(message.sender_username.as_str())
        .bind(message.sent_at)
        .bind(message.kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"SELECT id, text, sender_username, sent_at, kind FROM messages WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Message::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[MessageId]) -> Result<Vec<Message>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"SELECT id, text, sender_username, sent_at, kind FROM messages WHERE id = ANY($1)"#,
        )
        .bind(&raw)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_chat(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let record = sqlx::query_as::<_, ChatRecord>(
            r#"SELECT id, created_at, updated_at FROM chats WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let Some(record) = record else {
            return Ok(None);
        };

        let participants: Vec<Uuid> = sqlx::query_scalar(
            r#"SELECT user_id FROM chat_participants WHERE chat_id = $1 ORDER BY seq"#,
        )
        .bind(Uuid::from(id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let message_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"SELECT message_id FROM chat_messages WHERE chat_id = $1 ORDER BY seq"#,
        )
        .bind(Uuid::from(id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Some(Chat {
            id: ChatId::from(record.id),
            participants: participants.into_iter().map(UserId::from).collect(),
            message_ids: message_ids.into_iter().map(MessageId::from).collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }))
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_with_messages(
        &self,
        chat: Chat,
        messages: Vec<Message>,
    ) -> Result<Chat, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(r#"INSERT INTO chats (id, created_at, updated_at) VALUES ($1, $2, $3)"#)
            .bind(Uuid::from(chat.id))
            .bind(chat.created_at)
            .bind(chat.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        for user_id in &chat.participants {
            sqlx::query(r#"INSERT INTO chat_participants (chat_id, user_id) VALUES ($1, $2)"#)
                .bind(Uuid::from(chat.id))
                .bind(Uuid::from(*user_id))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
        }

        for message in &messages {
            sqlx::query(
                r#"INSERT INTO messages (id, text, sender_username, sent_at, kind) VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(Uuid::from(message.id))
            .bind(message.text.as_str())
            .bind(message.sender_username.as_str())
            .bind(message.sent_at)
            .bind(message.kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        // 按聚合中的顺序插入，seq 保持初始消息的相对顺序
        for message_id in &chat.message_ids {
            sqlx::query(r#"INSERT INTO chat_messages (chat_id, message_id) VALUES ($1, $2)"#)
                .bind(Uuid::from(chat.id))
                .bind(Uuid::from(*message_id))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;

        self.load_chat(chat.id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        self.load_chat(id).await
    }

    async fn append_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Chat, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        // 会话行锁把同一会话的并发追加串行化
        let touched = sqlx::query(r#"UPDATE chats SET updated_at = $2 WHERE id = $1"#)
            .bind(Uuid::from(chat_id))
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?
            .rows_affected();
        if touched == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(r#"INSERT INTO chat_messages (chat_id, message_id) VALUES ($1, $2)"#)
            .bind(Uuid::from(chat_id))
            .bind(Uuid::from(message_id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        self.load_chat(chat_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn add_participant(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<Chat, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let touched = sqlx::query(r#"UPDATE chats SET updated_at = $2 WHERE id = $1"#)
            .bind(Uuid::from(chat_id))
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?
            .rows_affected();
        if touched == 0 {
            return Err(RepositoryError::NotFound);
        }

        // 集合语义：重复加入不产生第二行
        sqlx::query(
            r#"
            INSERT INTO chat_participants (chat_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (chat_id, user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(chat_id))
        .bind(Uuid::from(user_id))
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        self.load_chat(chat_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_participants(
        &self,
        user_ids: &[UserId],
    ) -> Result<Vec<Chat>, RepositoryError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut raw: Vec<Uuid> = user_ids.iter().copied().map(Uuid::from).collect();
        raw.sort_unstable();
        raw.dedup();

        let chat_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT chat_id FROM chat_participants
            WHERE user_id = ANY($1)
            GROUP BY chat_id
            HAVING COUNT(DISTINCT user_id) = $2
            "#,
        )
        .bind(&raw)
        .bind(raw.len() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut chats = Vec::with_capacity(chat_ids.len());
        for chat_id in chat_ids {
            if let Some(chat) = self.load_chat(ChatId::from(chat_id)).await? {
                chats.push(chat);
            }
        }
        Ok(chats)
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
