//! 基础设施层：PostgreSQL 存储适配器和进程内房间广播器。

pub mod broadcast;
pub mod repository;

pub use broadcast::RoomRegistry;
pub use repository::{
    create_pg_pool, PgChatRepository, PgMessageRepository, PgUserDirectory,
};
