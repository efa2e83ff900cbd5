use std::sync::Arc;

use application::{ChatService, UserDirectory};
use infrastructure::RoomRegistry;

/// 进程启动时装配一次；广播器以句柄传递，没有全局注册表。
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub registry: Arc<RoomRegistry>,
    pub user_directory: Arc<dyn UserDirectory>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        registry: Arc<RoomRegistry>,
        user_directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            chat_service,
            registry,
            user_directory,
        }
    }
}
