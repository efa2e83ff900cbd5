//! 主应用程序入口
//!
//! 装配存储、聊天服务和房间广播器，启动 Axum Web API 服务。

use std::sync::Arc;

use application::{ChatService, ChatServiceDependencies, SystemClock};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, PgChatRepository, PgMessageRepository, PgUserDirectory, RoomRegistry,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app_config = AppConfig::from_env();
    tracing::info!(
        "连接数据库: {}",
        app_config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(
        &app_config.database.url,
        app_config.database.max_connections,
    )
    .await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let user_directory = Arc::new(PgUserDirectory::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool.clone()));
    let chat_repository = Arc::new(PgChatRepository::new(pg_pool));

    // 广播器整个进程只建一个实例，按引用传递
    let registry = Arc::new(RoomRegistry::new());

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        user_directory: user_directory.clone(),
        message_repository,
        chat_repository,
        clock: Arc::new(SystemClock),
        broadcaster: registry.clone(),
    }));

    let state = AppState::new(chat_service, registry, user_directory);

    let app = router(state);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("聊天服务启动在 http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
