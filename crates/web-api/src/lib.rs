//! Web API 层：REST 路由、WebSocket 端点、错误映射。

pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
