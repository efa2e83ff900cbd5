use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::DomainError;

        match error {
            // 校验类错误：请求本身不合法
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::InvalidMessage { reason }) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_MESSAGE", reason)
            }
            // 引用类错误：请求指向不存在的资源
            AppErr::Domain(DomainError::UnknownParticipant { username }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "UNKNOWN_PARTICIPANT",
                format!("unknown participant: {}", username),
            ),
            AppErr::Domain(DomainError::UnknownSender { username }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "UNKNOWN_SENDER",
                format!("unknown sender: {}", username),
            ),
            AppErr::Domain(DomainError::UnknownUser { user_id }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "UNKNOWN_USER",
                format!("unknown user: {}", user_id),
            ),
            AppErr::Domain(DomainError::ChatNotFound { chat_id }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "CHAT_NOT_FOUND",
                format!("chat not found: {}", chat_id),
            ),
            AppErr::Domain(DomainError::MessageNotFound { message_id }) => ApiError::new(
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                format!("message not found: {}", message_id),
            ),
            AppErr::Repository(repo_err) => match repo_err {
                domain::RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                domain::RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                }
                domain::RepositoryError::Storage { message } => ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    format!("database error: {}", message),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ChatId, DomainError, RepositoryError};
    use uuid::Uuid;

    #[test]
    fn validation_errors_map_to_400() {
        let err = ApiError::from(ApplicationError::Domain(DomainError::invalid_message(
            "text cannot be empty",
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_MESSAGE");
    }

    #[test]
    fn unknown_references_map_to_404() {
        let err = ApiError::from(ApplicationError::Domain(DomainError::unknown_sender(
            "ghost",
        )));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "UNKNOWN_SENDER");

        let err = ApiError::from(ApplicationError::Domain(DomainError::ChatNotFound {
            chat_id: ChatId::from(Uuid::new_v4()),
        }));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "CHAT_NOT_FOUND");
    }

    #[test]
    fn storage_failures_map_to_500() {
        let err = ApiError::from(ApplicationError::Repository(RepositoryError::storage(
            "connection refused",
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
