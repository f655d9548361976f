use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::database::StoreError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("未授权访问")]
    Unauthorized,

    #[error("权限不足")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    #[error("上游响应格式错误: {0}")]
    UpstreamShape(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Forbidden => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
            ),
            AppError::UpstreamShape(_) => (StatusCode::BAD_GATEWAY, error_codes::INTERNAL_ERROR),
        };

        (status, error_to_api_response::<()>(code, self.to_string())).into_response()
    }
}
