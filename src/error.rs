use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("認証されていません")]
    Unauthenticated,

    #[error("この操作を行う権限がありません")]
    Forbidden,

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),

    #[error("このメールアドレスは既に使用されています")]
    EmailAlreadyExists,

    #[error("このユーザー名は既に使用されています")]
    UsernameAlreadyExists,

    #[error("アイテムが見つかりません")]
    ItemNotFound,

    #[error("無効または期限切れのリセットトークンです")]
    InvalidOrExpiredTicket,
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        Self::Validation(report.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "ユーザー名またはパスワードが正しくありません".to_string(),
            ),
            Self::Unauthenticated => {
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "認証情報を検証できませんでした".to_string(),
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "この操作を行う権限がありません".to_string(),
            ),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "このメールアドレスは既に使用されています".to_string(),
            ),
            Self::UsernameAlreadyExists => (
                StatusCode::CONFLICT,
                "このユーザー名は既に使用されています".to_string(),
            ),
            Self::ItemNotFound => (
                StatusCode::NOT_FOUND,
                "アイテムが見つかりません".to_string(),
            ),
            Self::InvalidOrExpiredTicket => (
                StatusCode::BAD_REQUEST,
                "無効または期限切れのリセットトークンです".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
