use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::ValidJson;
use crate::models::User;
use crate::sanitize::deserialize_trimmed;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// ユーザー名
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[garde(length(min = 1))]
    pub username: String,
    /// パスワード
    #[garde(length(min = 1))]
    pub password: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

/// ログインハンドラー
///
/// POST /api/auth/login
///
/// 処理フロー:
/// 1. リクエストバリデーション（抽出器）
/// 2. ユーザー認証（ユーザー名で検索、パスワード照合）
/// 3. アクセストークン発行
pub async fn login(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    // 2. ユーザー認証
    let user = state
        .auth_service()
        .authenticate(&request.username, &request.password)
        .await?;

    // 3. アクセストークン発行
    let access_token = state
        .tokens
        .issue(user.id, &user.username, state.tokens.default_ttl())?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}
