use axum::{Json, extract::State, http::StatusCode};
use garde::Validate;
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::ValidJson;
use crate::models::{NewUser, User};
use crate::sanitize::{deserialize_email, deserialize_trimmed, sanitize_input};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(deserialize_with = "deserialize_email")]
    #[garde(email)]
    pub email: String,
    #[serde(deserialize_with = "deserialize_trimmed")]
    #[garde(length(chars, min = 3, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub username: String,
    #[garde(length(bytes, min = 8))]
    pub password: String, // SecretBox不要（Deserialize後すぐハッシュ化）
    #[serde(default)]
    #[garde(length(chars, max = 200))]
    pub full_name: Option<String>,
}

/// ユーザー登録ハンドラー
///
/// POST /api/auth/signup
///
/// # Security
/// - パスワードはログに出力しない
/// - パスワードは即座にハッシュ化
/// - メールアドレス・ユーザー名の重複は書き込み時の一意制約で検出（409）
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    // パスワードハッシュ化
    let password_hash = state.hasher.hash_password(&request.password)?;

    let full_name = request
        .full_name
        .as_deref()
        .map(sanitize_input)
        .filter(|name| !name.is_empty());

    // ユーザー作成
    let user = state
        .user_repo
        .create_user(&NewUser {
            email: request.email,
            username: request.username,
            full_name,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, username = %user.username, "ユーザー登録成功");

    Ok((StatusCode::CREATED, Json(user)))
}
