use axum::Json;

use crate::extract::CurrentUser;
use crate::models::User;

/// 認証済みユーザー自身のプロフィール
///
/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
