use std::sync::Arc;

use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserRepository;
use crate::services::token::TokenService;

/// `Authorization` ヘッダーから Bearer トークンを取り出す
///
/// スキーム名は大文字小文字を区別しない
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let (scheme, token) = authorization?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// リクエストの実行主体を解決する
///
/// 処理フロー:
/// 1. Bearer トークン取り出し（なし・不正形式 → Unauthenticated）
/// 2. トークン検証（失敗 → Unauthenticated）
/// 3. 埋め込まれたIDでユーザー検索（不在・無効化 → Unauthenticated）
///
/// キャッシュはしない。毎リクエストでユーザー状態を読み直す。
#[derive(Clone)]
pub struct SessionResolver {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
}

impl SessionResolver {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self { user_repo, tokens }
    }

    pub async fn resolve(&self, authorization: Option<&str>) -> Result<User, AppError> {
        let token = bearer_token(authorization).ok_or(AppError::Unauthenticated)?;
        let subject = self.tokens.verify(token)?;

        match self.user_repo.find_by_id(subject.user_id).await? {
            Some(user) if user.is_active => Ok(user),
            Some(user) => {
                tracing::warn!(user_id = %user.id, "無効化されたユーザーのトークン");
                Err(AppError::Unauthenticated)
            }
            None => {
                tracing::warn!(user_id = %subject.user_id, "トークンのユーザーが存在しない");
                Err(AppError::Unauthenticated)
            }
        }
    }
}
