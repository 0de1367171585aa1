use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// ユーザー（認証主体）
///
/// リセットチケットは平文を保存しない（SHA256ハッシュと有効期限のみ）
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    #[serde(skip)]
    pub reset_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// 有効なリセットチケットを保持しているか
    pub fn has_live_reset_ticket(&self, now: OffsetDateTime) -> bool {
        matches!(
            (&self.reset_token_hash, self.reset_token_expires_at),
            (Some(_), Some(expires_at)) if expires_at > now
        )
    }
}

/// ユーザー作成時の入力（ハッシュ化済み）
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: String,
}
