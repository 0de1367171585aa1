use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::AppError;
use crate::models::{NewUser, User};

/// ユーザーの永続化
///
/// email / username の一意性は書き込み時に保証し、
/// 違反は `EmailAlreadyExists` / `UsernameAlreadyExists` として返す。
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError>;

    /// リセットチケットを保存（既存のチケットは上書き）
    async fn store_reset_ticket(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError>;

    /// チケットを消費してパスワードを更新
    ///
    /// パスワード更新とチケット削除は単一の書き込みで行う。
    /// 一致する有効なチケットがなければ `None`。
    async fn consume_reset_ticket(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, AppError>;

    /// 期限切れチケットを削除
    ///
    /// # Returns
    /// 更新された行数
    async fn purge_expired_reset_tickets(&self, now: OffsetDateTime) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, full_name, password_hash, is_active,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, full_name, password_hash, is_active,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, full_name, password_hash, is_active,
                   reset_token_hash, reset_token_expires_at, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, full_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, username, full_name, password_hash, is_active,
                      reset_token_hash, reset_token_expires_at, created_at, updated_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // UNIQUE制約違反チェック
            if let sqlx::Error::Database(db_err) = &e {
                match db_err.constraint() {
                    Some("users_email_key") => return AppError::EmailAlreadyExists,
                    Some("users_username_key") => return AppError::UsernameAlreadyExists,
                    _ => {}
                }
            }
            AppError::Database(e)
        })
    }

    async fn store_reset_ticket(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_reset_ticket(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, AppError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE reset_token_hash = $1
              AND reset_token_expires_at > $3
            RETURNING id
            "#,
        )
        .bind(token_hash)
        .bind(new_password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn purge_expired_reset_tickets(&self, now: OffsetDateTime) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = NULL, reset_token_expires_at = NULL
            WHERE reset_token_expires_at IS NOT NULL
              AND reset_token_expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
