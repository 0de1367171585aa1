use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use crate::config::{Config, DEFAULT_PASSWORD_RESET_URL_BASE, ResetTicketDelivery};
use crate::error::AppError;
use crate::repositories::UserRepository;
use crate::services::EmailService;
use crate::services::auth::CredentialHasher;

/// リセットリクエストの結果
///
/// `ticket` はチケットを発行し、かつ受け渡し方法が `Response` の場合のみ `Some`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequestOutcome {
    pub ticket: Option<String>,
    pub expires_in: i64,
}

/// パスワードリセットサービス
///
/// 状態遷移: チケットなし → 発行済み → 消費済み（または期限切れ）
#[derive(Clone)]
pub struct PasswordResetService {
    user_repo: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
    email_service: EmailService,
    config: Arc<Config>,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        hasher: CredentialHasher,
        email_service: EmailService,
        config: Arc<Config>,
    ) -> Self {
        Self {
            user_repo,
            hasher,
            email_service,
            config,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Security
    /// - ユーザーが存在しない場合も成功を返す（チケットは発行しない）
    /// - 既存のチケットは上書きされ、以前の平文チケットは無効になる
    /// - `Response` 受け渡しはデモ用途のみ（平文チケットがレスポンスに含まれる）
    /// - メール送信失敗はログのみ。応答はユーザー不在時と同一
    pub async fn request_reset(&self, email: &str) -> Result<ResetRequestOutcome, AppError> {
        let expires_in = self.config.password_reset_token_ttl_secs;

        let Some(user) = self.user_repo.find_by_email(email).await? else {
            tracing::info!("パスワードリセット: ユーザー不在（成功レスポンス返却）");
            return Ok(ResetRequestOutcome {
                ticket: None,
                expires_in,
            });
        };

        // 32バイトランダムトークン生成
        let token = generate_token();

        // SHA256ハッシュのみ保存
        let token_hash = hash_token(&token);
        let expires_at = OffsetDateTime::now_utc()
            .checked_add(Duration::seconds(expires_in))
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("reset ticket expiry out of range"))
            })?;
        self.user_repo
            .store_reset_ticket(user.id, &token_hash, expires_at)
            .await?;

        tracing::info!(user_id = %user.id, delivery = ?self.config.reset_ticket_delivery, "リセットチケット発行");

        match self.config.reset_ticket_delivery {
            ResetTicketDelivery::Response => Ok(ResetRequestOutcome {
                ticket: Some(token),
                expires_in,
            }),
            ResetTicketDelivery::Email => {
                let reset_url = self.build_reset_url(&token);
                if let Err(e) = self
                    .email_service
                    .send_password_reset_email(&user.email, &reset_url)
                    .await
                {
                    tracing::error!(user_id = %user.id, error = ?e, "パスワードリセットメール送信に失敗");
                }
                Ok(ResetRequestOutcome {
                    ticket: None,
                    expires_in,
                })
            }
        }
    }

    /// パスワードをリセット
    ///
    /// パスワード更新とチケット削除は単一の書き込みで行う（部分適用は観測されない）。
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<i64, AppError> {
        let token_hash = hash_token(token);
        let password_hash = self.hasher.hash_password(new_password)?;

        let user_id = self
            .user_repo
            .consume_reset_ticket(&token_hash, &password_hash, OffsetDateTime::now_utc())
            .await?
            .ok_or_else(|| {
                tracing::warn!("無効・使用済み・期限切れのリセットチケット");
                AppError::InvalidOrExpiredTicket
            })?;

        tracing::info!(user_id = %user_id, "パスワードリセット完了");
        Ok(user_id)
    }

    /// 期限切れチケットを削除
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let purged = self
            .user_repo
            .purge_expired_reset_tickets(OffsetDateTime::now_utc())
            .await?;
        if purged > 0 {
            tracing::info!(purged = purged, "期限切れリセットチケットを削除");
        }
        Ok(purged)
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        let base = self
            .config
            .password_reset_url_base
            .as_deref()
            .unwrap_or(DEFAULT_PASSWORD_RESET_URL_BASE);
        format!("{}?token={}", base, token)
    }
}

/// 期限切れチケットの定期削除タスクを起動
pub fn spawn_expired_ticket_sweeper(
    service: PasswordResetService,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = service.purge_expired().await {
                tracing::error!(error = ?e, "期限切れリセットチケットの削除に失敗");
            }
        }
    })
}

/// 32バイトのランダムトークンを生成
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// トークンをSHA256でハッシュ化
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
