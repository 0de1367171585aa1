use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;

/// メール送信サービス
///
/// `email` フィーチャー有効かつ SMTP 設定がある場合は lettre で送信。
/// それ以外は開発用にログ出力のみ。
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// SMTP 設定が揃っているか
    pub fn smtp_configured(&self) -> bool {
        self.config.smtp_host.is_some() && self.config.smtp_from_address.is_some()
    }

    /// パスワードリセットメールを送信
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        reset_url: &str,
    ) -> Result<(), AppError> {
        #[cfg(feature = "email")]
        if let (Some(host), Some(from)) = (&self.config.smtp_host, &self.config.smtp_from_address)
        {
            self.send_via_smtp(host, from, to, reset_url).await?;
            tracing::info!(to = %to, "パスワードリセットメール送信完了");
            return Ok(());
        }

        // 開発モード: メール送信せずログ出力のみ
        tracing::info!(
            to = %to,
            smtp_configured = self.smtp_configured(),
            "パスワードリセットメール送信（開発モード）"
        );
        tracing::info!("リセットURL: {}", reset_url);

        Ok(())
    }

    #[cfg(feature = "email")]
    async fn send_via_smtp(
        &self,
        host: &str,
        from: &str,
        to: &str,
        reset_url: &str,
    ) -> Result<(), AppError> {
        use anyhow::Context;
        use lettre::message::Mailbox;
        use lettre::message::header::ContentType;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
        use secrecy::ExposeSecret;

        let message = Message::builder()
            .from(from.parse::<Mailbox>().context("送信元アドレスが不正")?)
            .to(to.parse::<Mailbox>().context("宛先アドレスが不正")?)
            .subject("パスワードリセットのご案内")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "以下のリンクからパスワードを再設定してください（有効期限 {} 秒）:\n\n{}\n",
                self.config.password_reset_token_ttl_secs, reset_url
            ))
            .context("メール本文の構築に失敗")?;

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .context("SMTP リレーの初期化に失敗")?
            .port(self.config.smtp_port);
        if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            transport = transport.credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ));
        }

        transport
            .build()
            .send(message)
            .await
            .context("SMTP 送信に失敗")?;

        Ok(())
    }
}
