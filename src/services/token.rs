use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::config::Config;
use crate::error::AppError;

/// 署名アルゴリズム（固定）
const ALGORITHM: Algorithm = Algorithm::HS256;

/// セッショントークンのペイロード
///
/// クライアントはトークンを不透明な文字列として扱う。
/// `sub`（ユーザーID）, `username`, `exp` の3つは互換性のため維持すること。
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

/// 検証済みトークンから得られる主体情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("トークンの署名に失敗")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("無効なトークン")]
    Invalid,

    #[error("有効期限が表現可能な範囲外")]
    ExpiryOutOfRange,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::Unauthenticated,
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

/// セッショントークン（JWT / HS256）の発行・検証
///
/// 失効リストは持たない。トークンは有効期限まで有効で、
/// ログアウトはクライアント側での破棄のみ。
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], default_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            default_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.expose_secret().as_bytes(),
            Duration::minutes(config.access_token_expire_minutes),
        )
    }

    /// ログイン時に使う有効期間
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// トークンを発行（有効期限は `now + ttl`）
    pub fn issue(&self, user_id: i64, username: &str, ttl: Duration) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now
            .checked_add(ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
        };
        let token =
            encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(TokenError::Encode)?;
        tracing::debug!(user_id = %user_id, "トークン発行");
        Ok(token)
    }

    /// トークンを検証
    ///
    /// 署名不一致・ペイロード不正・期限切れはすべて `TokenError::Invalid`
    pub fn verify(&self, token: &str) -> Result<TokenSubject, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "トークン検証失敗");
            TokenError::Invalid
        })?;

        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Invalid)?;

        Ok(TokenSubject {
            user_id,
            username: data.claims.username,
        })
    }
}
