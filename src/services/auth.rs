use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserRepository;

/// タイミング攻撃対策のダミー検証に使う平文
const DUMMY_PASSWORD: &str = "itemgate-dummy-password";

/// パスワード（およびその他の秘密値）の argon2id ハッシュ化・検証
///
/// コスト（メモリ・反復回数・並列度）は設定で調整可能。
/// 検証時はハッシュ文字列（PHC形式）に埋め込まれたパラメータを使う。
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    dummy_hash: Arc<str>,
}

impl CredentialHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            tracing::error!(error = ?e, "argon2 パラメータが不正");
            AppError::Internal(anyhow::anyhow!("invalid argon2 params"))
        })?;

        let mut hasher = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: Arc::from(""),
        };
        hasher.dummy_hash = Arc::from(hasher.hash_password(DUMMY_PASSWORD)?);
        Ok(hasher)
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
        )
    }

    /// パスワードを argon2id でハッシュ化（ソルトはランダム生成）
    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
                AppError::Internal(anyhow::anyhow!("password hash error"))
            })?;
        Ok(hash.to_string())
    }

    /// パスワードを検証
    ///
    /// # Errors
    /// 保存されたハッシュが解析できない場合は内部エラー（`false` ではない）
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
            AppError::Internal(anyhow::anyhow!("password hash parse error"))
        })?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// ダミーのパスワード検証（応答時間からユーザーの存在有無を推測させない）
    fn dummy_verify(&self, password: &str) {
        let _ = self.verify_password(password, &self.dummy_hash);
    }
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    hasher: CredentialHasher,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(user_repo: Arc<dyn UserRepository>, hasher: CredentialHasher) -> Self {
        Self { user_repo, hasher }
    }

    /// ユーザー認証を実行
    ///
    /// ユーザー不在・パスワード不一致・無効化ユーザーはすべて同じエラーを返す。
    /// タイミング攻撃対策: ユーザーが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.user_repo.find_by_username(username).await? else {
            self.hasher.dummy_verify(password);
            tracing::warn!(username = %username, "認証失敗: ユーザー不在");
            return Err(AppError::Authentication("invalid_credentials".to_string()));
        };

        if !self.hasher.verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "認証失敗: パスワード不一致");
            return Err(AppError::Authentication("invalid_credentials".to_string()));
        }

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "認証失敗: 無効化されたユーザー");
            return Err(AppError::Authentication("inactive_user".to_string()));
        }

        tracing::info!(user_id = %user.id, "認証成功");
        Ok(user)
    }
}
