use secrecy::SecretBox;
use serde::Deserialize;

/// リセットチケットの受け渡し方法
///
/// `Response` はデモ用途のみ。チケットがHTTPレスポンスにそのまま含まれる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetTicketDelivery {
    #[default]
    Response,
    Email,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    /// 未設定の場合はインメモリストアで起動する
    #[serde(default)]
    pub database_url: Option<SecretBox<String>>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // JWT 設定（アルゴリズムは HS256 固定）
    pub jwt_secret: SecretBox<String>,
    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,

    // パスワードハッシュ (argon2id) のコスト
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    // パスワードリセット設定
    #[serde(default)]
    pub reset_ticket_delivery: ResetTicketDelivery,
    #[serde(default)]
    pub password_reset_url_base: Option<String>,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,
    #[serde(default = "default_reset_ticket_sweep_interval_secs")]
    pub reset_ticket_sweep_interval_secs: u64,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,

    /// CORS 許可オリジン（カンマ区切り）
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 30;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 3600;
/// アクセストークン有効期間の上限（365日）
const MAX_ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 60 * 24 * 365;
/// リセットチケット有効期間の上限（7日）
const MAX_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 60 * 60 * 24 * 7;
const DEFAULT_RESET_TICKET_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";
pub const DEFAULT_PASSWORD_RESET_URL_BASE: &str = "http://localhost:3000/reset-password";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_access_token_expire_minutes() -> i64 {
    DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES
}

fn default_argon2_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_argon2_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_argon2_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_reset_ticket_sweep_interval_secs() -> u64 {
    DEFAULT_RESET_TICKET_SWEEP_INTERVAL_SECS
}

fn default_allowed_origins() -> String {
    DEFAULT_ALLOWED_ORIGINS.to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env::<Self>()?.validate()
    }

    /// 任意のキー・値の組から設定を構築（テスト用途）
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter::<_, Self>(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_uppercase(), v.into())),
        )?
        .validate()
    }

    /// 有効期間の範囲チェック
    ///
    /// 0以下や過大な値は起動時に拒否する（期限計算のオーバーフロー防止）
    fn validate(self) -> Result<Self, envy::Error> {
        check_range(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            self.access_token_expire_minutes,
            MAX_ACCESS_TOKEN_EXPIRE_MINUTES,
        )?;
        check_range(
            "PASSWORD_RESET_TOKEN_TTL_SECS",
            self.password_reset_token_ttl_secs,
            MAX_PASSWORD_RESET_TOKEN_TTL_SECS,
        )?;
        Ok(self)
    }

    /// CORS 許可オリジンの一覧
    pub fn allowed_origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn check_range(name: &str, value: i64, max: i64) -> Result<(), envy::Error> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(envy::Error::Custom(format!(
            "{name} must be between 1 and {max}, got {value}"
        )))
    }
}
