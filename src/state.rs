use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{
    InMemoryStore, ItemRepository, PgItemRepository, PgUserRepository, UserRepository,
};
use crate::services::{
    AuthService, CredentialHasher, EmailService, ItemService, PasswordResetService,
    SessionResolver, TokenService,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ユーザーリポジトリ
    pub user_repo: Arc<dyn UserRepository>,
    /// アイテムリポジトリ
    pub item_repo: Arc<dyn ItemRepository>,
    /// パスワードハッシャー（argon2id）
    pub hasher: CredentialHasher,
    /// セッショントークン（JWT）
    pub tokens: TokenService,
    /// メールサービス
    pub email_service: EmailService,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(
        config: Config,
        user_repo: Arc<dyn UserRepository>,
        item_repo: Arc<dyn ItemRepository>,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let hasher = CredentialHasher::from_config(&config)?;
        let tokens = TokenService::from_config(&config);
        let email_service = EmailService::new(config.clone());

        Ok(Self {
            config,
            user_repo,
            item_repo,
            hasher,
            tokens,
            email_service,
        })
    }

    /// PostgreSQL をバックエンドに構築
    pub fn postgres(pool: PgPool, config: Config) -> Result<Self, AppError> {
        Self::new(
            config,
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgItemRepository::new(pool)),
        )
    }

    /// インメモリストアで構築
    pub fn in_memory(config: Config) -> Result<Self, AppError> {
        Self::with_store(Arc::new(InMemoryStore::new()), config)
    }

    /// 既存のインメモリストアを共有して構築
    pub fn with_store(store: Arc<InMemoryStore>, config: Config) -> Result<Self, AppError> {
        Self::new(config, store.clone(), store)
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.user_repo.clone(), self.hasher.clone())
    }

    pub fn session_resolver(&self) -> SessionResolver {
        SessionResolver::new(self.user_repo.clone(), self.tokens.clone())
    }

    pub fn password_reset_service(&self) -> PasswordResetService {
        PasswordResetService::new(
            self.user_repo.clone(),
            self.hasher.clone(),
            self.email_service.clone(),
            self.config.clone(),
        )
    }

    pub fn item_service(&self) -> ItemService {
        ItemService::new(self.item_repo.clone())
    }
}
