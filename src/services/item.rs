use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::error::AppError;
use crate::models::{Item, ItemChanges, ItemStats, NewItem, User};
use crate::repositories::{ItemQuery, ItemRepository};
use crate::services::authorization::authorize_owner;

/// 統計で「最近」とみなす期間
const RECENT_WINDOW: Duration = Duration::days(7);

/// アイテムサービス
///
/// 呼び出し側で実行主体（principal）を解決済みであること。
/// 更新・削除は「存在確認 → 所有者チェック → 変更」の順で行う。
#[derive(Clone)]
pub struct ItemService {
    item_repo: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(item_repo: Arc<dyn ItemRepository>) -> Self {
        Self { item_repo }
    }

    pub async fn create(&self, principal: &User, new_item: NewItem) -> Result<Item, AppError> {
        let item = self.item_repo.create(principal.id, &new_item).await?;
        tracing::info!(user_id = %principal.id, item_id = %item.id, "アイテム作成");
        Ok(item)
    }

    pub async fn get(&self, item_id: i64) -> Result<Item, AppError> {
        self.item_repo
            .find_by_id(item_id)
            .await?
            .ok_or(AppError::ItemNotFound)
    }

    pub async fn list(&self, query: &ItemQuery) -> Result<(Vec<Item>, i64), AppError> {
        self.item_repo.list(query).await
    }

    /// 全フィールド置き換え（PUT）
    pub async fn replace(
        &self,
        principal: &User,
        item_id: i64,
        new_item: NewItem,
    ) -> Result<Item, AppError> {
        self.update(principal, item_id, ItemChanges::replace_with(new_item))
            .await
    }

    /// 部分更新（PATCH）
    pub async fn update(
        &self,
        principal: &User,
        item_id: i64,
        changes: ItemChanges,
    ) -> Result<Item, AppError> {
        let mut item = self.load_owned(principal, item_id).await?;
        item.apply(changes);
        let item = self.item_repo.update(&item).await?;
        tracing::info!(user_id = %principal.id, item_id = %item.id, "アイテム更新");
        Ok(item)
    }

    pub async fn delete(&self, principal: &User, item_id: i64) -> Result<(), AppError> {
        self.load_owned(principal, item_id).await?;
        if !self.item_repo.delete(item_id).await? {
            return Err(AppError::ItemNotFound);
        }
        tracing::info!(user_id = %principal.id, item_id = %item_id, "アイテム削除");
        Ok(())
    }

    /// 実行主体自身のアイテム統計
    pub async fn stats(&self, principal: &User) -> Result<ItemStats, AppError> {
        let since = OffsetDateTime::now_utc() - RECENT_WINDOW;
        self.item_repo.stats(principal.id, since).await
    }

    async fn load_owned(&self, principal: &User, item_id: i64) -> Result<Item, AppError> {
        let item = self.get(item_id).await?;
        authorize_owner(principal, &item)?;
        Ok(item)
    }
}
