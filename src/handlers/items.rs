use axum::{Json, extract::State, http::StatusCode};
use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::extract::{CurrentUser, PathParam, ValidJson, ValidQuery};
use crate::models::{Item, ItemChanges, ItemStats, NewItem};
use crate::repositories::{ItemQuery, SortKey, SortOrder};
use crate::sanitize::{MAX_SEARCH_QUERY_LEN, sanitize_search_query};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 10;

// === 一覧 ===

#[derive(Debug, Deserialize, Validate)]
pub struct ListItemsParams {
    #[serde(default)]
    #[garde(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[garde(range(min = 1, max = 100))]
    pub limit: i64,
    #[garde(skip)]
    pub search: Option<String>,
    #[garde(skip)]
    pub category: Option<String>,
    #[garde(skip)]
    pub owner_id: Option<i64>,
    #[garde(skip)]
    pub sort_by: Option<String>,
    #[garde(skip)]
    pub order: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl ListItemsParams {
    /// 検証済みの一覧取得条件に変換
    ///
    /// ソートキー・順序はホワイトリスト外ならバリデーションエラー
    pub fn into_query(self) -> Result<ItemQuery, AppError> {
        let sort_by = match self.sort_by.as_deref() {
            None => SortKey::default(),
            Some(value) => SortKey::parse(value).ok_or_else(|| {
                AppError::Validation(format!("sort_by に指定できない値です: {value}"))
            })?,
        };
        let order = match self.order.as_deref() {
            None => SortOrder::default(),
            Some(value) => SortOrder::parse(value).ok_or_else(|| {
                AppError::Validation(format!("order は asc または desc です: {value}"))
            })?,
        };

        let search = self
            .search
            .map(|query| sanitize_search_query(&query, MAX_SEARCH_QUERY_LEN))
            .filter(|query| !query.is_empty());
        let category = self.category.filter(|category| !category.is_empty());

        Ok(ItemQuery {
            skip: self.skip,
            limit: self.limit,
            search,
            category,
            owner_id: self.owner_id,
            sort_by,
            order,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<Item>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// GET /api/items
///
/// 認証済みであれば全アイテムを参照可能（`owner_id` で絞り込み）
pub async fn list_items(
    CurrentUser(_principal): CurrentUser,
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<ListItemsParams>,
) -> Result<Json<ItemListResponse>, AppError> {
    let query = params.into_query()?;
    let (items, total) = state.item_service().list(&query).await?;

    Ok(Json(ItemListResponse {
        items,
        total,
        skip: query.skip,
        limit: query.limit,
    }))
}

/// GET /api/items/stats
pub async fn item_stats(
    CurrentUser(principal): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ItemStats>, AppError> {
    let stats = state.item_service().stats(&principal).await?;
    Ok(Json(stats))
}

// === 作成・置き換え ===

#[derive(Debug, Deserialize, Validate)]
pub struct ItemRequest {
    #[garde(length(chars, min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[garde(length(chars, max = 1000))]
    pub description: Option<String>,
    #[serde(default)]
    #[garde(length(chars, max = 100))]
    pub category: Option<String>,
    #[serde(default)]
    #[garde(range(min = 0.0))]
    pub price: f64,
    #[serde(default)]
    #[garde(range(min = 0))]
    pub quantity: i32,
    #[serde(default = "default_is_active")]
    #[garde(skip)]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

impl From<ItemRequest> for NewItem {
    fn from(request: ItemRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            category: request.category,
            price: request.price,
            quantity: request.quantity,
            is_active: request.is_active,
        }
    }
}

/// POST /api/items
pub async fn create_item(
    CurrentUser(principal): CurrentUser,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<ItemRequest>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let item = state
        .item_service()
        .create(&principal, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/items/{id}
pub async fn get_item(
    CurrentUser(_principal): CurrentUser,
    State(state): State<AppState>,
    PathParam(item_id): PathParam<i64>,
) -> Result<Json<Item>, AppError> {
    let item = state.item_service().get(item_id).await?;
    Ok(Json(item))
}

/// PUT /api/items/{id}
///
/// 省略されたフィールドは既定値に戻る
pub async fn replace_item(
    CurrentUser(principal): CurrentUser,
    State(state): State<AppState>,
    PathParam(item_id): PathParam<i64>,
    ValidJson(request): ValidJson<ItemRequest>,
) -> Result<Json<Item>, AppError> {
    let item = state
        .item_service()
        .replace(&principal, item_id, request.into())
        .await?;
    Ok(Json(item))
}

// === 部分更新 ===

/// PATCH 用リクエスト
///
/// description / category は `null` 指定でクリア、省略で変更なし
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ItemPatchRequest {
    #[serde(default)]
    #[garde(length(chars, min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[garde(custom(max_chars(1000)))]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[garde(custom(max_chars(100)))]
    pub category: Option<Option<String>>,
    #[serde(default)]
    #[garde(range(min = 0.0))]
    pub price: Option<f64>,
    #[serde(default)]
    #[garde(range(min = 0))]
    pub quantity: Option<i32>,
    #[serde(default)]
    #[garde(skip)]
    pub is_active: Option<bool>,
}

/// フィールドが存在すれば `Some`（`null` は `Some(None)`）
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn max_chars(max: usize) -> impl FnOnce(&Option<Option<String>>, &()) -> garde::Result {
    move |value, _| match value {
        Some(Some(text)) if text.chars().count() > max => Err(garde::Error::new(format!(
            "length is greater than {max}"
        ))),
        _ => Ok(()),
    }
}

impl From<ItemPatchRequest> for ItemChanges {
    fn from(request: ItemPatchRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            category: request.category,
            price: request.price,
            quantity: request.quantity,
            is_active: request.is_active,
        }
    }
}

/// PATCH /api/items/{id}
pub async fn update_item(
    CurrentUser(principal): CurrentUser,
    State(state): State<AppState>,
    PathParam(item_id): PathParam<i64>,
    ValidJson(request): ValidJson<ItemPatchRequest>,
) -> Result<Json<Item>, AppError> {
    let item = state
        .item_service()
        .update(&principal, item_id, request.into())
        .await?;
    Ok(Json(item))
}

/// DELETE /api/items/{id}
pub async fn delete_item(
    CurrentUser(principal): CurrentUser,
    State(state): State<AppState>,
    PathParam(item_id): PathParam<i64>,
) -> Result<StatusCode, AppError> {
    state.item_service().delete(&principal, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
