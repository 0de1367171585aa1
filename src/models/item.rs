use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::models::User;

/// アイテム
///
/// owner_id は作成時に確定し、以後変更されない
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Item {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub quantity: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// 所有者の公開情報（参照時に users から結合）
    #[sqlx(skip)]
    pub owner: Option<ItemOwner>,
}

/// アイテム所有者の公開情報
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOwner {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
}

impl ItemOwner {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

/// アイテム作成時の入力
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: f64,
    pub quantity: i32,
    pub is_active: bool,
}

/// アイテム更新内容
///
/// `None` は「変更しない」。description / category は `Some(None)` でクリア。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub is_active: Option<bool>,
}

impl ItemChanges {
    /// 全フィールドを置き換える更新（PUT）
    pub fn replace_with(item: NewItem) -> Self {
        Self {
            name: Some(item.name),
            description: Some(item.description),
            category: Some(item.category),
            price: Some(item.price),
            quantity: Some(item.quantity),
            is_active: Some(item.is_active),
        }
    }
}

impl Item {
    /// 更新内容を適用（owner_id / id / created_at は対象外）
    pub fn apply(&mut self, changes: ItemChanges) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(price) = changes.price {
            self.price = price;
        }
        if let Some(quantity) = changes.quantity {
            self.quantity = quantity;
        }
        if let Some(is_active) = changes.is_active {
            self.is_active = is_active;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// 所有者ごとのアイテム統計
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStats {
    pub total_items: i64,
    pub total_value: f64,
    pub categories: Vec<CategoryCount>,
    pub recent_items: i64,
}
