use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::models::{CategoryCount, Item, ItemOwner, ItemStats, NewItem, NewUser, User};
use crate::repositories::item::{ItemQuery, ItemRepository, SortKey, SortOrder};
use crate::repositories::user::UserRepository;

/// プロセス内ストア
///
/// `DATABASE_URL` 未設定時の開発用、およびテスト用。
/// 1つの書き込みロック内で読み取りと更新を行うため、各操作はアトミック。
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    items: BTreeMap<i64, Item>,
    next_user_id: i64,
    next_item_id: i64,
}

impl MemoryState {
    /// 所有者情報を付与した複製（users との結合相当）
    fn with_owner(&self, item: &Item) -> Item {
        let mut item = item.clone();
        item.owner = self.users.get(&item.owner_id).map(ItemOwner::from_user);
        item
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 管理操作用: ユーザーの有効フラグを変更
    pub async fn set_user_active(&self, user_id: i64, is_active: bool) -> bool {
        let mut state = self.state.write().await;
        match state.users.get_mut(&user_id) {
            Some(user) => {
                user.is_active = is_active;
                user.updated_at = OffsetDateTime::now_utc();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == new_user.email) {
            return Err(AppError::EmailAlreadyExists);
        }
        if state.users.values().any(|u| u.username == new_user.username) {
            return Err(AppError::UsernameAlreadyExists);
        }

        state.next_user_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: state.next_user_id,
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            full_name: new_user.full_name.clone(),
            password_hash: new_user.password_hash.clone(),
            is_active: true,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn store_reset_ticket(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.reset_token_hash = Some(token_hash.to_string());
            user.reset_token_expires_at = Some(expires_at);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn consume_reset_ticket(
        &self,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<i64>, AppError> {
        let mut state = self.state.write().await;
        let user = state.users.values_mut().find(|u| {
            u.reset_token_hash.as_deref() == Some(token_hash) && u.has_live_reset_ticket(now)
        });

        Ok(user.map(|user| {
            user.password_hash = new_password_hash.to_string();
            user.reset_token_hash = None;
            user.reset_token_expires_at = None;
            user.updated_at = OffsetDateTime::now_utc();
            user.id
        }))
    }

    async fn purge_expired_reset_tickets(&self, now: OffsetDateTime) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let mut purged = 0;
        for user in state.users.values_mut() {
            if matches!(user.reset_token_expires_at, Some(expires_at) if expires_at <= now) {
                user.reset_token_hash = None;
                user.reset_token_expires_at = None;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

fn matches_query(item: &Item, query: &ItemQuery) -> bool {
    if query.owner_id.is_some_and(|owner_id| item.owner_id != owner_id) {
        return false;
    }
    if let Some(category) = &query.category
        && item.category.as_ref() != Some(category)
    {
        return false;
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        let in_name = item.name.to_lowercase().contains(&needle);
        let in_description = item
            .description
            .as_ref()
            .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !in_name && !in_description {
            return false;
        }
    }
    true
}

fn compare_by(key: SortKey, a: &Item, b: &Item) -> Ordering {
    match key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Price => a.price.total_cmp(&b.price),
        SortKey::Quantity => a.quantity.cmp(&b.quantity),
        // NULL は最大値扱い（PostgreSQL の既定と同じ）
        SortKey::Category => match (&a.category, &b.category) {
            (Some(x), Some(y)) => x.cmp(y),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        },
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn create(&self, owner_id: i64, new_item: &NewItem) -> Result<Item, AppError> {
        let mut state = self.state.write().await;
        state.next_item_id += 1;
        let now = OffsetDateTime::now_utc();
        let item = Item {
            id: state.next_item_id,
            owner_id,
            name: new_item.name.clone(),
            description: new_item.description.clone(),
            category: new_item.category.clone(),
            price: new_item.price,
            quantity: new_item.quantity,
            is_active: new_item.is_active,
            created_at: now,
            updated_at: now,
            owner: None,
        };
        state.items.insert(item.id, item.clone());
        Ok(state.with_owner(&item))
    }

    async fn find_by_id(&self, item_id: i64) -> Result<Option<Item>, AppError> {
        let state = self.state.read().await;
        Ok(state.items.get(&item_id).map(|item| state.with_owner(item)))
    }

    async fn list(&self, query: &ItemQuery) -> Result<(Vec<Item>, i64), AppError> {
        let state = self.state.read().await;
        let mut matched: Vec<&Item> = state
            .items
            .values()
            .filter(|item| matches_query(item, query))
            .collect();
        matched.sort_by(|a, b| {
            let ordering = compare_by(query.sort_by, a, b).then(a.id.cmp(&b.id));
            match query.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .map(|item| state.with_owner(item))
            .collect();
        Ok((items, total))
    }

    async fn update(&self, item: &Item) -> Result<Item, AppError> {
        let mut state = self.state.write().await;
        let stored = state.items.get_mut(&item.id).ok_or(AppError::ItemNotFound)?;
        stored.name = item.name.clone();
        stored.description = item.description.clone();
        stored.category = item.category.clone();
        stored.price = item.price;
        stored.quantity = item.quantity;
        stored.is_active = item.is_active;
        stored.updated_at = OffsetDateTime::now_utc();
        let stored = stored.clone();
        Ok(state.with_owner(&stored))
    }

    async fn delete(&self, item_id: i64) -> Result<bool, AppError> {
        Ok(self.state.write().await.items.remove(&item_id).is_some())
    }

    async fn stats(
        &self,
        owner_id: i64,
        recent_since: OffsetDateTime,
    ) -> Result<ItemStats, AppError> {
        let state = self.state.read().await;
        let owned: Vec<&Item> = state
            .items
            .values()
            .filter(|item| item.owner_id == owner_id)
            .collect();

        let mut counts: HashMap<&str, i64> = HashMap::new();
        for item in &owned {
            if let Some(category) = item.category.as_deref() {
                *counts.entry(category).or_default() += 1;
            }
        }
        let mut categories: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(name, count)| CategoryCount {
                name: name.to_string(),
                count,
            })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ItemStats {
            total_items: owned.len() as i64,
            total_value: owned
                .iter()
                .map(|item| item.price * f64::from(item.quantity))
                .sum(),
            categories,
            recent_items: owned
                .iter()
                .filter(|item| item.created_at >= recent_since)
                .count() as i64,
        })
    }
}
