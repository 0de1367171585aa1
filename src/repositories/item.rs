use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::models::{CategoryCount, Item, ItemOwner, ItemStats, NewItem};

/// 一覧取得時に許可するソートキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Price,
    Quantity,
    Category,
}

impl SortKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(Self::CreatedAt),
            "updated_at" => Some(Self::UpdatedAt),
            "name" => Some(Self::Name),
            "price" => Some(Self::Price),
            "quantity" => Some(Self::Quantity),
            "category" => Some(Self::Category),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Name => "name",
            Self::Price => "price",
            Self::Quantity => "quantity",
            Self::Category => "category",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// NULL は最大値として扱う（昇順で末尾、降順で先頭）
    fn nulls(self) -> &'static str {
        match self {
            Self::Asc => "NULLS LAST",
            Self::Desc => "NULLS FIRST",
        }
    }
}

/// 検証済みの一覧取得条件
#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuery {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub category: Option<String>,
    pub owner_id: Option<i64>,
    pub sort_by: SortKey,
    pub order: SortOrder,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            search: None,
            category: None,
            owner_id: None,
            sort_by: SortKey::default(),
            order: SortOrder::default(),
        }
    }
}

/// アイテムの永続化
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, owner_id: i64, new_item: &NewItem) -> Result<Item, AppError>;

    async fn find_by_id(&self, item_id: i64) -> Result<Option<Item>, AppError>;

    /// 条件に一致するアイテムと総件数（ページング前）
    async fn list(&self, query: &ItemQuery) -> Result<(Vec<Item>, i64), AppError>;

    /// 可変フィールドを書き戻す（owner_id は書き換えない）
    async fn update(&self, item: &Item) -> Result<Item, AppError>;

    async fn delete(&self, item_id: i64) -> Result<bool, AppError>;

    async fn stats(&self, owner_id: i64, recent_since: OffsetDateTime)
    -> Result<ItemStats, AppError>;
}

#[derive(Clone)]
pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// users を結合したアイテム行
#[derive(FromRow)]
struct ItemRow {
    #[sqlx(flatten)]
    item: Item,
    owner_username: String,
    owner_full_name: Option<String>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        let mut item = row.item;
        item.owner = Some(ItemOwner {
            id: item.owner_id,
            username: row.owner_username,
            full_name: row.owner_full_name,
        });
        item
    }
}

/// `i`（items）と `u`（users）を結合した SELECT 句
const ITEM_SELECT: &str = "SELECT i.id, i.owner_id, i.name, i.description, i.category, i.price, \
     i.quantity, i.is_active, i.created_at, i.updated_at, \
     u.username AS owner_username, u.full_name AS owner_full_name";

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ItemQuery) {
    builder.push(" WHERE TRUE");
    if let Some(owner_id) = query.owner_id {
        builder.push(" AND i.owner_id = ").push_bind(owner_id);
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{search}%");
        builder
            .push(" AND (i.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR i.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category) = &query.category {
        builder.push(" AND i.category = ").push_bind(category.clone());
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, query: &ItemQuery) {
    // カラム名・方向はホワイトリスト済みの列挙値からのみ組み立てる
    builder.push(format!(
        " ORDER BY i.{col} {dir} {nulls}, i.id {dir}",
        col = query.sort_by.column(),
        dir = query.order.keyword(),
        nulls = query.order.nulls(),
    ));
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn create(&self, owner_id: i64, new_item: &NewItem) -> Result<Item, AppError> {
        let sql = format!(
            r#"
            WITH i AS (
                INSERT INTO items (owner_id, name, description, category, price, quantity, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            {ITEM_SELECT}
            FROM i JOIN users u ON u.id = i.owner_id
            "#
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(owner_id)
            .bind(&new_item.name)
            .bind(&new_item.description)
            .bind(&new_item.category)
            .bind(new_item.price)
            .bind(new_item.quantity)
            .bind(new_item.is_active)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, item_id: i64) -> Result<Option<Item>, AppError> {
        let sql = format!(
            "{ITEM_SELECT} FROM items i JOIN users u ON u.id = i.owner_id WHERE i.id = $1"
        );
        let row = sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Item::from))
    }

    async fn list(&self, query: &ItemQuery) -> Result<(Vec<Item>, i64), AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM items i");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(ITEM_SELECT);
        select.push(" FROM items i JOIN users u ON u.id = i.owner_id");
        push_filters(&mut select, query);
        push_order(&mut select, query);
        select
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.skip);

        let rows = select
            .build_query_as::<ItemRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Item::from).collect(), total))
    }

    async fn update(&self, item: &Item) -> Result<Item, AppError> {
        let sql = format!(
            r#"
            WITH i AS (
                UPDATE items
                SET name = $2, description = $3, category = $4, price = $5,
                    quantity = $6, is_active = $7, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            {ITEM_SELECT}
            FROM i JOIN users u ON u.id = i.owner_id
            "#
        );
        sqlx::query_as::<_, ItemRow>(&sql)
            .bind(item.id)
            .bind(&item.name)
            .bind(&item.description)
            .bind(&item.category)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.is_active)
            .fetch_optional(&self.pool)
            .await?
            .map(Item::from)
            .ok_or(AppError::ItemNotFound)
    }

    async fn delete(&self, item_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(
        &self,
        owner_id: i64,
        recent_since: OffsetDateTime,
    ) -> Result<ItemStats, AppError> {
        let (total_items, total_value, recent_items) = sqlx::query_as::<_, (i64, f64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(price * quantity), 0)::DOUBLE PRECISION,
                   COUNT(*) FILTER (WHERE created_at >= $2)
            FROM items
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .bind(recent_since)
        .fetch_one(&self.pool)
        .await?;

        let categories = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT category AS name, COUNT(*) AS count
            FROM items
            WHERE owner_id = $1 AND category IS NOT NULL
            GROUP BY category
            ORDER BY category
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ItemStats {
            total_items,
            total_value,
            categories,
            recent_items,
        })
    }
}
