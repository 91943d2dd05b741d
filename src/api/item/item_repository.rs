//! Types and functions for storing and loading items.
//!
//! The same store contract is implemented twice: [`InMemoryItemRepository`]
//! keeps items in process memory, [`PgItemRepository`] keeps them in
//! PostgreSQL. Stores own identifier assignment and the physical
//! collection; business rules live in the service.

use crate::infra::{
    database::DbPool,
    error::{ApiResult, ClientError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

/// A new item.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewItem {
    /// The item's title.
    #[schema(example = "Buy milk")]
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    /// The item's description.
    #[schema(example = "Two liters of whole milk")]
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// A partial change to an item.
///
/// Absent fields are left untouched. The description is doubly optional
/// so that an explicit `null` clears it while an absent field keeps it.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateItem {
    /// The new title, if any.
    #[schema(example = "Buy oat milk")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    /// The new description, if any. `null` clears it.
    #[schema(value_type = Option<String>, example = "One liter")]
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(length(max = 500))]
    pub description: Option<Option<String>>,
    /// The new done flag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
}

/// Keeps `Some(None)` for fields that are present but `null`,
/// so they can be told apart from fields that are absent.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// An existing item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Item {
    /// The item's id.
    pub id: i32,
    /// The item's title.
    #[schema(example = "Buy milk")]
    pub title: String,
    /// The item's description.
    #[schema(example = "Two liters of whole milk")]
    pub description: Option<String>,
    /// Whether the item is done.
    pub is_done: bool,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last changed.
    pub updated_at: DateTime<Utc>,
}

/// An item store.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ItemRepository: Send + Sync {
    /// Lists all items.
    async fn list_items(&self) -> ApiResult<Vec<Item>>;
    /// Fetches an item, or `None` if there is no such id.
    async fn fetch_item(&self, id: i32) -> ApiResult<Option<Item>>;
    /// Returns whether any item currently has exactly this title.
    async fn title_exists(&self, title: &str) -> ApiResult<bool>;
    /// Creates a new item under the next identifier.
    async fn create_item(&self, new_item: NewItem) -> ApiResult<Item>;
    /// Applies the supplied fields to an already fetched item
    /// and refreshes its `updated_at`.
    async fn update_item(&self, item: &Item, update: UpdateItem) -> ApiResult<Item>;
    /// Deletes an item, returning whether it existed.
    async fn delete_item(&self, id: i32) -> ApiResult<bool>;
    /// Removes all items and restarts identifier assignment.
    async fn reset(&self) -> ApiResult<()>;
}

/// The ephemeral store. Identifiers start at 1, strictly increase,
/// and are never reused until [`ItemRepository::reset`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryItemRepository {
    inner: Arc<RwLock<InMemoryInner>>,
}

#[derive(Debug, Default)]
struct InMemoryInner {
    items: BTreeMap<i32, Item>,
    last_id: i32,
}

impl InMemoryItemRepository {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ItemRepository for InMemoryItemRepository {
    #[instrument(skip(self))]
    async fn list_items(&self) -> ApiResult<Vec<Item>> {
        let inner = self.inner.read().await;
        // Keys increase monotonically, so key order is insertion order.
        Ok(inner.items.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn fetch_item(&self, id: i32) -> ApiResult<Option<Item>> {
        let inner = self.inner.read().await;
        Ok(inner.items.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn title_exists(&self, title: &str) -> ApiResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.items.values().any(|item| item.title == title))
    }

    #[instrument(skip(self, new_item), fields(title = %new_item.title))]
    async fn create_item(&self, new_item: NewItem) -> ApiResult<Item> {
        let mut inner = self.inner.write().await;
        let id = inner.last_id + 1;
        inner.last_id = id;
        let now = Utc::now();
        let item = Item {
            id,
            title: new_item.title,
            description: new_item.description,
            is_done: false,
            created_at: now,
            updated_at: now,
        };
        inner.items.insert(id, item.clone());
        tracing::info!("Created item {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self, item, update), fields(id = item.id))]
    async fn update_item(&self, item: &Item, update: UpdateItem) -> ApiResult<Item> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .items
            .get_mut(&item.id)
            .ok_or(ClientError::NotFound)?;
        if let Some(title) = update.title {
            stored.title = title;
        }
        if let Some(description) = update.description {
            stored.description = description;
        }
        if let Some(is_done) = update.is_done {
            stored.is_done = is_done;
        }
        stored.updated_at = Utc::now();
        tracing::info!("Updated item {:?}", stored);
        Ok(stored.clone())
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: i32) -> ApiResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.items.remove(&id).is_some())
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> ApiResult<()> {
        let mut inner = self.inner.write().await;
        inner.items.clear();
        inner.last_id = 0;
        Ok(())
    }
}

/// The durable store, one row per item.
/// Each call is a single statement, so no transaction handling is needed.
#[derive(Clone, Debug)]
pub struct PgItemRepository {
    db: DbPool,
}

impl PgItemRepository {
    /// Creates a store on top of the given pool.
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl ItemRepository for PgItemRepository {
    #[instrument(skip(self))]
    async fn list_items(&self) -> ApiResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn fetch_item(&self, id: i32) -> ApiResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn title_exists(&self, title: &str) -> ApiResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM items WHERE title = $1)
            "#,
        )
        .bind(title)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self, new_item), fields(title = %new_item.title))]
    async fn create_item(&self, new_item: NewItem) -> ApiResult<Item> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (title, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(new_item.title)
        .bind(new_item.description)
        .fetch_one(&self.db)
        .await?;
        tracing::info!("Created item {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self, item, update), fields(id = item.id))]
    async fn update_item(&self, item: &Item, update: UpdateItem) -> ApiResult<Item> {
        let title = update.title.unwrap_or_else(|| item.title.clone());
        let description = match update.description {
            Some(description) => description,
            None => item.description.clone(),
        };
        let is_done = update.is_done.unwrap_or(item.is_done);
        // RETURNING on a row deleted in the meantime yields RowNotFound,
        // which maps to a client-visible not found.
        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET title = $1, description = $2, is_done = $3, updated_at = now()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(is_done)
        .bind(item.id)
        .fetch_one(&self.db)
        .await?;
        tracing::info!("Updated item {:?}", item);
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: i32) -> ApiResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> ApiResult<()> {
        sqlx::query("TRUNCATE TABLE items RESTART IDENTITY")
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
