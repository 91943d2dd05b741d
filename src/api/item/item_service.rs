//! A service for interacting with items.
//!
//! The service owns the one business rule of the application, that no
//! two items may share a title, and mediates all mutation through the
//! store it wraps.

use crate::api::item::item_repository::{Item, ItemRepository, NewItem, UpdateItem};
use crate::infra::error::{ApiResult, ClientError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// A service enforcing the title-uniqueness rule over an item store.
///
/// # Examples
///
/// ```rust
/// # use axum_todo::api::item::item_repository::{InMemoryItemRepository, NewItem};
/// # use axum_todo::api::item::item_service::ItemService;
/// # use std::sync::Arc;
/// # tokio_test::block_on(async {
/// let service = ItemService::new(Arc::new(InMemoryItemRepository::new()));
/// let item = service
///     .create_item(NewItem {
///         title: "Buy milk".to_string(),
///         description: None,
///     })
///     .await
///     .unwrap();
/// assert_eq!(1, item.id);
/// # });
/// ```
#[derive(Clone)]
pub struct ItemService {
    repository: Arc<dyn ItemRepository>,
    write_lock: Arc<Mutex<()>>,
}

impl fmt::Debug for ItemService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemService").finish_non_exhaustive()
    }
}

impl ItemService {
    /// Creates a service on top of the given store.
    pub fn new(repository: Arc<dyn ItemRepository>) -> Self {
        Self {
            repository,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Lists all items.
    #[instrument(skip(self))]
    pub async fn list_items(&self) -> ApiResult<Vec<Item>> {
        self.repository.list_items().await
    }

    /// Reads an item, or `None` if there is no such id.
    #[instrument(skip(self))]
    pub async fn read_item(&self, id: i32) -> ApiResult<Option<Item>> {
        self.repository.fetch_item(id).await
    }

    /// Creates a new item, rejecting titles that are already taken.
    #[instrument(skip(self, new_item), fields(title = %new_item.title))]
    pub async fn create_item(&self, new_item: NewItem) -> ApiResult<Item> {
        // Probe and insert form one critical section.
        let _guard = self.write_lock.lock().await;
        if self.repository.title_exists(&new_item.title).await? {
            return Err(ClientError::DuplicateTitle.into());
        }
        self.repository.create_item(new_item).await
    }

    /// Applies a partial update, or returns `None` if there is no such id.
    /// A changed title is re-checked for uniqueness; an unchanged one is not.
    #[instrument(skip(self, update))]
    pub async fn update_item(&self, id: i32, update: UpdateItem) -> ApiResult<Option<Item>> {
        let _guard = self.write_lock.lock().await;
        let Some(item) = self.repository.fetch_item(id).await? else {
            return Ok(None);
        };
        if let Some(title) = &update.title {
            if *title != item.title && self.repository.title_exists(title).await? {
                return Err(ClientError::DuplicateTitle.into());
            }
        }
        let updated = self.repository.update_item(&item, update).await?;
        Ok(Some(updated))
    }

    /// Deletes an item, returning whether it existed.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: i32) -> ApiResult<bool> {
        self.repository.delete_item(id).await
    }

    /// Removes all items and restarts identifier assignment.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> ApiResult<()> {
        self.repository.reset().await
    }
}
