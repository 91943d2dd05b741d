//! Global application state.
//!
//! Used for access to common resources such as the
//! item services backed by each store.

use super::config::Config;
use super::database::DbPool;
use crate::api::item::item_repository::{InMemoryItemRepository, PgItemRepository};
use crate::api::item::item_service::ItemService;
use std::sync::Arc;

/// Global application state.
#[derive(Clone, Debug)]
pub struct AppState {
    items: ItemService,
    db_items: ItemService,
    config: Config,
}

impl AppState {
    /// Constructs a new [`AppState`].
    pub fn new(db: DbPool, config: Config) -> Self {
        let items = ItemService::new(Arc::new(InMemoryItemRepository::new()));
        let db_items = ItemService::new(Arc::new(PgItemRepository::new(db)));
        Self {
            items,
            db_items,
            config,
        }
    }

    /// Returns the item service backed by the in-memory store.
    pub fn items(&self) -> &ItemService {
        &self.items
    }

    /// Returns the item service backed by the database store.
    pub fn db_items(&self) -> &ItemService {
        &self.db_items
    }

    /// Returns the application configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
