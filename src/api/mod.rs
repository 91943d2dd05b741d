use axum::Router;

use crate::infra::state::AppState;

pub mod info;
pub mod item;

/// Constructs the full REST API.
///
/// The item routes are mounted twice with different stores behind them:
/// in-memory at the root and PostgreSQL under `/v2`.
pub fn api(state: AppState) -> Router {
    Router::new()
        .merge(info::info_api::routes().with_state(state.clone()))
        .merge(item::item_api::routes().with_state(state.items().clone()))
        .nest("/v2", item::item_api::routes().with_state(state.db_items().clone()))
}
