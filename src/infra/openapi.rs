//! OpenAPI configuration.

use crate::api::item::item_repository;
use crate::api::{info::info_api, item::item_api};
use utoipa::OpenApi;

/// OpenApi configuration.
#[derive(OpenApi)]
#[openapi(
    paths(
        info_api::info,
        info_api::health,
        item_api::create_item,
        item_api::get_item,
        item_api::list_items,
        item_api::update_item,
        item_api::delete_item,
        item_api::reset,
    ),
    components(
        schemas(
            info_api::AppInfo,
            info_api::Health,
            item_repository::NewItem,
            item_repository::UpdateItem,
            item_repository::Item,
            crate::infra::error::ErrorBody
        )
    )
)]
#[derive(Clone, Copy, Debug)]
pub struct ApiDoc;
