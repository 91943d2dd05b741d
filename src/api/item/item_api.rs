//! The item API implementation.
//!
//! The routes are mounted twice: under `/api` backed by the in-memory
//! store, and under `/api/v2` backed by PostgreSQL. The handlers only
//! translate between HTTP and [`ItemService`] outcomes.

use crate::{
    api::item::{
        item_repository::{Item, NewItem, UpdateItem},
        item_service::ItemService,
    },
    infra::{
        error::{ApiResult, ClientError},
        extract::Json,
        validation::Valid,
    },
};
use axum::{extract::State, Router};
use axum_extra::routing::{RouterExt, TypedPath};
use http::StatusCode;
use serde::Deserialize;
use tracing::instrument;

/// The item API endpoints.
pub fn routes() -> Router<ItemService> {
    Router::new()
        .typed_post(create_item)
        .typed_get(get_item)
        .typed_put(update_item)
        .typed_delete(delete_item)
        .typed_get(list_items)
        .typed_post(reset)
}

#[derive(Deserialize, TypedPath)]
#[typed_path("/items", rejection(ClientError))]
pub struct Items;

#[derive(Deserialize, TypedPath)]
#[typed_path("/items/:id", rejection(ClientError))]
pub struct ItemsId(i32);

#[derive(Deserialize, TypedPath)]
#[typed_path("/reset", rejection(ClientError))]
pub struct Reset;

/// Creates a new item.
#[utoipa::path(
    post,
    path = "/api/items",
    request_body = NewItem,
    responses(
        (status = 201, description = "Created", body = Item),
        (status = 409, description = "Conflict", body = ErrorBody),
        (status = 422, description = "Unprocessable Entity", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all)]
pub async fn create_item(
    Items: Items,
    State(service): State<ItemService>,
    Json(new_item): Json<NewItem>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let new_item = Valid::new(new_item)?;
    let item = service.create_item(new_item.into_inner()).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Gets an item.
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    responses(
        (status = 200, description = "Ok", body = Item),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all, fields(id))]
pub async fn get_item(
    ItemsId(id): ItemsId,
    State(service): State<ItemService>,
) -> ApiResult<Json<Item>> {
    let item = service.read_item(id).await?.ok_or(ClientError::NotFound)?;
    Ok(Json(item))
}

/// Partially updates an item.
#[utoipa::path(
    put,
    path = "/api/items/{id}",
    request_body = UpdateItem,
    responses(
        (status = 200, description = "Ok", body = Item),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Conflict", body = ErrorBody),
        (status = 422, description = "Unprocessable Entity", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all, fields(id))]
pub async fn update_item(
    ItemsId(id): ItemsId,
    State(service): State<ItemService>,
    Json(update): Json<UpdateItem>,
) -> ApiResult<Json<Item>> {
    let update = Valid::new(update)?;
    let item = service
        .update_item(id, update.into_inner())
        .await?
        .ok_or(ClientError::NotFound)?;
    Ok(Json(item))
}

/// Deletes an item.
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    responses(
        (status = 204, description = "No Content"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all, fields(id))]
pub async fn delete_item(
    ItemsId(id): ItemsId,
    State(service): State<ItemService>,
) -> ApiResult<StatusCode> {
    if service.delete_item(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ClientError::NotFound.into())
    }
}

/// Lists all items.
#[utoipa::path(
    get,
    path = "/api/items",
    responses(
        (status = 200, description = "Success", body = [Item]),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all)]
pub async fn list_items(
    Items: Items,
    State(service): State<ItemService>,
) -> ApiResult<Json<Vec<Item>>> {
    let items = service.list_items().await?;
    Ok(Json(items))
}

/// Removes all items and restarts identifier assignment.
#[utoipa::path(
    post,
    path = "/api/reset",
    responses(
        (status = 204, description = "No Content"),
        (status = 500, description = "Internal Server Error", body = ErrorBody),
    )
)]
#[instrument(skip_all)]
pub async fn reset(Reset: Reset, State(service): State<ItemService>) -> ApiResult<StatusCode> {
    service.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}
