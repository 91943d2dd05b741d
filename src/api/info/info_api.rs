//! Application metadata and liveness endpoints.

use crate::infra::state::AppState;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

/// Information about the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AppInfo {
    name: &'static str,
    version: &'static str,
}

/// The health of the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Health {
    status: &'static str,
}

/// Endpoints for getting information about the application.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/info", get(info))
        .route("/health", get(health))
}

/// Returns information about the application.
#[utoipa::path(
    get,
    path = "/api/info",
    responses(
        (status = 200, description = "Success", body = AppInfo),
    )
)]
pub async fn info() -> Json<AppInfo> {
    Json(AppInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Reports whether the application is able to serve requests.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Success", body = Health),
    )
)]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
