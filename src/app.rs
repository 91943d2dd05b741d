//! REST API implementation.
//!
//! # Examples
//!
//! Health probe.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! # let url = axum_todo::app::spawn_app().await;
//! let response = reqwest::get(format!("{}/health", url)).await.unwrap();
//! assert_eq!(200, response.status());
//! # });
//! ```
//!
//! Creating an item.
//!
//! ```rust
//! # use axum_todo::api::item::item_repository::{Item, NewItem};
//! # tokio_test::block_on(async {
//! # let url = axum_todo::app::spawn_app().await;
//! let new_item = NewItem {
//!     title: "Buy milk".to_string(),
//!     description: None,
//! };
//! let client = reqwest::Client::new();
//! let response = client
//!     .post(format!("{}/items", url))
//!     .json(&new_item)
//!     .send()
//!     .await
//!     .unwrap();
//! assert_eq!(201, response.status());
//! let item = response.json::<Item>().await.unwrap();
//! assert_eq!("Buy milk", item.title);
//! # });
//! ```

use crate::infra::database::DbPool;
use crate::infra::error::{InternalError, PanicHandler};
use crate::infra::middleware::MakeRequestIdSpan;
use crate::infra::openapi::ApiDoc;
use crate::infra::{config::Config, state::AppState};
use axum::error_handling::HandleErrorLayer;
use axum::response::IntoResponse;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_redoc::{Redoc, Servable};
use utoipa_swagger_ui::SwaggerUi;

/// Constructs the full axum application.
pub fn app(state: AppState) -> Router {
    // Fallible middleware from tower, mapped to infallible response with [`HandleErrorLayer`].
    let tower_middleware = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e| async move {
            InternalError::Other(format!("Tower middleware failed: {e}")).into_response()
        }))
        .concurrency_limit(500);

    // The REST API and its documentation.
    Router::new()
        .merge(SwaggerUi::new("/api/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .merge(Redoc::with_url("/api/redoc", ApiDoc::openapi()))
        .merge(RapiDoc::new("/api/openapi.json").path("/api/rapidoc"))
        .nest("/api", crate::api::api(state.clone()))
        // Layers
        .layer(TimeoutLayer::new(state.config().server.timeout))
        .layer(axum::middleware::from_fn(
            crate::infra::middleware::log_request_response,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(tower_middleware)
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// Starts the axum server.
pub async fn run_app(addr: TcpListener, db: PgPool, config: Config) -> Result<(), hyper::Error> {
    let state = AppState::new(db, config);
    let app = app(state).into_make_service();

    tracing::info!("Starting axum on {}", addr.local_addr().unwrap());
    let exit_result = axum::serve(addr, app)
        .with_graceful_shutdown(crate::infra::shutdown::shutdown_signal())
        .await;

    match exit_result {
        Ok(_) => tracing::info!("Successfully shut down"),
        Err(e) => tracing::error!("Shutdown failed: {}", e),
    }

    Ok(())
}

/// Spawn a server on a random port.
pub async fn spawn_app() -> String {
    let config = crate::infra::config::load_config().unwrap();
    let db = crate::infra::database::init_db(&config.database);
    spawn_app_with_db(db).await
}

/// Spawn a server on a random port with a custom database.
pub async fn spawn_app_with_db(db: DbPool) -> String {
    let address = "127.0.0.1";
    let listener = TcpListener::bind(format!("{address}:0")).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = crate::infra::config::load_config().unwrap();
    tokio::spawn(run_app(listener, db, config));
    format!("http://{address}:{port}/api")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::item::item_repository::{Item, NewItem},
        infra::{error::ErrorBody, state::AppState},
    };
    use axum::{body::Body, Router};
    use futures::StreamExt;
    use http::{Request, StatusCode};
    use serde::Deserialize;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = crate::infra::config::load_config().unwrap();
        let db = crate::infra::database::init_db(&config.database);
        let state = AppState::new(db, config);
        app(state)
    }

    async fn get<T: for<'a> Deserialize<'a>>(url: &str) -> T {
        let client = reqwest::ClientBuilder::default().build().unwrap();
        client.get(url).send().await.unwrap().json().await.unwrap()
    }

    async fn body_bytes(body: Body) -> Vec<u8> {
        body.into_data_stream()
            .filter_map(|res| std::future::ready(res.ok().map(|b| b.to_vec())))
            .concat()
            .await
    }

    #[tokio::test]
    async fn swagger_ui_oneshot() {
        let app = test_app();
        let req = Request::get("/api/swagger-ui/index.html")
            .body(Body::empty())
            .unwrap();
        let result = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, result.status())
    }

    #[tokio::test]
    async fn redoc_oneshot() {
        let app = test_app();
        let req = Request::get("/api/redoc").body(Body::empty()).unwrap();
        let result = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, result.status())
    }

    #[tokio::test]
    async fn rapidoc_oneshot() {
        let app = test_app();
        let req = Request::get("/api/rapidoc").body(Body::empty()).unwrap();
        let result = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, result.status())
    }

    #[tokio::test]
    async fn info_reports_name_and_version() {
        let app = test_app();
        let req = Request::get("/api/info").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let body = body_bytes(res.into_body()).await;
        let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(env!("CARGO_PKG_NAME"), info["name"]);
        assert_eq!(env!("CARGO_PKG_VERSION"), info["version"]);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = test_app();
        let req = Request::get("/api/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(StatusCode::OK, res.status());
        let body = body_bytes(res.into_body()).await;
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!("ok", health["status"]);
    }

    #[tokio::test]
    async fn item_lifecycle_over_http() {
        let url = spawn_app().await;
        let client = reqwest::ClientBuilder::default().build().unwrap();

        // Create an item.
        let new_item = NewItem {
            title: "Buy milk".to_string(),
            description: Some("Remember the milk".to_string()),
        };
        let response = client
            .post(format!("{url}/items"))
            .json(&new_item)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::CREATED, response.status());
        let created: Item = response.json().await.unwrap();
        assert_eq!(1, created.id);
        assert_eq!("Buy milk", created.title);
        assert!(!created.is_done);

        // A second item with the same title is rejected.
        let response = client
            .post(format!("{url}/items"))
            .json(&new_item)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::CONFLICT, response.status());
        let error: ErrorBody = response.json().await.unwrap();
        assert_eq!("an item with this title already exists", error.message());

        // Mark it as done.
        let response = client
            .put(format!("{url}/items/1"))
            .header("Content-Type", "application/json")
            .body(r#"{"is_done": true}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());
        let updated: Item = response.json().await.unwrap();
        assert_eq!("Buy milk", updated.title);
        assert!(updated.is_done);

        // It can be read back until it is deleted.
        let fetched: Item = get(&format!("{url}/items/1")).await;
        assert_eq!(updated, fetched);
        let response = client
            .delete(format!("{url}/items/1"))
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::NO_CONTENT, response.status());
        let response = client.get(format!("{url}/items/1")).send().await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        let response = client
            .delete(format!("{url}/items/1"))
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn invalid_item_is_unprocessable() {
        let url = spawn_app().await;
        let client = reqwest::ClientBuilder::default().build().unwrap();
        let response = client
            .post(format!("{url}/items"))
            .header("Content-Type", "application/json")
            .body(r#"{"title": ""}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let url = spawn_app().await;
        let client = reqwest::ClientBuilder::default().build().unwrap();
        let response = client
            .post(format!("{url}/items"))
            .header("Content-Type", "application/json")
            .body(r#"{"title": "#)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[tokio::test]
    async fn responses_carry_a_process_time_header() {
        let url = spawn_app().await;
        let client = reqwest::ClientBuilder::default().build().unwrap();
        let response = client.get(format!("{url}/health")).send().await.unwrap();
        let process_time = response
            .headers()
            .get("x-process-time")
            .expect("x-process-time header missing")
            .to_str()
            .unwrap()
            .parse::<f64>()
            .unwrap();
        assert!(process_time >= 0.0);
    }

    #[tokio::test]
    async fn reset_clears_items_and_restarts_identifiers() {
        let url = spawn_app().await;
        let client = reqwest::ClientBuilder::default().build().unwrap();
        let new_item = NewItem {
            title: "First".to_string(),
            description: None,
        };
        let response = client
            .post(format!("{url}/items"))
            .json(&new_item)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::CREATED, response.status());

        let response = client.post(format!("{url}/reset")).send().await.unwrap();
        assert_eq!(StatusCode::NO_CONTENT, response.status());
        let items: Vec<Item> = get(&format!("{url}/items")).await;
        assert!(items.is_empty());

        // Identifier assignment starts over.
        let response = client
            .post(format!("{url}/items"))
            .json(&new_item)
            .send()
            .await
            .unwrap();
        let recreated: Item = response.json().await.unwrap();
        assert_eq!(1, recreated.id);
    }

    #[tokio::test]
    #[ignore = "requires a database"]
    async fn pg_backed_routes_serve_the_same_api() {
        let config = crate::infra::config::load_config().unwrap();
        let db = crate::infra::database::init_db(&config.database);
        crate::infra::database::run_migrations(&db).await.unwrap();
        let url = spawn_app_with_db(db).await;
        let client = reqwest::ClientBuilder::default().build().unwrap();

        let response = client.post(format!("{url}/v2/reset")).send().await.unwrap();
        assert_eq!(StatusCode::NO_CONTENT, response.status());
        let new_item = NewItem {
            title: "Stored in postgres".to_string(),
            description: None,
        };
        let response = client
            .post(format!("{url}/v2/items"))
            .json(&new_item)
            .send()
            .await
            .unwrap();
        assert_eq!(StatusCode::CREATED, response.status());
        let created: Item = response.json().await.unwrap();
        assert_eq!(1, created.id);
        let fetched: Item = get(&format!("{url}/v2/items/1")).await;
        assert_eq!(created, fetched);
    }
}
