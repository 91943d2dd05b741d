//! Middleware for modifying requests and responses.

use crate::infra::error::{ApiError, ClientError, InternalError};
use axum::{body::Body, middleware::Next, response::IntoResponse};
use bytes::Bytes;
use http::{HeaderValue, Request, Response};
use http_body_util::BodyExt;
use hyper::body::Body as _;
use std::time::Instant;
use tower_http::trace::MakeSpan;

static X_REQUEST_ID: &str = "x-request-id";
static X_PROCESS_TIME: &str = "x-process-time";

#[derive(Clone)]
pub(crate) struct MakeRequestIdSpan;

impl<B> MakeSpan<B> for MakeRequestIdSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .expect("request id not set")
            .to_str()
            .expect("invalid request id");
        tracing::info_span!(
            "request",
            request_id = request_id,
            method = %request.method(),
            uri = %request.uri(),
            version = ?request.version(),
        )
    }
}

/// The maximum size of the request body to log.
const MAX_BODY_SIZE: u64 = 8192;

/// Print and log the request and response, and report how long the
/// request took in an `X-Process-Time` header.
pub(crate) async fn log_request_response(
    req: Request<Body>,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let start = Instant::now();

    // Print request
    let (parts, body) = req.into_parts();
    let req;
    let log_req = match body.size_hint().upper() {
        Some(n) => n <= MAX_BODY_SIZE,
        _ => false,
    };
    if log_req {
        let body_bytes = buffer_and_print("Request", body).await?;
        req = Request::from_parts(parts, Body::from(body_bytes));
    } else {
        req = Request::from_parts(parts, body);
    }

    // Perform request
    let res = next.run(req).await;

    // Print response
    let (parts, body) = res.into_parts();
    let mut res;
    let log_res = match body.size_hint().upper() {
        Some(n) => n <= MAX_BODY_SIZE,
        _ => false,
    };
    if log_res {
        let body_bytes = buffer_and_print("Response", body).await?;
        res = Response::from_parts(parts, Body::from(body_bytes)).into_response();
    } else {
        res = Response::from_parts(parts, body).into_response();
    }

    let process_time = HeaderValue::from_str(&start.elapsed().as_secs_f64().to_string())
        .map_err(|e| InternalError::Other(e.to_string()))?;
    res.headers_mut().insert(X_PROCESS_TIME, process_time);

    Ok(res)
}

/// Read the entire body stream and store it in memory.
async fn buffer_and_print(direction: &str, body: Body) -> Result<Bytes, ApiError> {
    // Try to read stream
    let body: Bytes = body
        .collect()
        .await
        .map_err(|e| ClientError::BadRequest(format!("failed to read body: {e}")))?
        .to_bytes();

    // Log if valid text
    if let Ok(body) = std::str::from_utf8(&body) {
        tracing::trace!("{} body = {:?}", direction, body);
    }

    Ok(body)
}
