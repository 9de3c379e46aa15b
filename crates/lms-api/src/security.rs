use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ErrorBody;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_INBOUND_REQUEST_ID_LEN: usize = 128;

/// Request-scoped metadata available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let ok = !raw.is_empty()
        && raw.len() <= MAX_INBOUND_REQUEST_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    ok.then(|| raw.to_string())
}

/// Reuses a sane inbound `x-request-id` or mints one, echoes it on the response,
/// and logs one line per request.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id =
        inbound_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(RequestMeta {
        request_id: request_id.clone(),
    });

    let started = Instant::now();
    let mut resp = next.run(req).await;
    let status = resp.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;

    if status >= 500 {
        tracing::error!(%request_id, %method, %path, status, latency_ms, "request failed");
    } else {
        tracing::info!(%request_id, %method, %path, status, latency_ms, "request");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    resp
}

fn is_https(req: &Request<Body>) -> bool {
    if req.uri().scheme_str() == Some("https") {
        return true;
    }
    req.headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Refuses plain-HTTP traffic when the deployment says TLS is mandatory. Health
/// checks are exempt so a load balancer can still reach the process directly.
pub async fn require_https(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    if !state.config.require_https || req.uri().path() == "/healthz" || is_https(&req) {
        return next.run(req).await;
    }
    (
        StatusCode::UPGRADE_REQUIRED,
        axum::Json(ErrorBody {
            code: "https_required",
            message: "HTTPS is required".to_string(),
            field: None,
        }),
    )
        .into_response()
}

pub fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
}
