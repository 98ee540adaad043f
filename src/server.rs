//! HTTP transport
//!
//! Installs the RESTCONF routes on an axum router and converts between HTTP
//! and the transport-agnostic request/response types of the handler. The
//! informational endpoints (host-meta discovery, the API root, and the YANG
//! library version) are answered here; everything under `/restconf/data` and
//! `/restconf/operations` goes through the request coordinator.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tower_http::trace::TraceLayer;

use crate::error::{ErrorRecord, ErrorTag, ErrorType, Result};
use crate::handler::{RequestHandler, RestRequest};
use crate::response::{self, RestResponse};

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = "rust-restconf";

/// Revision of ietf-yang-library the API root advertises.
pub const YANG_LIBRARY_VERSION: &str = "2016-06-21";

const HOST_META: &str = "<XRD xmlns='http://docs.oasis-open.org/ns/xri/xrd-1.0'>\n \
                         <Link rel='restconf' href='/restconf'/>\n</XRD>";

/// Shared state handed to every route.
#[derive(Clone)]
pub struct ServerState {
    pub handler: Arc<RequestHandler>,
    pub yang_library_version: String,
}

/// Build the application router.
pub fn router(state: ServerState) -> Router {
    for entry in state
        .handler
        .routes()
        .data
        .iter()
        .chain(state.handler.routes().operations.iter())
    {
        tracing::debug!(template = %entry.url_template, "install route");
    }
    Router::new()
        .route("/.well-known/host-meta", any(host_meta))
        .route("/restconf", any(api_root))
        .route("/restconf/yang-library-version", any(yang_library_version))
        .route("/restconf/data", any(data_root))
        .route("/restconf/data/{*path}", any(data))
        .route("/restconf/operations/{*path}", any(operations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the connection listener fails.
pub async fn serve(addr: &str, state: ServerState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "restconf server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn data_root(
    State(state): State<ServerState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = rest_request(method, String::new(), &headers, body);
    into_http(state.handler.handle_data(&request))
}

async fn data(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = rest_request(method, path, &headers, body);
    into_http(state.handler.handle_data(&request))
}

async fn operations(
    State(state): State<ServerState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = rest_request(method, path, &headers, body);
    into_http(state.handler.handle_operation(&request))
}

async fn host_meta(method: Method, headers: HeaderMap) -> Response {
    if method == Method::GET {
        let mut response = (StatusCode::OK, HOST_META).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/xrd+xml"),
        );
        decorate(response)
    } else {
        method_rejected(&method, &headers, "to get host-meta")
    }
}

async fn api_root(State(state): State<ServerState>, method: Method, headers: HeaderMap) -> Response {
    if method == Method::GET {
        let root = serde_json::json!({
            "restconf": {
                "data": {},
                "operations": {},
                "yang-library-version": state.yang_library_version,
            }
        });
        json_ok(&root)
    } else {
        method_rejected(&method, &headers, "")
    }
}

async fn yang_library_version(
    State(state): State<ServerState>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method == Method::GET {
        let value = serde_json::json!({
            "yang-library-version": state.yang_library_version,
        });
        json_ok(&value)
    } else {
        method_rejected(&method, &headers, "")
    }
}

fn rest_request(method: Method, path: String, headers: &HeaderMap, body: Bytes) -> RestRequest {
    RestRequest {
        method,
        path,
        accept: header_text(headers, header::ACCEPT),
        content_type: header_text(headers, header::CONTENT_TYPE),
        body: body.to_vec(),
    }
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Informational endpoints answer GET only; anything else is recovered into
/// a standard error container, like every other client-caused failure.
fn method_rejected(method: &Method, headers: &HeaderMap, what: &str) -> Response {
    let accept = header_text(headers, header::ACCEPT);
    let message = if what.is_empty() {
        format!("use HTTP GET instead of {}", method)
    } else {
        format!("use HTTP GET instead of {} {}", method, what)
    };
    let resp = response::error_response(
        accept.as_deref(),
        vec![ErrorRecord::new(
            ErrorType::Protocol,
            ErrorTag::ResourceDenied,
            None,
            Some(message),
        )],
    );
    into_http(resp)
}

fn json_ok(value: &serde_json::Value) -> Response {
    let body = serde_json::to_vec_pretty(value).unwrap_or_default();
    into_http(RestResponse {
        status: StatusCode::OK,
        content_type: Some("application/json".to_string()),
        body,
    })
}

fn into_http(resp: RestResponse) -> Response {
    let mut builder = axum::http::Response::builder().status(resp.status);
    if let Some(content_type) = &resp.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    match builder.body(Body::from(resp.body)) {
        Ok(response) => decorate(response),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn decorate(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::SERVER, header::HeaderValue::from_static(SERVER_NAME));
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_http_carries_status_and_headers() {
        let response = into_http(RestResponse {
            status: StatusCode::CONFLICT,
            content_type: Some("application/yang-data+xml".into()),
            body: b"<errors/>".to_vec(),
        });
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/yang-data+xml"
        );
        assert_eq!(response.headers().get(header::SERVER).unwrap(), SERVER_NAME);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache"
        );
    }

    #[test]
    fn test_method_rejection_is_error_container() {
        let headers = HeaderMap::new();
        let response = method_rejected(&Method::DELETE, &headers, "to get host-meta");
        // resource-denied maps to 409 in the canonical table.
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
