//! Reverse proxy letting the host's web content reach arbitrary origins.
//!
//! Requests arrive as `/proxy/<percent-encoded target>`. The `X-Set-Headers`
//! JSON map lets the caller set (or, with `"undefined"`, delete) headers the
//! embedded browser will not let it send. Upstream calls share one
//! cookie-keeping agent and never follow redirects; a `Location` is rewritten
//! to point back through the proxy.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::server::DaemonState;

const PROXY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::proxy");

/// Path prefix of the proxy surface.
pub const PROXY_PREFIX: &str = "/proxy/";

/// Request header carrying the JSON header overrides.
pub const SET_HEADERS: &str = "x-set-headers";

const DELETE_MARKER: &str = "undefined";
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const TARGET_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Errors raised while forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request path does not name an HTTP(S) URL.
    #[error("invalid proxy target '{target}': {reason}")]
    InvalidTarget {
        /// Raw target text.
        target: String,
        /// Why the target was rejected.
        reason: String,
    },
    /// The upstream exchange failed.
    #[error("upstream request to '{url}' failed: {reason}")]
    Upstream {
        /// Upstream URL.
        url: String,
        /// Transport failure description.
        reason: String,
    },
    /// The blocking upstream task did not complete.
    #[error("upstream task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ProxyError {
    fn invalid(target: &str, reason: impl ToString) -> Self {
        Self::InvalidTarget {
            target: target.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/// Request forwarded to the upstream server.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute upstream URL.
    pub url: Url,
    /// Headers after rewriting.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Vec<u8>,
}

/// Response received from the upstream server.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Upstream status.
    pub status: StatusCode,
    /// Upstream headers, before rewriting.
    pub headers: HeaderMap,
    /// Fully buffered body.
    pub body: Vec<u8>,
}

/// Performs the upstream exchange. Blocking.
#[cfg_attr(test, mockall::automock)]
pub trait ProxyTransport: Send + Sync {
    /// Sends the request without following redirects.
    fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError>;
}

/// Transport backed by a cookie-keeping `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Builds the agent: no redirects, non-2xx statuses passed through.
    #[must_use]
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .max_redirects(0)
            .max_redirects_will_error(false)
            .http_status_as_error(false)
            .timeout_global(Some(UPSTREAM_TIMEOUT))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyTransport for UreqTransport {
    fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
        let url = request.url.to_string();
        let upstream_error = |reason: String| ProxyError::Upstream {
            url: url.clone(),
            reason,
        };

        let mut builder = ureq::http::Request::builder()
            .method(request.method)
            .uri(url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }
        let outcome = if request.body.is_empty() {
            let prepared = builder
                .body(())
                .map_err(|error| upstream_error(error.to_string()))?;
            self.agent.run(prepared)
        } else {
            let prepared = builder
                .body(request.body)
                .map_err(|error| upstream_error(error.to_string()))?;
            self.agent.run(prepared)
        };
        let response = outcome.map_err(|error| upstream_error(error.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let mut body = Vec::new();
        response
            .into_body()
            .as_reader()
            .read_to_end(&mut body)
            .map_err(|error| upstream_error(error.to_string()))?;
        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// Extracts the upstream URL from a proxy request URI.
pub fn target_url(uri: &Uri) -> Result<Url, ProxyError> {
    let raw = uri
        .path()
        .strip_prefix(PROXY_PREFIX)
        .ok_or_else(|| ProxyError::invalid(uri.path(), "missing /proxy/ prefix"))?;
    let mut target = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|error| ProxyError::invalid(raw, error))?
        .into_owned();
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }
    let url = Url::parse(&target).map_err(|error| ProxyError::invalid(&target, error))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::invalid(&target, "only http and https are proxied"));
    }
    Ok(url)
}

/// Builds the outbound headers from the incoming ones.
///
/// `Host`, `Content-Length`, hop-by-hop headers and `X-Set-Headers` are
/// dropped, then the overrides from `X-Set-Headers` are applied.
#[must_use]
pub fn rewrite_request(incoming: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        let dropped = name == header::HOST
            || name == header::CONTENT_LENGTH
            || name.as_str() == SET_HEADERS
            || is_hop_by_hop(name);
        if !dropped {
            headers.append(name.clone(), value.clone());
        }
    }
    if let Some(overrides) = incoming.get(SET_HEADERS) {
        apply_overrides(&mut headers, overrides);
    }
    headers
}

fn apply_overrides(headers: &mut HeaderMap, overrides: &HeaderValue) {
    let parsed = overrides
        .to_str()
        .ok()
        .and_then(|raw| serde_json::from_str::<BTreeMap<String, String>>(raw).ok());
    let Some(overrides) = parsed else {
        debug!(target: PROXY_TARGET, "ignoring malformed X-Set-Headers");
        return;
    };
    for (name, value) in overrides {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        if value == DELETE_MARKER {
            headers.remove(&name);
        } else if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

/// Builds the headers returned to the caller from the upstream ones.
#[must_use]
pub fn rewrite_response(
    upstream: &HeaderMap,
    target: &Url,
    daemon_addr: &str,
    allowed_origin: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if name != header::CONTENT_LENGTH && !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let location = upstream
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|location| target.join(location).ok());
    if let Some(location) = location {
        let proxied = proxied_url(daemon_addr, &location);
        match HeaderValue::from_str(&proxied) {
            Ok(value) => {
                headers.insert(header::LOCATION, value);
            }
            Err(error) => warn!(target: PROXY_TARGET, %error, "cannot rewrite Location"),
        }
    }
    insert_cors(&mut headers, allowed_origin);
    headers
}

/// The proxy URL reaching `target` through the daemon at `daemon_addr`.
#[must_use]
pub fn proxied_url(daemon_addr: &str, target: &Url) -> String {
    format!(
        "http://{daemon_addr}{PROXY_PREFIX}{}",
        utf8_percent_encode(target.as_str(), TARGET_ESCAPE)
    )
}

/// Headers answering a CORS preflight.
#[must_use]
pub fn preflight_headers(allowed_origin: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_cors(&mut headers, allowed_origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, X-Set-Headers"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    headers
}

fn insert_cors(headers: &mut HeaderMap, allowed_origin: &str) {
    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        Err(error) => warn!(target: PROXY_TARGET, %error, allowed_origin, "invalid allowed origin"),
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Axum handler for `/proxy/{*target}`.
pub(crate) async fn forward(
    State(state): State<DaemonState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let settings = state.settings().load();
    if method == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            preflight_headers(&settings.allowed_origin),
        )
            .into_response();
    }

    let target = match target_url(&uri) {
        Ok(target) => target,
        Err(error) => {
            warn!(target: PROXY_TARGET, %error, "rejecting proxy request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    debug!(target: PROXY_TARGET, %method, url = %target, "forwarding request");

    let request = UpstreamRequest {
        method,
        url: target.clone(),
        headers: rewrite_request(&headers),
        body: body.to_vec(),
    };
    let transport = Arc::clone(state.transport());
    let outcome = tokio::task::spawn_blocking(move || transport.send(request))
        .await
        .map_err(ProxyError::from)
        .and_then(|result| result);

    match outcome {
        Ok(upstream) => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = rewrite_response(
                &upstream.headers,
                &target,
                &settings.daemon_addr,
                &settings.allowed_origin,
            );
            response
        }
        Err(error) => {
            warn!(target: PROXY_TARGET, %error, "upstream exchange failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
