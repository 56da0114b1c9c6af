#![forbid(unsafe_code)]

//! Wire-level plumbing for the Books proxy parity harness.
//!
//! Two request envelopes exist for the same logical operation: the mediated
//! envelope (a uniform JSON-over-HTTP POST addressed by an `Action` header)
//! and the direct envelope (the upstream REST path with query-string
//! authentication). Everything above this crate treats both as opaque
//! request/response pairs behind the [`Transport`] seam.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ACTION_HEADER: &str = "Action";
pub const ACCEPT_CHARSET: &str = "UTF-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Externally supplied endpoint configuration: both base URLs plus the
/// query-string credentials the direct envelope carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub proxy_url: String,
    pub api_base_url: String,
    pub auth_token: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Action-header-addressed call through the mediation proxy. Always a POST
/// with a JSON body; the operation is selected server-side from the
/// `Action: urn:<operation>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediatedRequest {
    pub url: String,
    pub action: String,
    pub body: Value,
}

impl MediatedRequest {
    #[must_use]
    pub fn new(endpoints: &Endpoints, operation: &str, body: Value) -> Self {
        Self {
            url: endpoints.proxy_url.clone(),
            action: format!("urn:{operation}"),
            body,
        }
    }
}

/// Native REST call against the upstream API. Authentication travels in the
/// query string; creates are POSTs, reads are GETs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl DirectRequest {
    /// Builds a direct request for `/api/v3/<resource_path>` with the auth
    /// pair first and `extra` filters appended in declaration order.
    #[must_use]
    pub fn new(
        endpoints: &Endpoints,
        method: HttpMethod,
        resource_path: &str,
        extra: Vec<(String, String)>,
    ) -> Self {
        let mut query = vec![
            ("authtoken".to_string(), endpoints.auth_token.clone()),
            (
                "organizer_id".to_string(),
                endpoints.organization_id.clone(),
            ),
        ];
        query.extend(extra);
        Self {
            method,
            url: format!(
                "{}/api/v3/{}",
                endpoints.api_base_url.trim_end_matches('/'),
                resource_path
            ),
            query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireRequest {
    Mediated(MediatedRequest),
    Direct(DirectRequest),
}

impl WireRequest {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Mediated(req) => format!("POST {} [{}]", req.url, req.action),
            Self::Direct(req) => format!("{} {}", req.method.as_str(), req.url),
        }
    }
}

/// Status code plus parsed JSON body. Error responses are bodies too; the
/// harness asserts over them the same way it asserts over success bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub body: Value,
}

impl WireResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    ConnectionFailed(String),
    MalformedBody { status: u16, detail: String },
    Http(String),
}

impl TransportError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Timeout => "transport_timeout",
            Self::ConnectionFailed(_) => "transport_connection_failed",
            Self::MalformedBody { .. } => "transport_malformed_body",
            Self::Http(_) => "transport_http",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::ConnectionFailed(detail) => write!(f, "connection failed: {detail}"),
            Self::MalformedBody { status, detail } => {
                write!(f, "response body is not JSON (status {status}): {detail}")
            }
            Self::Http(detail) => write!(f, "http error: {detail}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// The seam between the harness and the network. Production runs use
/// [`HttpTransport`]; tests drive the harness with an in-memory double.
pub trait Transport {
    fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError>;
}

/// Blocking reqwest-backed transport with a per-call timeout. No retries:
/// a failed call is a deterministic test failure for its case.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        log::debug!("sending {}", request.describe());
        let builder = match request {
            WireRequest::Mediated(req) => self
                .client
                .post(&req.url)
                .header(ACTION_HEADER, &req.action)
                .header("Accept-Charset", ACCEPT_CHARSET)
                .header("Content-Type", CONTENT_TYPE_JSON)
                .header("Accept", CONTENT_TYPE_JSON)
                .json(&req.body),
            WireRequest::Direct(req) => {
                let builder = match req.method {
                    HttpMethod::Get => self.client.get(&req.url),
                    HttpMethod::Post => self.client.post(&req.url),
                };
                builder
                    .query(&req.query)
                    .header("Accept-Charset", ACCEPT_CHARSET)
                    .header("Content-Type", CONTENT_TYPE_JSON)
                    .header("Accept", CONTENT_TYPE_JSON)
            }
        };

        let response = builder.send().map_err(Self::classify)?;
        let status = response.status().as_u16();
        let text = response.text().map_err(Self::classify)?;
        let body =
            serde_json::from_str(&text).map_err(|err| TransportError::MalformedBody {
                status,
                detail: err.to_string(),
            })?;
        log::debug!("{} -> status {status}", request.describe());
        Ok(WireResponse { status, body })
    }
}
