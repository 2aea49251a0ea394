//! The HTTP client port and its `reqwest` implementation.
//!
//! [`Transport`](crate::Transport) never touches `reqwest` directly: it hands a
//! fully encoded [`HttpRequest`] to an [`HttpClient`] and receives the raw
//! status line and body back. Tests substitute an in-memory client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use objects::{codes, ErrorModel, FormData, FormPart};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde_json::Value;
use thiserror::Error;

use crate::ConfigError;

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// HTTP verbs used by the backend endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Reads; never carries a body.
    Get,
    /// Creates, and actions such as like or follow.
    Post,
    /// Replaces a stored object.
    Put,
    /// Partially updates a stored object.
    Patch,
    /// Removes an object or undoes an action.
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cookie jar a request may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    /// Ambient credentials (cookies) of the API host are attached.
    SameOrigin,
    /// No ambient credentials; used for third-party hosts.
    Omit,
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    /// No body and no `content-type`.
    Empty,
    /// `{"content": ...}` sent as `application/json`.
    Json(Value),
    /// A multipart form; the client picks the boundary.
    Multipart(FormData),
}

/// One fully encoded HTTP call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request verb.
    pub method: HttpMethod,
    /// Absolute target URL, query included.
    pub url: Url,
    /// Lowercased header names, in the order they are sent.
    pub headers: Vec<(String, String)>,
    /// Encoded payload.
    pub body: HttpBody,
    /// Whether the API host's cookies may be attached.
    pub credentials: CredentialsMode,
    /// Overall deadline for the call; `None` leaves it to the client.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw status line and body of a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase, when the server sent one.
    pub reason: Option<String>,
    /// Raw body bytes; may be empty.
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            reason: None,
            body: body.into(),
        }
    }

    /// A response whose body is `json`.
    pub fn json(status: u16, json: &Value) -> Self {
        Self::new(status, json.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn has_body(&self) -> bool {
        self.body.iter().any(|b| !b.is_ascii_whitespace())
    }

    /// Parses the body. `None` when the body is empty.
    pub fn parse_body(&self) -> Option<Result<Value, serde_json::Error>> {
        self.has_body().then(|| serde_json::from_slice(&self.body))
    }
}

/// Raw client failure, before classification into an [`ErrorModel`].
#[derive(Debug, Error)]
pub enum HttpFailure {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    /// The request could not be encoded (bad header value, bad MIME type).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<HttpFailure> for ErrorModel {
    fn from(failure: HttpFailure) -> Self {
        let code = match &failure {
            HttpFailure::Timeout => codes::TIMEOUT,
            HttpFailure::Connect(_) | HttpFailure::Request(_) => codes::NETWORK,
            HttpFailure::InvalidRequest(_) => codes::INVALID_ARG,
        };
        ErrorModel::new(code, failure.to_string())
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Executes one encoded HTTP call.
///
/// Implementations return `Ok` for every response that has a status line,
/// whatever the status. `Err` is reserved for calls that never got one.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// [`HttpClient`] over `reqwest`.
///
/// Holds two connection pools: one with a cookie store for
/// [`CredentialsMode::SameOrigin`] calls and one without for
/// [`CredentialsMode::Omit`].
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    with_cookies: reqwest::Client,
    anonymous: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, ConfigError> {
        let with_cookies = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ConfigError::HttpClient)?;
        let anonymous = reqwest::Client::builder()
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            with_cookies,
            anonymous,
        })
    }

    fn pool(&self, mode: CredentialsMode) -> &reqwest::Client {
        match mode {
            CredentialsMode::SameOrigin => &self.with_cookies,
            CredentialsMode::Omit => &self.anonymous,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.pool(request.credentials).request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Json(body) => builder.json(&body),
            HttpBody::Multipart(form) => builder.multipart(multipart_form(form)?),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(classify)?;
        tracing::debug!(status = status.as_u16(), bytes = bytes.len(), "response received");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body: bytes.to_vec(),
        })
    }
}

/// The `content` field first, then attachments in insertion order.
fn multipart_form(form: FormData) -> Result<Form, HttpFailure> {
    let mut multipart = Form::new().text("content", form.content_string());
    for part in form.parts() {
        multipart = match part {
            FormPart::Text { name, value } => multipart.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let file = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)
                    .map_err(|e| HttpFailure::InvalidRequest(e.to_string()))?;
                multipart.part(name.clone(), file)
            }
        };
    }
    Ok(multipart)
}

fn classify(error: reqwest::Error) -> HttpFailure {
    if error.is_timeout() {
        HttpFailure::Timeout
    } else if error.is_connect() {
        HttpFailure::Connect(error.to_string())
    } else if error.is_builder() {
        HttpFailure::InvalidRequest(error.to_string())
    } else {
        HttpFailure::Request(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failures_classify_into_the_network_family() {
        assert!(ErrorModel::from(HttpFailure::Timeout).is(codes::TIMEOUT));
        assert!(ErrorModel::from(HttpFailure::Connect("refused".into())).is_network());
        assert!(ErrorModel::from(HttpFailure::InvalidRequest("bad".into())).is(codes::INVALID_ARG));
    }

    #[test]
    fn blank_bodies_are_not_parsed() {
        assert!(HttpResponse::new(401, "  \n").parse_body().is_none());
        let response = HttpResponse::json(200, &json!({ "rc": "OK" }));
        assert_eq!(response.parse_body().unwrap().unwrap(), json!({ "rc": "OK" }));
        assert!(HttpResponse::new(200, "<html>").parse_body().unwrap().is_err());
    }

    #[test]
    fn request_headers_are_case_insensitive() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: Url::parse("https://api.example/").unwrap(),
            headers: vec![("accept".into(), "application/json".into())],
            body: HttpBody::Empty,
            credentials: CredentialsMode::SameOrigin,
            timeout: None,
        };
        assert_eq!(request.header("Accept"), Some("application/json"));
    }

    #[test]
    fn multipart_rejects_malformed_mime() {
        let form = FormData::new().with_file("file", "a.png", "not a mime", vec![1]);
        assert!(matches!(
            multipart_form(form),
            Err(HttpFailure::InvalidRequest(_))
        ));
    }
}
