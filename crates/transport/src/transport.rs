//! One HTTP call per envelope, one [`ErrorModel`] per failure.

use std::sync::Arc;

use objects::envelope::{
    ACCEPT_HEADER, APP_URL_HEADER, AUTH_HEADER, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, LANG_HEADER,
};
use objects::{Content, Credential, ErrorModel, RequestEnvelope, ResponseEnvelope, Session};
use reqwest::Url;
use serde_json::{json, Value};
use tracing::Instrument;

use crate::{ClientConfig, CredentialsMode, HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse};

/// Executes envelopes against the backend and owns the session
/// invalidation policy.
#[derive(Clone)]
pub struct Transport {
    config: Arc<ClientConfig>,
    client: Arc<dyn HttpClient>,
    session: Arc<dyn Session>,
}

impl Transport {
    pub fn new(
        config: Arc<ClientConfig>,
        client: Arc<dyn HttpClient>,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            config,
            client,
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    /// Sends `request` and normalises the reply.
    ///
    /// - Connection failures, timeouts and HTTP >= 500 return `Err` with a
    ///   network-class code.
    /// - 2xx and 4xx bodies are returned as a [`ResponseEnvelope`], which may
    ///   carry a business error. A 4xx without an error record gets one
    ///   synthesized from its status line.
    /// - An error code in [`objects::codes::SESSION_INVALIDATING`] clears the
    ///   session once before returning.
    pub async fn send(
        &self,
        method: HttpMethod,
        url: Url,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, ErrorModel> {
        let span = tracing::info_span!(
            "transport.send",
            method = %method,
            url = %url,
            endpoint = request.endpoint().unwrap_or("-"),
        );
        async move {
            let http = self.encode(method, url, request);
            let outcome = match self.client.execute(http).await {
                Ok(response) => self.decode(response),
                Err(failure) => {
                    tracing::warn!(error = %failure, "request failed before a response");
                    Err(ErrorModel::from(failure))
                }
            };

            let error = match &outcome {
                Ok(response) => response.get_error(),
                Err(error) => Some(error),
            };
            if let Some(error) = error.filter(|e| e.invalidates_session()) {
                tracing::info!(code = %error.code(), "backend rejected the session; clearing it");
                self.session.clear();
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// [`Transport::send`] collapsed to the result value or the error.
    pub async fn call(
        &self,
        method: HttpMethod,
        url: Url,
        request: &RequestEnvelope,
    ) -> Result<Value, ErrorModel> {
        self.send(method, url, request).await?.into_result()
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    fn encode(&self, method: HttpMethod, url: Url, request: &RequestEnvelope) -> HttpRequest {
        let external = request.is_external();
        let mut headers: Vec<(String, String)> = request
            .headers()
            .filter(|(name, _)| !(external && *name == AUTH_HEADER))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let credential = if external {
            None
        } else {
            Some(
                request
                    .credential()
                    .cloned()
                    .unwrap_or_else(|| self.session.credential()),
            )
        };
        if let Some(credential) = &credential {
            set_default(&mut headers, AUTH_HEADER, || credential.header_value());
        }

        let info = self.config.client_info();
        if let Some(app_url) = info.app_url {
            set_default(&mut headers, APP_URL_HEADER, || app_url);
        }
        if let Some(lang) = info.lang {
            set_default(&mut headers, LANG_HEADER, || lang);
        }
        set_default(&mut headers, ACCEPT_HEADER, || JSON_CONTENT_TYPE.to_string());

        let body = match request.content() {
            Content::Json(Value::Null) => HttpBody::Empty,
            Content::Json(content) => {
                headers.push((CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string()));
                HttpBody::Json(json!({ "content": content }))
            }
            Content::Multipart(form) => {
                let mut form = form.clone();
                if let Some(credential) = &credential {
                    form = stamp_form_credential(form, credential);
                }
                HttpBody::Multipart(form)
            }
        };

        HttpRequest {
            method,
            url,
            headers,
            body,
            credentials: if external {
                CredentialsMode::Omit
            } else {
                CredentialsMode::SameOrigin
            },
            timeout: Some(self.config.request_timeout()),
        }
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    fn decode(&self, response: HttpResponse) -> Result<ResponseEnvelope, ErrorModel> {
        let status = response.status;
        if status >= 500 {
            tracing::warn!(status, "server failure");
            return Err(ErrorModel::from_http_response(
                status,
                response.reason.as_deref(),
                None,
            ));
        }

        let body = match response.parse_body() {
            None => None,
            Some(Ok(json)) => Some(json),
            Some(Err(e)) if response.is_success() => {
                tracing::warn!(status, error = %e, "undecodable response body");
                return Err(ErrorModel::bad_response(format!(
                    "response body is not JSON: {e}"
                )));
            }
            Some(Err(e)) => {
                tracing::debug!(status, error = %e, "ignoring non-JSON error body");
                None
            }
        };

        if response.is_success() {
            return Ok(body.map_or_else(|| ResponseEnvelope::ok(Value::Null), ResponseEnvelope::from_wire));
        }

        let synthesized = |body: Option<&Value>| {
            ResponseEnvelope::error(ErrorModel::from_http_response(
                status,
                response.reason.as_deref(),
                body,
            ))
        };
        let envelope = match body {
            Some(json) => {
                let envelope = ResponseEnvelope::from_wire(json.clone());
                if envelope.has_error() {
                    envelope
                } else {
                    synthesized(Some(&json))
                }
            }
            None => synthesized(None),
        };
        tracing::debug!(status, rc = envelope.result_code(), "request rejected");
        Ok(envelope)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn set_default(headers: &mut Vec<(String, String)>, name: &str, value: impl FnOnce() -> String) {
    if !headers.iter().any(|(n, _)| n == name) {
        headers.push((name.to_string(), value()));
    }
}

/// Multipart bodies carry the identity as form fields as well as the header.
/// Fields the caller already set are left alone.
fn stamp_form_credential(
    form: objects::FormData,
    credential: &Credential,
) -> objects::FormData {
    let has_part = |form: &objects::FormData, name: &str| {
        form.parts().iter().any(|part| part.name() == name)
    };
    let mut form = form;
    if let Some(user) = &credential.user {
        if !has_part(&form, "user") {
            form = form.with_text("user", user.as_str());
        }
    }
    if let Some(token) = &credential.token {
        if !has_part(&form, "token") {
            form = form.with_text("token", token.expose());
        }
    }
    form
}
