//! Request and response envelopes.
//!
//! A [`RequestEnvelope`] carries the serialized content of one call together
//! with its headers, credential, endpoint label and client metadata. Request
//! content is a [`Content`] sum type, so a request is JSON *or* multipart and
//! never both.
//!
//! A [`ResponseEnvelope`] wraps the backend reply
//! `{"rc", "result", "error"}`. Its [`Outcome`] is likewise a sum type: a
//! result and an error can never be held at the same time.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::{codes, AuthToken, Data, ErrorModel, Serializer, UserId};

/// Header carrying `{"user", "token"}` for the backend.
pub const AUTH_HEADER: &str = "x-app-auth";
/// Header carrying the URL of the page issuing the call.
pub const APP_URL_HEADER: &str = "x-app-url";
/// Header carrying the client language.
pub const LANG_HEADER: &str = "x-app-lang";
pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const ACCEPT_HEADER: &str = "accept";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Result code of a successful response.
pub const RC_OK: &str = "OK";
/// Generic result code of a failed response.
pub const RC_ERR: &str = "ERR";

// ---------------------------------------------------------------------------
// Credential and client metadata
// ---------------------------------------------------------------------------

/// Identity stamped on a request. Either part may be absent (anonymous).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// Signed-in user, if any.
    pub user: Option<UserId>,
    /// Session token issued at login, if any.
    pub token: Option<AuthToken>,
}

impl Credential {
    pub fn new(user: Option<UserId>, token: Option<AuthToken>) -> Self {
        Self { user, token }
    }

    /// `{"user": <id|null>, "token": <token|null>}` as sent in [`AUTH_HEADER`].
    pub fn header_value(&self) -> String {
        json!({
            "user": self.user.as_ref().map(UserId::as_str),
            "token": self.token.as_ref().map(AuthToken::expose),
        })
        .to_string()
    }
}

/// Client metadata forwarded as headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Sent as `x-app-url`.
    pub app_url: Option<String>,
    /// Sent as `x-app-lang`.
    pub lang: Option<String>,
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Request content mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`.
    Json,
    /// `multipart/form-data`.
    Multipart,
}

/// One non-`content` field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    /// A plain text field.
    Text { name: String, value: String },
    /// A file upload.
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Multipart form: a JSON payload sent as the `content` field plus
/// text and binary attachment fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    content: Value,
    parts: Vec<FormPart>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the JSON payload sent in the `content` field.
    #[must_use]
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    #[must_use]
    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn with_file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        });
        self
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    /// The payload as JSON text, as it goes into the `content` field.
    pub fn content_string(&self) -> String {
        self.content.to_string()
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn has_files(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, FormPart::File { .. }))
    }
}

/// Request content: JSON or multipart, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Sent as `{"content": ...}`.
    Json(Value),
    /// Sent as a multipart form with `content` as its first part.
    Multipart(FormData),
}

impl Default for Content {
    fn default() -> Self {
        Content::Json(Value::Null)
    }
}

impl Content {
    pub fn content_type(&self) -> ContentType {
        match self {
            Content::Json(_) => ContentType::Json,
            Content::Multipart(_) => ContentType::Multipart,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestEnvelope
// ---------------------------------------------------------------------------

/// Transport wrapper for one outgoing call.
#[derive(Debug, Clone, Default)]
pub struct RequestEnvelope {
    headers: BTreeMap<String, String>,
    content: Content,
    credential: Option<Credential>,
    endpoint: Option<String>,
    external: bool,
}

impl RequestEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// An envelope labelled with the logical endpoint name (used in logs).
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    // -----------------------------------------------------------------------
    // Headers
    // -----------------------------------------------------------------------

    /// Sets a header. Names are case-insensitive.
    ///
    /// `content-type` is derived from the content mode and cannot be set
    /// here; use [`RequestEnvelope::set_content_type`].
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        if name == CONTENT_TYPE_HEADER {
            tracing::debug!("content-type header ignored; it follows the content mode");
            return;
        }
        self.headers.insert(name, value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        if name == CONTENT_TYPE_HEADER {
            return match self.content {
                Content::Json(_) => Some(JSON_CONTENT_TYPE),
                // Boundary is chosen by the HTTP client.
                Content::Multipart(_) => None,
            };
        }
        self.headers.get(&name).map(String::as_str)
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(&name.to_ascii_lowercase())
    }

    /// Explicitly set headers, lowercased, in name order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    /// Switches the content mode. Switching discards the other mode's
    /// content; keeping the same mode is a no-op.
    pub fn set_content_type(&mut self, content_type: ContentType) {
        if self.content.content_type() == content_type {
            return;
        }
        self.content = match content_type {
            ContentType::Json => Content::Json(Value::Null),
            ContentType::Multipart => Content::Multipart(FormData::new()),
        };
    }

    pub fn content_type(&self) -> ContentType {
        self.content.content_type()
    }

    /// Sets already-serialized JSON content, replacing any form data.
    pub fn set_content(&mut self, json: Value) {
        self.content = Content::Json(json);
    }

    /// Serializes `data` and sets it as JSON content.
    pub fn set_data(&mut self, data: &Data) {
        self.set_content(data.to_json());
    }

    /// Sets multipart form data, replacing any JSON content.
    pub fn set_form_data(&mut self, form: FormData) {
        self.content = Content::Multipart(form);
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn json_content(&self) -> Option<&Value> {
        match &self.content {
            Content::Json(value) => Some(value),
            Content::Multipart(_) => None,
        }
    }

    pub fn form_data(&self) -> Option<&FormData> {
        match &self.content {
            Content::Multipart(form) => Some(form),
            Content::Json(_) => None,
        }
    }

    /// `true` when JSON content other than `null` is set.
    pub fn has_json_content(&self) -> bool {
        self.json_content().is_some_and(|value| !value.is_null())
    }

    pub fn has_form_data(&self) -> bool {
        self.form_data().is_some()
    }

    /// Decodes the content payload through `serializer`.
    pub fn get_content(&self, serializer: &Serializer) -> Data {
        match &self.content {
            Content::Json(value) => serializer.deserialize(value.clone()),
            Content::Multipart(form) => serializer.deserialize(form.content.clone()),
        }
    }

    /// The JSON request body, `{"content": ...}`, for JSON mode.
    pub fn json_body(&self) -> Option<Value> {
        self.json_content()
            .map(|content| json!({ "content": content }))
    }

    // -----------------------------------------------------------------------
    // Credential, endpoint, client metadata
    // -----------------------------------------------------------------------

    /// Records the credential and stamps [`AUTH_HEADER`].
    pub fn set_credential(&mut self, user: Option<UserId>, token: Option<AuthToken>) {
        let credential = Credential::new(user, token);
        self.headers
            .insert(AUTH_HEADER.to_string(), credential.header_value());
        self.credential = Some(credential);
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = Some(endpoint.into());
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Stamps [`APP_URL_HEADER`] and [`LANG_HEADER`] from `info`.
    pub fn set_client_info(&mut self, info: &ClientInfo) {
        if let Some(url) = &info.app_url {
            self.set_header(APP_URL_HEADER, url.as_str());
        }
        if let Some(lang) = &info.lang {
            self.set_header(LANG_HEADER, lang.as_str());
        }
    }

    /// Flags a call to a third-party host: no ambient credentials and no
    /// [`AUTH_HEADER`].
    pub fn mark_external(&mut self) {
        self.external = true;
    }

    pub fn is_external(&self) -> bool {
        self.external
    }
}

// ---------------------------------------------------------------------------
// ResponseEnvelope
// ---------------------------------------------------------------------------

/// Either the result value or the error of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The raw `result` value, possibly `null`.
    Ok(Value),
    /// The decoded `error` record.
    Err(ErrorModel),
}

/// Transport wrapper for one backend reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    rc: String,
    outcome: Outcome,
}

impl Default for ResponseEnvelope {
    fn default() -> Self {
        Self {
            rc: RC_OK.to_string(),
            outcome: Outcome::Ok(Value::Null),
        }
    }
}

impl ResponseEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A successful response carrying `result`.
    pub fn ok(result: Value) -> Self {
        let mut response = Self::new();
        response.set_result(result, None);
        response
    }

    /// A failed response carrying `error`.
    pub fn error(error: ErrorModel) -> Self {
        let mut response = Self::new();
        response.set_error(error);
        response
    }

    /// Sets the result, clearing any error. `code` defaults to [`RC_OK`].
    pub fn set_result(&mut self, result: Value, code: Option<&str>) {
        self.set_outcome(Outcome::Ok(result), code.unwrap_or(RC_OK));
    }

    /// Sets the error, clearing any result. The result code becomes the
    /// error code.
    pub fn set_error(&mut self, error: ErrorModel) {
        let rc = error.code().to_string();
        self.set_outcome(Outcome::Err(error), &rc);
    }

    fn set_outcome(&mut self, outcome: Outcome, rc: &str) {
        self.rc = rc.to_string();
        self.outcome = outcome;
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok(_))
    }

    pub fn result_code(&self) -> &str {
        &self.rc
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Ok(value) => Some(value),
            Outcome::Err(_) => None,
        }
    }

    /// The result, or `default` when the response is an error or the result
    /// is `null`.
    pub fn get_result(&self, default: Value) -> Value {
        match self.result() {
            Some(value) if !value.is_null() => value.clone(),
            _ => default,
        }
    }

    /// Decodes the result through `serializer`; errors decode to null.
    pub fn result_data(&self, serializer: &Serializer) -> Data {
        self.result()
            .map_or(Data::Null, |value| serializer.deserialize(value.clone()))
    }

    pub fn get_error(&self) -> Option<&ErrorModel> {
        match &self.outcome {
            Outcome::Err(error) => Some(error),
            Outcome::Ok(_) => None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.get_error().is_some()
    }

    pub fn into_result(self) -> Result<Value, ErrorModel> {
        match self.outcome {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(error) => Err(error),
        }
    }

    // -----------------------------------------------------------------------
    // Wire form
    // -----------------------------------------------------------------------

    /// Reads a backend reply body.
    ///
    /// A populated `error` wins over any `result`. A non-`OK` `rc` without
    /// an error record becomes an error carrying that code (`ERR` maps to
    /// [`codes::UNKNOWN`]). A body that is not an envelope object is taken
    /// as a bare result.
    pub fn from_wire(body: Value) -> Self {
        let mut map = match body {
            Value::Object(map) if is_envelope(&map) => map,
            bare => {
                tracing::debug!("response body is not an envelope; using it as the result");
                return Self::ok(bare);
            }
        };

        let rc = map
            .get("rc")
            .and_then(Value::as_str)
            .filter(|rc| !rc.is_empty())
            .unwrap_or(RC_OK)
            .to_string();
        let result = map.remove("result").unwrap_or(Value::Null);
        let error = map.remove("error").filter(|e| !e.is_null());

        if let Some(error) = error {
            if !result.is_null() {
                tracing::warn!(rc = %rc, "response carries both result and error; error wins");
            }
            let mut response = Self::error(ErrorModel::from_json(&error));
            if rc != RC_OK && rc != RC_ERR {
                response.rc = rc;
            }
            return response;
        }

        match rc.as_str() {
            RC_OK => {
                let mut response = Self::ok(result);
                response.rc = rc;
                response
            }
            RC_ERR => Self::error(ErrorModel::new(codes::UNKNOWN, "rc ERR without error record")),
            code => Self::error(ErrorModel::from_code(code)),
        }
    }

    /// The reply body this envelope represents.
    pub fn to_wire(&self) -> Value {
        match &self.outcome {
            Outcome::Ok(result) => json!({ "rc": self.rc, "result": result, "error": null }),
            Outcome::Err(error) => {
                json!({ "rc": self.rc, "result": null, "error": error.to_json() })
            }
        }
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    ["rc", "result", "error"]
        .iter()
        .any(|key| map.contains_key(*key))
}
