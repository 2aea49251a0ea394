//! The caller-visible error model and the internal model errors.
//!
//! [`ErrorModel`] is the single failure shape every operation hands back: a
//! stable [`ErrorCode`] plus an informational message and positional args.
//! It can be built from three sources that converge on the same shape:
//!
//! - [`ErrorModel::from_error`]: a native Rust error (walks the source chain),
//! - [`ErrorModel::from_http_response`]: an HTTP status line and optional body,
//! - [`ErrorModel::from_json`]: a plain JSON error record.
//!
//! [`ModelError`] covers misuse of the object model itself (reserved field
//! names, id reassignment, ambiguous registrations). It converts into an
//! [`ErrorModel`] carrying [`codes::INVALID_ARG`].

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::ErrorCode;

// ---------------------------------------------------------------------------
// Well-known codes
// ---------------------------------------------------------------------------

/// Well-known error codes.
///
/// Servers may emit codes not listed here; they are carried through verbatim.
pub mod codes {
    /// Last-resort sentinel when no code can be recovered.
    pub const UNKNOWN: &str = "E_UNKNOWN";
    /// Local argument validation failed; no request was sent.
    pub const INVALID_ARG: &str = "E_INVALID_ARG";
    /// The operation needs a signed-in session and there is none.
    pub const NOT_LOGGED_IN: &str = "E_NOT_LOGGED_IN";

    /// Connection could not be established or was dropped.
    pub const NETWORK: &str = "E_NETWORK";
    /// The request or an upload watchdog timed out.
    pub const TIMEOUT: &str = "E_TIMEOUT";
    /// HTTP 5xx. Server detail is not trusted.
    pub const SYSTEM: &str = "E_SYSTEM";
    /// The response body could not be decoded into the expected shape.
    pub const BAD_RESPONSE: &str = "E_BAD_RESPONSE";

    /// Authentication rejected by the backend.
    pub const AUTH: &str = "E_AUTH";
    /// The session token is no longer valid.
    pub const INVALID_SESSION: &str = "E_INVALID_SESSION";
    /// Authenticated but not permitted (HTTP 403).
    pub const FORBIDDEN: &str = "E_FORBIDDEN";
    /// HTTP 404.
    pub const NOT_FOUND: &str = "E_NOT_FOUND";
    /// HTTP 400 without a structured body.
    pub const BAD_REQUEST: &str = "E_BAD_REQUEST";
    /// Any other 4xx without a structured body.
    pub const CLIENT: &str = "E_CLIENT";

    /// Codes that make the transport clear the local session before the
    /// error is handed back.
    pub const SESSION_INVALIDATING: [&str; 2] = [AUTH, INVALID_SESSION];

    /// Codes of the network/system class.
    pub const NETWORK_CLASS: [&str; 3] = [NETWORK, TIMEOUT, SYSTEM];
}

// ---------------------------------------------------------------------------
// ErrorLike
// ---------------------------------------------------------------------------

/// Anything an error code can be recovered from.
///
/// Implemented for [`ErrorModel`], plain JSON records and native error chains
/// so callers can classify any of them through [`code_of`].
pub trait ErrorLike {
    /// Returns the error code if this value carries one.
    fn error_code(&self) -> Option<ErrorCode>;
}

impl ErrorLike for ErrorModel {
    fn error_code(&self) -> Option<ErrorCode> {
        Some(self.code.clone())
    }
}

/// Reads the same records [`ErrorModel::from_http_response`] unwraps: a bare
/// code string, `{"code", ...}` or either of those under `"error"`.
impl ErrorLike for Value {
    fn error_code(&self) -> Option<ErrorCode> {
        let record = match self {
            Value::String(_) => self,
            _ => error_record(self)?,
        };
        Some(ErrorModel::from_json(record).code)
    }
}

impl ErrorLike for dyn std::error::Error + 'static {
    fn error_code(&self) -> Option<ErrorCode> {
        Some(ErrorModel::from_error(self).code)
    }
}

impl ErrorLike for dyn std::error::Error + Send + Sync + 'static {
    fn error_code(&self) -> Option<ErrorCode> {
        Some(ErrorModel::from_error(self).code)
    }
}

/// Classifies any error-like value, falling back to [`codes::UNKNOWN`].
pub fn code_of<E: ErrorLike + ?Sized>(error: &E) -> ErrorCode {
    error
        .error_code()
        .unwrap_or_else(|| ErrorCode::from_static(codes::UNKNOWN))
}

fn find_in_chain<'a>(error: &'a (dyn std::error::Error + 'static)) -> Option<&'a ErrorModel> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(model) = err.downcast_ref::<ErrorModel>() {
            return Some(model);
        }
        // io::Error::source() skips its own payload.
        if let Some(model) = err
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::get_ref)
            .and_then(|inner| inner.downcast_ref::<ErrorModel>())
        {
            return Some(model);
        }
        current = err.source();
    }
    None
}

// ---------------------------------------------------------------------------
// ErrorModel
// ---------------------------------------------------------------------------

/// Typed, serializable error handed back by every operation.
///
/// Equality is code-based; `message` and `args` are informational.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{code}: {}", .message.as_deref().unwrap_or("no message"))]
pub struct ErrorModel {
    code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<Value>,
}

impl PartialEq for ErrorModel {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for ErrorModel {}

impl ErrorModel {
    /// Canonical constructor. An empty code becomes [`codes::UNKNOWN`].
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: ErrorCode::new(code).unwrap_or_else(|| ErrorCode::from_static(codes::UNKNOWN)),
            message: if message.is_empty() {
                None
            } else {
                Some(message)
            },
            args: Vec::new(),
        }
    }

    /// Builds an error with only a code.
    pub fn from_code(code: impl Into<String>) -> Self {
        Self::new(code, "")
    }

    /// Appends positional arguments used by callers to format messages.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    /// Local validation failure; never sent to the network.
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ARG, message)
    }

    /// The payload could not be decoded.
    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_RESPONSE, message)
    }

    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns `true` if this error carries `code`.
    pub fn is(&self, code: &str) -> bool {
        self.code.as_str() == code
    }

    pub fn is_not(&self, code: &str) -> bool {
        !self.is(code)
    }

    /// Returns `true` for codes in [`codes::SESSION_INVALIDATING`].
    pub fn invalidates_session(&self) -> bool {
        codes::SESSION_INVALIDATING.contains(&self.code.as_str())
    }

    /// Returns `true` for network/system failures (connection, timeout, 5xx).
    pub fn is_network(&self) -> bool {
        codes::NETWORK_CLASS.contains(&self.code.as_str())
    }

    // -----------------------------------------------------------------------
    // Construction paths
    // -----------------------------------------------------------------------

    /// Converts a native error.
    ///
    /// An [`ErrorModel`] anywhere in the source chain is returned as-is; I/O
    /// timeouts and connection failures map to the network class; anything
    /// else becomes [`codes::UNKNOWN`] carrying the error text.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(model) = find_in_chain(error) {
            return model.clone();
        }
        let mut current = Some(error);
        while let Some(err) = current {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                use std::io::ErrorKind;
                let code = match io.kind() {
                    ErrorKind::TimedOut => codes::TIMEOUT,
                    ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::BrokenPipe => codes::NETWORK,
                    _ => codes::UNKNOWN,
                };
                return Self::new(code, error.to_string());
            }
            current = err.source();
        }
        Self::new(codes::UNKNOWN, error.to_string())
    }

    /// Converts an HTTP failure.
    ///
    /// A 4xx response with a body is assumed to carry a server-emitted error
    /// record (either bare or under `"error"`) and is unwrapped directly. Any
    /// other status, or a 4xx whose body holds no record, is synthesized from
    /// the status line.
    pub fn from_http_response(status: u16, reason: Option<&str>, body: Option<&Value>) -> Self {
        if (400..500).contains(&status) {
            if let Some(record) = body.and_then(error_record) {
                return Self::from_json(record);
            }
        }

        let code = match status {
            400 => codes::BAD_REQUEST,
            401 => codes::AUTH,
            403 => codes::FORBIDDEN,
            404 => codes::NOT_FOUND,
            408 => codes::TIMEOUT,
            402..=499 => codes::CLIENT,
            500..=599 => codes::SYSTEM,
            _ => codes::UNKNOWN,
        };
        let message = match reason {
            Some(reason) if !reason.is_empty() => format!("HTTP {status} {reason}"),
            _ => format!("HTTP {status}"),
        };
        Self::new(code, message).with_args([json!(status)])
    }

    /// Converts a plain JSON error record (`{"code", "message"?, "args"?}`).
    ///
    /// A bare string is taken as the code. Anything without a recoverable
    /// code becomes [`codes::UNKNOWN`].
    pub fn from_json(json: &Value) -> Self {
        match json {
            Value::String(code) => Self::from_code(code.as_str()),
            Value::Object(map) => {
                let code = map
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or(codes::UNKNOWN);
                let message = map.get("message").and_then(Value::as_str).unwrap_or("");
                let args = match map.get("args") {
                    Some(Value::Array(items)) => items.clone(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(single) => vec![single.clone()],
                };
                Self::new(code, message).with_args(args)
            }
            _ => Self::from_code(codes::UNKNOWN),
        }
    }

    /// Returns the wire form (`{"code", "message"?, "args"?}`).
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "code": self.code }))
    }
}

/// Finds an error record in a 4xx body: `{"error": {...}}` or a bare record.
fn error_record(body: &Value) -> Option<&Value> {
    match body.get("error") {
        Some(inner @ Value::Object(_)) => Some(inner),
        Some(inner @ Value::String(_)) => Some(inner),
        _ if body.get("code").is_some_and(Value::is_string) => Some(body),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Object model errors
// ---------------------------------------------------------------------------

/// Misuse of the object model or type registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The field name is reserved for the wire format (`_t`, `_aux`, `id`).
    #[error("field '{field}' is reserved")]
    ReservedField {
        /// The rejected field name.
        field: String,
    },

    /// An object's id was already assigned to a different value.
    #[error("object id is immutable (already '{existing}')")]
    IdAlreadySet {
        /// The id the object already carries.
        existing: String,
    },

    /// The concrete type is already registered under a different tag.
    #[error("type {type_name} is already registered as '{existing_tag}', cannot also register '{tag}'")]
    AmbiguousType {
        /// Tag being registered.
        tag: String,
        /// Tag the type is already registered under.
        existing_tag: String,
        /// Rust type name of the factory's product.
        type_name: &'static str,
    },

    /// A factory was registered under a tag its type does not declare.
    #[error("factory for '{declared}' cannot be registered under '{tag}'")]
    TagMismatch {
        /// Tag the factory was offered under.
        tag: String,
        /// Tag the type declares.
        declared: &'static str,
    },

    /// A list entry has no usable key when converting to a keyed map.
    #[error("entry {index} has no '{key_field}' key")]
    MissingKey {
        /// Position of the entry in the list.
        index: usize,
        /// Key field that was looked up.
        key_field: String,
    },
}

impl From<ModelError> for ErrorModel {
    fn from(error: ModelError) -> Self {
        ErrorModel::invalid_arg(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_constructor_and_is() {
        let err = ErrorModel::new("E_AUTH", "x");
        assert!(err.is("E_AUTH"));
        assert!(err.is_not("E_SYSTEM"));
        assert_eq!(err.message(), Some("x"));
    }

    #[test]
    fn empty_code_falls_back_to_unknown() {
        assert!(ErrorModel::new("", "oops").is(codes::UNKNOWN));
    }

    #[test]
    fn equality_ignores_message() {
        assert_eq!(ErrorModel::new("E_X", "a"), ErrorModel::new("E_X", "b"));
    }

    #[test]
    fn bodyless_and_body_bearing_401_share_the_auth_family() {
        let bare = ErrorModel::from_http_response(401, Some("Unauthorized"), None);
        let body = json!({ "error": { "code": "E_AUTH", "message": "token expired" } });
        let wrapped = ErrorModel::from_http_response(401, Some("Unauthorized"), Some(&body));
        assert!(bare.invalidates_session());
        assert!(wrapped.invalidates_session());
        assert_eq!(bare, wrapped);
        assert_eq!(wrapped.message(), Some("token expired"));
    }

    #[test]
    fn bare_record_in_4xx_body_is_unwrapped() {
        let body = json!({ "code": "E_DUP_POST", "args": ["p1"] });
        let err = ErrorModel::from_http_response(409, None, Some(&body));
        assert!(err.is("E_DUP_POST"));
        assert_eq!(err.args(), &[json!("p1")]);
    }

    #[test]
    fn server_errors_ignore_the_body() {
        let body = json!({ "error": { "code": "E_DB_DOWN" } });
        let err = ErrorModel::from_http_response(503, Some("Service Unavailable"), Some(&body));
        assert!(err.is(codes::SYSTEM));
        assert!(err.is_network());
    }

    #[test]
    fn unstructured_4xx_body_is_synthesized() {
        let body = json!({ "detail": "nope" });
        assert!(ErrorModel::from_http_response(404, None, Some(&body)).is(codes::NOT_FOUND));
        assert!(ErrorModel::from_http_response(418, None, None).is(codes::CLIENT));
    }

    #[test]
    fn code_of_classifies_all_shapes() {
        let model = ErrorModel::from_code("E_A");
        assert_eq!(code_of(&model).as_str(), "E_A");

        let plain = json!({ "code": "E_B", "message": "m" });
        assert_eq!(code_of(&plain).as_str(), "E_B");

        let nested = json!({ "error": { "code": "E_C" } });
        assert_eq!(code_of(&nested).as_str(), "E_C");

        let native: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::other("disk"));
        assert_eq!(code_of(native.as_ref()).as_str(), codes::UNKNOWN);

        let wrapped: Box<dyn std::error::Error + Send + Sync> =
            Box::new(std::io::Error::other(ErrorModel::from_code("E_D")));
        assert_eq!(code_of(wrapped.as_ref()).as_str(), "E_D");

        assert_eq!(code_of(&json!(42)).as_str(), codes::UNKNOWN);
    }

    #[test]
    fn code_of_agrees_with_the_construction_paths() {
        let timeout: Box<dyn std::error::Error + Send + Sync> = Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "slow",
        ));
        assert_eq!(code_of(timeout.as_ref()).as_str(), codes::TIMEOUT);
        assert_eq!(
            code_of(timeout.as_ref()),
            ErrorModel::from_error(timeout.as_ref()).code
        );

        let string_record = json!({ "error": "E_AUTH" });
        assert_eq!(code_of(&string_record).as_str(), codes::AUTH);
        assert!(ErrorModel::from_http_response(401, None, Some(&string_record)).is(codes::AUTH));

        assert_eq!(code_of(&json!("E_FORBIDDEN")).as_str(), codes::FORBIDDEN);
    }

    #[test]
    fn from_error_maps_io_kinds() {
        let timeout = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert!(ErrorModel::from_error(&timeout).is(codes::TIMEOUT));
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "down");
        assert!(ErrorModel::from_error(&refused).is(codes::NETWORK));
    }

    #[test]
    fn from_json_tolerates_odd_shapes() {
        assert!(ErrorModel::from_json(&json!("E_STR")).is("E_STR"));
        assert!(ErrorModel::from_json(&json!(null)).is(codes::UNKNOWN));
        assert!(ErrorModel::from_json(&json!({ "message": "no code" })).is(codes::UNKNOWN));
        let single = ErrorModel::from_json(&json!({ "code": "E_X", "args": 3 }));
        assert_eq!(single.args(), &[json!(3)]);
    }

    #[test]
    fn wire_form_omits_empty_parts() {
        assert_eq!(ErrorModel::from_code("E_X").to_json(), json!({ "code": "E_X" }));
    }

    #[test]
    fn model_errors_become_invalid_arg() {
        let err: ErrorModel = ModelError::ReservedField { field: "_t".into() }.into();
        assert!(err.is(codes::INVALID_ARG));
    }
}
