//! HTTP transport for the social client.
//!
//! Executes one HTTP call per [`objects::RequestEnvelope`] and normalises
//! every outcome into either an [`objects::ResponseEnvelope`] or exactly one
//! [`objects::ErrorModel`]. No retries are attempted.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Request encoding, the credential policy, status
//! classification and `reqwest` all live here. The `facade` crate sees only
//! [`Transport`] and [`ClientConfig`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`ClientConfig`], [`ConfigError`], [`build_url`] |
//! | [`client`] | The [`HttpClient`] port and [`ReqwestClient`] |
//! | [`transport`] | [`Transport`]: encoding, decoding, session invalidation |
//!
//! ## Status classification
//!
//! | Outcome | Result |
//! |---------|--------|
//! | no response (connect failure, timeout) | `Err`, `E_NETWORK` / `E_TIMEOUT` |
//! | HTTP >= 500 | `Err`, `E_SYSTEM` |
//! | 2xx | `Ok(envelope)` decoded from the body |
//! | 4xx with an error record | `Ok(envelope)` carrying that error |
//! | 4xx without one | `Ok(envelope)` carrying an error synthesized from the status |

pub mod client;
pub mod config;
pub mod transport;

pub use client::{
    CredentialsMode, HttpBody, HttpClient, HttpFailure, HttpMethod, HttpRequest, HttpResponse,
    ReqwestClient,
};
pub use config::{build_url, ClientConfig, ConfigError, DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPLOAD_WATCHDOG};
pub use transport::Transport;

/// Endpoint URL type used throughout the transport API.
pub use reqwest::Url;
