//! Caller-facing social service operations.
//!
//! [`SocialService`] exposes one async method per operation. Each returns
//! `Result<T, ErrorModel>`; awaiting it propagates failures. The callback
//! form of any operation is obtained through the single generic adapter
//! [`with_callback`], so both completion styles behave identically.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Operations sequence local validation, envelope
//! construction, the [`transport::Transport`] call and result wrapping. They
//! contain no business rules of their own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`service`] | [`SocialService`] and [`social_registry`] |
//! | [`callback`] | [`with_callback`] |

pub mod callback;
pub mod service;

pub use callback::with_callback;
pub use service::{social_registry, SocialService};

/// Error type returned by every operation.
pub use objects::ErrorModel;
