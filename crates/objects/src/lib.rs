//! Typed object model for the social client.
//!
//! This crate holds every domain concept the client exchanges with the
//! backend: tagged model objects, the type registry that maps wire tags to
//! Rust types, the serializer, the caller-visible error model, and the
//! request/response envelopes. The HTTP adapter lives in the `transport`
//! crate; caller-facing operations live in `facade`.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! [`Session`] is the only port; `transport` consumes it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`TypeTag`, `ObjectId`, `UserId`, `ErrorCode`, `AuthToken`) |
//! | [`data`] | The owned [`Data`] value tree |
//! | [`object`] | [`ModelObject`], [`ModelType`], word fields and aux data |
//! | [`registry`] | [`TypeRegistry`] and [`Factory`] |
//! | [`serializer`] | JSON ⇄ [`Data`] with tag dispatch |
//! | [`collections`] | [`ResultList`] and [`ResultMap`] |
//! | [`entities`] | [`Post`], [`User`], [`Comment`], [`Media`] |
//! | [`types`] | Shared value types ([`Timestamp`], [`Page`]) |
//! | [`errors`] | [`ErrorModel`], [`ErrorLike`], [`ModelError`], well-known codes |
//! | [`envelope`] | [`RequestEnvelope`], [`ResponseEnvelope`], [`Credential`] |
//! | [`session`] | The [`Session`] port and [`MemorySession`] |
//!
//! ## Wire format
//!
//! A model object is a JSON object with the reserved keys `_t` (type tag),
//! `id` and `_aux` (auxiliary data bundled by the server). All other keys are
//! main data fields.

pub mod collections;
pub mod data;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod identifiers;
pub mod object;
pub mod registry;
pub mod serializer;
pub mod session;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use collections::{ResultList, ResultMap};
pub use data::{Data, Fields};
pub use entities::{Comment, Media, Post, User};
pub use envelope::{
    ClientInfo, Content, ContentType, Credential, FormData, FormPart, Outcome, RequestEnvelope,
    ResponseEnvelope,
};
pub use errors::{code_of, codes, ErrorLike, ErrorModel, ModelError};
pub use identifiers::{AuthToken, ErrorCode, ObjectId, TypeTag, UserId};
pub use object::{ModelObject, ModelType, ObjectParts, AUX_FIELD, ID_FIELD, TAG_FIELD};
pub use registry::{Factory, TypeRegistry};
pub use serializer::Serializer;
pub use session::{MemorySession, Session};
pub use types::{Page, Timestamp};
