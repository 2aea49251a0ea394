//! Newtype identifiers.
//!
//! Every string that names something on the wire is wrapped in a distinct
//! newtype. This prevents accidentally passing a [`UserId`]
//! where an [`ObjectId`] is expected even though both are strings underneath.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty
            /// or whitespace only.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Short wire name of a [`crate::ModelObject`] subtype (e.g. `"post"`).
    ///
    /// One tag resolves to exactly one registered factory; see
    /// [`crate::TypeRegistry`].
    TypeTag
}

impl TypeTag {
    /// Builds a tag from a compile-time constant declared by a model type.
    pub(crate) fn from_static(tag: &'static str) -> Self {
        Self(tag.to_string())
    }
}

string_id! {
    /// Identifies a model object (post, user, comment, ...).
    ///
    /// Immutable on the object once assigned.
    ObjectId
}

impl ObjectId {
    /// Generates a fresh client-side identifier for a newly created object.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

string_id! {
    /// Identifies the signed-in user on the wire (`x-app-auth.user`).
    UserId
}

impl From<UserId> for ObjectId {
    fn from(user: UserId) -> Self {
        Self(user.0)
    }
}

string_id! {
    /// Error code carried by an [`crate::ErrorModel`] (e.g. `"E_AUTH"`).
    ErrorCode
}

impl ErrorCode {
    pub(crate) fn from_static(code: &'static str) -> Self {
        Self(code.to_string())
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Session token issued by the backend at login.
///
/// `Debug` is redacted so tokens never reach log output through `{:?}`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Creates a token, returning `None` if the value is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.trim().is_empty() {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Returns the raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(ObjectId::new("").is_none());
        assert!(ObjectId::new("   ").is_none());
        assert!(TypeTag::new("post").is_some());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(ObjectId::generate(), ObjectId::generate());
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AuthToken::new("secret").unwrap();
        assert_eq!(format!("{token:?}"), "AuthToken(***)");
        assert_eq!(token.expose(), "secret");
    }
}
