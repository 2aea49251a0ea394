//! Tag → factory registry used by the serializer to rebuild concrete types.
//!
//! The registry is built once at startup (each type "checks in") and then
//! frozen behind an `Arc` inside [`crate::Serializer`]. Shared references are
//! read-only, so concurrent readers need no lock.

use std::any::TypeId;
use std::collections::BTreeMap;

use crate::{ModelError, ModelObject, ModelType, ObjectParts, ResultList, ResultMap, TypeTag};

/// Constructs one concrete model type from decoded wire parts.
#[derive(Debug, Clone, Copy)]
pub struct Factory {
    tag: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    construct: fn(ObjectParts) -> ModelObject,
}

impl Factory {
    /// The factory for model type `T`.
    pub fn of<T: ModelType>() -> Self {
        Self {
            tag: T::TAG,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            construct: T::construct,
        }
    }

    /// The tag the product type declares.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn construct(&self, parts: ObjectParts) -> ModelObject {
        (self.construct)(parts)
    }
}

/// Process-wide map from [`TypeTag`] to [`Factory`].
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    factories: BTreeMap<TypeTag, Factory>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in collection types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for factory in [Factory::of::<ResultList>(), Factory::of::<ResultMap>()] {
            registry
                .factories
                .insert(TypeTag::from_static(factory.tag), factory);
        }
        registry
    }

    /// Stores `factory` under `tag`, replacing any previous factory for the
    /// same tag.
    ///
    /// Fails if the factory's type declares a different tag, or if its type
    /// is already registered under another tag.
    pub fn register(&mut self, tag: TypeTag, factory: Factory) -> Result<(), ModelError> {
        if tag.as_str() != factory.tag {
            return Err(ModelError::TagMismatch {
                tag: tag.to_string(),
                declared: factory.tag,
            });
        }

        if let Some((existing_tag, _)) = self
            .factories
            .iter()
            .find(|(existing, f)| f.type_id == factory.type_id && **existing != tag)
        {
            return Err(ModelError::AmbiguousType {
                tag: tag.to_string(),
                existing_tag: existing_tag.to_string(),
                type_name: factory.type_name,
            });
        }

        if let Some(previous) = self.factories.insert(tag.clone(), factory) {
            if previous.type_id != factory.type_id {
                tracing::debug!(
                    tag = %tag,
                    previous = previous.type_name,
                    replacement = factory.type_name,
                    "type factory replaced"
                );
            }
        }
        Ok(())
    }

    /// Checks in model type `T`; chainable.
    pub fn check_in<T: ModelType>(&mut self) -> Result<&mut Self, ModelError> {
        T::check_in(self)?;
        Ok(self)
    }

    pub fn lookup(&self, tag: &str) -> Option<&Factory> {
        self.factories.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.factories.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comment, Post};

    /// A second type that (wrongly) shares the post tag.
    struct Impostor(ModelObject);

    impl ModelType for Impostor {
        const TAG: &'static str = "post";

        fn from_object(object: ModelObject) -> Self {
            Self(object)
        }

        fn as_object(&self) -> &ModelObject {
            &self.0
        }

        fn into_object(self) -> ModelObject {
            self.0
        }
    }

    #[test]
    fn builtins_are_present() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.contains(ResultList::TAG));
        assert!(registry.contains(ResultMap::TAG));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn check_in_is_idempotent() {
        let mut registry = TypeRegistry::new();
        registry.check_in::<Post>().unwrap().check_in::<Post>().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("post").unwrap().tag(), "post");
    }

    #[test]
    fn same_tag_can_be_reloaded_with_another_type() {
        let mut registry = TypeRegistry::new();
        registry.check_in::<Post>().unwrap();
        registry.check_in::<Impostor>().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("post").unwrap().type_name().ends_with("Impostor"));
    }

    #[test]
    fn factory_must_match_its_tag() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register(TypeTag::new("article").unwrap(), Factory::of::<Post>())
            .unwrap_err();
        assert!(matches!(err, ModelError::TagMismatch { declared: "post", .. }));
    }

    #[test]
    fn one_type_cannot_answer_to_two_tags() {
        let mut registry = TypeRegistry::new();
        registry.check_in::<Comment>().unwrap();
        // Simulate a stale entry left under another tag.
        let stale = Factory {
            tag: "old-cmt",
            ..Factory::of::<Comment>()
        };
        let err = registry
            .register(TypeTag::new("old-cmt").unwrap(), stale)
            .unwrap_err();
        assert!(matches!(err, ModelError::AmbiguousType { .. }));
    }

    #[test]
    fn unknown_tags_are_absent() {
        assert!(TypeRegistry::with_builtins().lookup("no-such-type").is_none());
    }
}
