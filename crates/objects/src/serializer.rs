//! Conversion between model object graphs and tagged plain JSON.
//!
//! Serialization needs no registry: every [`ModelObject`] knows its own tag.
//! Deserialization is a total function: a map whose `_t` names a registered
//! type is rebuilt through that type's factory; any other value (no tag, an
//! unknown tag, scalars) comes back as plain data. Forward-compatible server
//! payloads therefore never fail to decode on older clients.

use std::sync::Arc;

use serde_json::Value;

use crate::{Data, ModelObject, ModelType, ObjectParts, TypeRegistry, TAG_FIELD};

/// Serializer bound to a frozen [`TypeRegistry`].
#[derive(Debug, Clone)]
pub struct Serializer {
    registry: Arc<TypeRegistry>,
}

impl Serializer {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Emits the wire form of `data`, tagging every nested model object.
    pub fn serialize(&self, data: &Data) -> Value {
        data.to_json()
    }

    /// Rebuilds a value graph from JSON. Never fails.
    pub fn deserialize(&self, json: Value) -> Data {
        match json {
            Value::Array(items) => {
                Data::List(items.into_iter().map(|v| self.deserialize(v)).collect())
            }
            Value::Object(map) => {
                let tag = map
                    .get(TAG_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let fields = map
                    .into_iter()
                    .map(|(k, v)| (k, self.deserialize(v)))
                    .collect();

                let Some(tag) = tag else {
                    return Data::Map(fields);
                };
                match self.registry.lookup(&tag) {
                    Some(factory) => {
                        Data::from(factory.construct(ObjectParts::from_wire(fields)))
                    }
                    None => {
                        tracing::trace!(tag = %tag, "unregistered type tag kept as plain data");
                        Data::Map(fields)
                    }
                }
            }
            scalar => Data::plain(scalar),
        }
    }

    /// Returns the model object `json` encodes, or `None` for null, plain
    /// data and unknown tags.
    pub fn wrap(&self, json: Option<Value>) -> Option<ModelObject> {
        json.and_then(|json| self.deserialize(json).into_object())
    }

    /// Returns `json` as model type `T`.
    ///
    /// Tagged JSON must carry `T`'s tag. Untagged maps are taken as `T`'s
    /// fields. Anything else yields `None`.
    pub fn wrap_as<T: ModelType>(&self, json: Value) -> Option<T> {
        match self.deserialize(json) {
            Data::Object(object) => object.downcast::<T>().ok(),
            Data::Map(fields) if !fields.contains_key(TAG_FIELD) => {
                T::construct(ObjectParts::from_wire(fields)).downcast::<T>().ok()
            }
            _ => None,
        }
    }

    /// Emits the wire form of an optional value; `None` becomes `null`.
    pub fn unwrap(&self, data: Option<&Data>) -> Value {
        data.map_or(Value::Null, Data::to_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Comment, Post, ResultList, User, UserId};
    use serde_json::json;

    fn serializer() -> Serializer {
        let mut registry = TypeRegistry::with_builtins();
        registry
            .check_in::<Post>()
            .and_then(|r| r.check_in::<User>())
            .and_then(|r| r.check_in::<Comment>())
            .unwrap();
        Serializer::new(Arc::new(registry))
    }

    #[test]
    fn unknown_tag_is_returned_unchanged() {
        let s = serializer();
        let json = json!({ "_t": "no-such-type", "a": 1 });
        let data = s.deserialize(json.clone());
        assert!(matches!(data, Data::Map(_)));
        assert_eq!(s.serialize(&data), json);
    }

    #[test]
    fn nested_graph_round_trips() {
        let s = serializer();
        let mut author = User::from_object(ModelObject::new(User::tag()));
        author.set("username", "ann").unwrap();
        author.follow("bob");

        let ann = UserId::new("ann").unwrap();
        let bob = UserId::new("bob").unwrap();
        let mut post = Post::create_new(&ann, "hello");
        post.add_tag("intro");
        post.set_author(author);
        let post_id = post.id().cloned().unwrap();
        post.set(
            "replies",
            Data::List(vec![
                Data::from(Comment::create_new(post_id, &bob, "hi")),
                Data::from(7_i64),
            ]),
        )
        .unwrap();
        post.set_aux("misc", Data::plain(json!({ "k": [1, { "_t": "zzz" }] })));

        let original = Data::from(post.into_object());
        let rebuilt = s.deserialize(s.serialize(&original));
        assert_eq!(rebuilt, original);

        let post = rebuilt.into_object().unwrap().downcast::<Post>().unwrap();
        assert_eq!(post.author().unwrap().username(), Some("ann"));
        let replies = post.get("replies").and_then(Data::as_list).unwrap();
        assert!(replies[0].as_object().unwrap().is::<Comment>());
    }

    #[test]
    fn scalars_pass_through() {
        let s = serializer();
        for json in [json!(null), json!(1), json!("x"), json!([1, "y"])] {
            assert_eq!(s.serialize(&s.deserialize(json.clone())), json);
        }
    }

    #[test]
    fn wrap_is_null_tolerant() {
        let s = serializer();
        assert!(s.wrap(None).is_none());
        assert!(s.wrap(Some(json!(null))).is_none());
        assert!(s.wrap(Some(json!({ "a": 1 }))).is_none());
        let obj = s.wrap(Some(json!({ "_t": "post", "id": "p1" }))).unwrap();
        assert_eq!(obj.id().unwrap().as_str(), "p1");
    }

    #[test]
    fn wrap_as_accepts_matching_tag_or_plain_map() {
        let s = serializer();
        let post: Post = s.wrap_as(json!({ "_t": "post", "id": "p1", "txt": "hi" })).unwrap();
        assert_eq!(post.text(), Some("hi"));

        let plain: Post = s.wrap_as(json!({ "id": "p2", "txt": "yo" })).unwrap();
        assert_eq!(plain.id().unwrap().as_str(), "p2");

        assert!(s.wrap_as::<Post>(json!({ "_t": "user", "id": "u1" })).is_none());
        assert!(s.wrap_as::<Post>(json!({ "_t": "nope" })).is_none());
        assert!(s.wrap_as::<Post>(json!("p1")).is_none());
    }

    #[test]
    fn collection_size_is_recomputed_on_decode() {
        let s = serializer();
        let list: ResultList = s
            .wrap_as(json!({ "_t": "rl", "list": [1, 2, 3], "size": 99 }))
            .unwrap();
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn unwrap_maps_none_to_null() {
        let s = serializer();
        assert_eq!(s.unwrap(None), Value::Null);
        assert_eq!(s.unwrap(Some(&Data::from("a"))), json!("a"));
    }
}
