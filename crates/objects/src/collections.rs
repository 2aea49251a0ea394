//! Result collections: [`ResultList`] and [`ResultMap`].
//!
//! Both are model objects so they travel through the same serializer as any
//! entity. Entries live in main data (`list` / `map`) next to a `size`
//! field that every mutator keeps equal to the live entry count; the
//! factories recompute it on decode, so a stale server value never leaks.

use crate::{Data, Fields, ModelError, ModelObject, ModelType, ObjectId, ObjectParts, ID_FIELD};

const LIST_FIELD: &str = "list";
const MAP_FIELD: &str = "map";
const SIZE_FIELD: &str = "size";

/// Reads the key an entry is stored under in a keyed collection.
fn key_of(entry: &Data, key_field: &str) -> Option<String> {
    match entry {
        Data::Map(fields) => fields.get(key_field).and_then(Data::key_string),
        Data::Object(object) if key_field == ID_FIELD => object.id().map(ToString::to_string),
        Data::Object(object) => object.get(key_field).and_then(Data::key_string),
        _ => None,
    }
}

/// Writes `key` into the entry under `key_field`. Scalars cannot carry a
/// key and are returned unchanged.
fn stamp(entry: Data, key_field: &str, key: &str) -> Data {
    match entry {
        Data::Map(mut fields) => {
            fields.insert(key_field.to_string(), Data::from(key));
            Data::Map(fields)
        }
        Data::Object(mut object) => {
            let stamped = if key_field == ID_FIELD {
                match ObjectId::new(key) {
                    Some(id) => object.set_id(id).map_err(|e| e.to_string()),
                    None => Err("blank key".to_string()),
                }
            } else {
                object
                    .set(key_field, key)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            };
            if let Err(reason) = stamped {
                tracing::debug!(key, key_field, %reason, "entry key not stamped");
            }
            Data::Object(object)
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// ResultList
// ---------------------------------------------------------------------------

/// Ordered list of result entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultList(ModelObject);

impl ModelType for ResultList {
    const TAG: &'static str = "rl";

    fn from_object(object: ModelObject) -> Self {
        let mut list = Self(object);
        list.normalise();
        list
    }

    fn as_object(&self) -> &ModelObject {
        &self.0
    }

    fn into_object(self) -> ModelObject {
        self.0
    }

    fn construct(parts: ObjectParts) -> ModelObject {
        Self::from_object(ModelObject::from_parts(Self::tag(), parts)).0
    }
}

impl Default for ResultList {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultList {
    pub fn new() -> Self {
        Self::from_object(ModelObject::new(Self::tag()))
    }

    pub fn from_entries<I, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Data>,
    {
        let mut list = Self::new();
        list.0.put(
            LIST_FIELD,
            Data::List(entries.into_iter().map(Into::into).collect()),
        );
        list.normalise();
        list
    }

    fn normalise(&mut self) {
        if !matches!(self.0.get(LIST_FIELD), Some(Data::List(_))) {
            if let Some(odd) = self.0.get(LIST_FIELD).filter(|v| !v.is_null()) {
                tracing::debug!(found = ?odd, "result list entries were not a list");
            }
            self.0.put(LIST_FIELD, Data::List(Vec::new()));
        }
        self.sync_size();
    }

    fn sync_size(&mut self) {
        let size = self.entries().len();
        self.0.put(SIZE_FIELD, size);
    }

    fn entries_mut(&mut self) -> Option<&mut Vec<Data>> {
        // Only reachable through normalised objects, so the field is a list.
        self.0.main_mut(LIST_FIELD).and_then(|slot| match slot {
            Data::List(items) => Some(items),
            _ => None,
        })
    }

    pub fn entries(&self) -> &[Data] {
        self.0
            .get(LIST_FIELD)
            .and_then(Data::as_list)
            .unwrap_or_default()
    }

    pub fn get(&self, index: usize) -> Option<&Data> {
        self.entries().get(index)
    }

    pub fn push(&mut self, entry: impl Into<Data>) {
        if let Some(items) = self.entries_mut() {
            items.push(entry.into());
        }
        self.sync_size();
    }

    pub fn remove(&mut self, index: usize) -> Option<Data> {
        let removed = self
            .entries_mut()
            .filter(|items| index < items.len())
            .map(|items| items.remove(index));
        self.sync_size();
        removed
    }

    /// Cached entry count.
    pub fn len(&self) -> usize {
        self.0
            .get_i64(SIZE_FIELD)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries that are model objects of type `T`, cloned, in order.
    pub fn objects<T: ModelType>(&self) -> Vec<T> {
        self.entries()
            .iter()
            .filter_map(Data::as_object)
            .filter(|object| object.is::<T>())
            .map(|object| T::from_object(object.clone()))
            .collect()
    }

    pub fn into_entries(self) -> Vec<Data> {
        let (_, mut parts) = self.0.into_parts();
        match parts.main.shift_remove(LIST_FIELD) {
            Some(Data::List(items)) => items,
            _ => Vec::new(),
        }
    }

    /// Keys every entry by its `key_field` value, preserving order.
    ///
    /// Fails on the first entry without a usable key.
    pub fn as_result_map(&self, key_field: &str) -> Result<ResultMap, ModelError> {
        let mut map = ResultMap::new();
        for (index, entry) in self.entries().iter().enumerate() {
            let key = key_of(entry, key_field).ok_or_else(|| ModelError::MissingKey {
                index,
                key_field: key_field.to_string(),
            })?;
            map.insert(key, entry.clone());
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// ResultMap
// ---------------------------------------------------------------------------

/// Insertion-ordered, id-keyed result entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMap(ModelObject);

impl ModelType for ResultMap {
    const TAG: &'static str = "rm";

    fn from_object(object: ModelObject) -> Self {
        let mut map = Self(object);
        map.normalise();
        map
    }

    fn as_object(&self) -> &ModelObject {
        &self.0
    }

    fn into_object(self) -> ModelObject {
        self.0
    }

    fn construct(parts: ObjectParts) -> ModelObject {
        Self::from_object(ModelObject::from_parts(Self::tag(), parts)).0
    }
}

impl Default for ResultMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultMap {
    pub fn new() -> Self {
        Self::from_object(ModelObject::new(Self::tag()))
    }

    pub fn from_entries<I, K, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<Data>,
    {
        let mut map = Self::new();
        for (key, entry) in entries {
            map.insert(key, entry);
        }
        map
    }

    fn normalise(&mut self) {
        if !matches!(self.0.get(MAP_FIELD), Some(Data::Map(_))) {
            if let Some(odd) = self.0.get(MAP_FIELD).filter(|v| !v.is_null()) {
                tracing::debug!(found = ?odd, "result map entries were not a map");
            }
            self.0.put(MAP_FIELD, Data::Map(Fields::new()));
        }
        self.sync_size();
    }

    fn sync_size(&mut self) {
        let size = self.entries().map_or(0, Fields::len);
        self.0.put(SIZE_FIELD, size);
    }

    fn entries_mut(&mut self) -> Option<&mut Fields> {
        self.0.main_mut(MAP_FIELD).and_then(|slot| match slot {
            Data::Map(fields) => Some(fields),
            _ => None,
        })
    }

    pub fn entries(&self) -> Option<&Fields> {
        self.0.get(MAP_FIELD).and_then(Data::as_map)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries()
            .into_iter()
            .flat_map(|fields| fields.keys().map(String::as_str))
    }

    pub fn get(&self, key: &str) -> Option<&Data> {
        self.entries().and_then(|fields| fields.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces the entry; a replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, entry: impl Into<Data>) -> Option<Data> {
        let previous = self
            .entries_mut()
            .and_then(|fields| fields.insert(key.into(), entry.into()));
        self.sync_size();
        previous
    }

    pub fn remove(&mut self, key: &str) -> Option<Data> {
        let removed = self
            .entries_mut()
            .and_then(|fields| fields.shift_remove(key));
        self.sync_size();
        removed
    }

    /// Cached entry count.
    pub fn len(&self) -> usize {
        self.0
            .get_i64(SIZE_FIELD)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries that are model objects of type `T`, cloned, in key order.
    pub fn objects<T: ModelType>(&self) -> Vec<T> {
        self.entries()
            .into_iter()
            .flat_map(|fields| fields.values())
            .filter_map(Data::as_object)
            .filter(|object| object.is::<T>())
            .map(|object| T::from_object(object.clone()))
            .collect()
    }

    /// Flattens to a list in key order, stamping each entry's key under
    /// `key_field` so [`ResultList::as_result_map`] can rebuild the map.
    pub fn as_result_list(&self, key_field: &str) -> ResultList {
        ResultList::from_entries(
            self.entries()
                .into_iter()
                .flat_map(|fields| fields.iter())
                .map(|(key, entry)| stamp(entry.clone(), key_field, key)),
        )
    }
}

impl From<ResultList> for Data {
    fn from(list: ResultList) -> Self {
        Data::from(list.0)
    }
}

impl From<ResultMap> for Data {
    fn from(map: ResultMap) -> Self {
        Data::from(map.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain(json: serde_json::Value) -> Data {
        Data::plain(json)
    }

    #[test]
    fn map_to_list_and_back() {
        let map = ResultMap::from_entries([
            ("a", plain(json!({ "id": "a" }))),
            ("b", plain(json!({ "id": "b" }))),
        ]);
        assert_eq!(map.len(), 2);

        let list = map.as_result_list("id");
        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0], plain(json!({ "id": "a" })));
        assert_eq!(list.entries()[1], plain(json!({ "id": "b" })));

        let back = list.as_result_map("id").unwrap();
        assert_eq!(back, map);
        assert_eq!(back.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn keys_are_stamped_into_entries() {
        let map = ResultMap::from_entries([("k1", plain(json!({ "name": "x" })))]);
        let list = map.as_result_list("key");
        assert_eq!(list.entries()[0], plain(json!({ "name": "x", "key": "k1" })));
    }

    #[test]
    fn object_entries_are_keyed_by_id() {
        let post = crate::Post::from_object(ModelObject::new(crate::Post::tag()));
        let map = ResultMap::from_entries([("p9", post.into_object())]);
        let list = map.as_result_list("id");
        let entry = list.get(0).and_then(Data::as_object).unwrap();
        assert_eq!(entry.id().map(ObjectId::as_str), Some("p9"));
        assert!(list.as_result_map("id").unwrap().contains_key("p9"));
    }

    #[test]
    fn missing_key_is_reported() {
        let list = ResultList::from_entries([plain(json!({ "id": "a" })), plain(json!(3))]);
        assert_eq!(
            list.as_result_map("id"),
            Err(ModelError::MissingKey {
                index: 1,
                key_field: "id".into()
            })
        );
    }

    #[test]
    fn size_tracks_mutation() {
        let mut list = ResultList::new();
        list.push("a");
        list.push("b");
        assert_eq!(list.len(), 2);
        assert_eq!(list.remove(0), Some(Data::from("a")));
        assert_eq!(list.remove(5), None);
        assert_eq!(list.len(), 1);

        let mut map = ResultMap::new();
        map.insert("x", 1_i64);
        map.insert("x", 2_i64);
        assert_eq!(map.len(), 1);
        map.remove("x");
        assert!(map.is_empty());
    }

    #[test]
    fn malformed_entries_are_normalised() {
        let mut parts = ObjectParts::default();
        parts.main.insert("list".into(), Data::from("oops"));
        parts.main.insert("size".into(), Data::from(4_i64));
        let list = ResultList::from_object(ResultList::construct(parts));
        assert!(list.is_empty());
        assert!(list.entries().is_empty());
    }

    #[test]
    fn typed_entries_are_filtered() {
        let mut list = ResultList::new();
        list.push(ModelObject::new(crate::Post::tag()));
        list.push(ModelObject::new(crate::User::tag()));
        list.push(7_i64);
        assert_eq!(list.objects::<crate::Post>().len(), 1);
        assert_eq!(list.into_entries().len(), 3);
    }
}
