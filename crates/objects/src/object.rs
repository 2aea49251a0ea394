//! The base model object and the [`ModelType`] trait implemented by every
//! concrete entity.
//!
//! A [`ModelObject`] is an id, a "main data" field bag holding the entity's
//! own fields, and an optional "aux data" bag of denormalized related
//! entities keyed by label (e.g. `"author"`). On the wire the main data is
//! emitted as a flat JSON object with the type tag injected under
//! [`TAG_FIELD`], the id under [`ID_FIELD`] and the aux bag under
//! [`AUX_FIELD`].

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{Data, Factory, Fields, ModelError, ObjectId, TypeRegistry, TypeTag};

/// Reserved wire field carrying the type tag.
pub const TAG_FIELD: &str = "_t";
/// Reserved wire field carrying the aux data bag.
pub const AUX_FIELD: &str = "_aux";
/// Reserved wire field carrying the object id.
pub const ID_FIELD: &str = "id";

fn check_field(field: &str) -> Result<(), ModelError> {
    if matches!(field, TAG_FIELD | AUX_FIELD | ID_FIELD) {
        Err(ModelError::ReservedField {
            field: field.to_string(),
        })
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObjectParts
// ---------------------------------------------------------------------------

/// The pieces a factory assembles into a [`ModelObject`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectParts {
    /// Server-assigned id; `None` for objects not yet stored.
    pub id: Option<ObjectId>,
    /// Main data fields, reserved names excluded.
    pub main: Fields,
    /// Aux data, when the wire map carried any.
    pub aux: Option<Fields>,
}

impl ObjectParts {
    /// Splits a decoded wire map into id, main data and aux data.
    ///
    /// The tag field is dropped. A non-string id or a non-map aux value is
    /// left in the main data untouched so it still round-trips.
    pub fn from_wire(mut fields: Fields) -> Self {
        fields.shift_remove(TAG_FIELD);

        let id = match fields.get(ID_FIELD) {
            Some(Data::String(raw)) => ObjectId::new(raw.as_str()),
            _ => None,
        };
        if id.is_some() {
            fields.shift_remove(ID_FIELD);
        }

        let aux = match fields.get(AUX_FIELD) {
            Some(Data::Map(_)) => match fields.shift_remove(AUX_FIELD) {
                Some(Data::Map(aux)) => Some(aux),
                _ => None,
            },
            _ => None,
        };

        Self {
            id,
            main: fields,
            aux,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelObject
// ---------------------------------------------------------------------------

/// Base entity: type tag, immutable id, main data and optional aux data.
#[derive(Debug, Clone)]
pub struct ModelObject {
    kind: TypeTag,
    id: Option<ObjectId>,
    main: Fields,
    aux: Option<Fields>,
    fresh: bool,
}

/// Structural equality over tag, id, main data and aux data. The "new"
/// marker is client-local state and is not compared.
impl PartialEq for ModelObject {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.id == other.id
            && self.main == other.main
            && self.aux == other.aux
    }
}

impl ModelObject {
    /// An empty object of the given type, without an id.
    pub fn new(kind: TypeTag) -> Self {
        Self::from_parts(kind, ObjectParts::default())
    }

    /// A client-created object, marked new. Generates an id when none is given.
    pub fn create_new(kind: TypeTag, id: Option<ObjectId>) -> Self {
        Self {
            kind,
            id: Some(id.unwrap_or_else(ObjectId::generate)),
            main: Fields::new(),
            aux: None,
            fresh: true,
        }
    }

    pub fn from_parts(kind: TypeTag, parts: ObjectParts) -> Self {
        Self {
            kind,
            id: parts.id,
            main: parts.main,
            aux: parts.aux,
            fresh: false,
        }
    }

    pub fn into_parts(self) -> (TypeTag, ObjectParts) {
        (
            self.kind,
            ObjectParts {
                id: self.id,
                main: self.main,
                aux: self.aux,
            },
        )
    }

    pub fn kind(&self) -> &TypeTag {
        &self.kind
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    /// Assigns the id. Re-assigning the same id is a no-op; a different id
    /// is rejected.
    pub fn set_id(&mut self, id: ObjectId) -> Result<(), ModelError> {
        match &self.id {
            Some(existing) if *existing != id => Err(ModelError::IdAlreadySet {
                existing: existing.to_string(),
            }),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// `true` for objects created locally and not yet acknowledged by the server.
    pub fn is_new(&self) -> bool {
        self.fresh
    }

    pub fn mark_persisted(&mut self) {
        self.fresh = false;
    }

    /// Returns `true` if this object is of model type `T`.
    pub fn is<T: ModelType>(&self) -> bool {
        self.kind.as_str() == T::TAG
    }

    /// Recovers the typed entity, or hands the object back if the tag differs.
    pub fn downcast<T: ModelType>(self) -> Result<T, Self> {
        if self.is::<T>() {
            Ok(T::from_object(self))
        } else {
            Err(self)
        }
    }

    // -----------------------------------------------------------------------
    // Main data
    // -----------------------------------------------------------------------

    pub fn fields(&self) -> &Fields {
        &self.main
    }

    pub fn get(&self, field: &str) -> Option<&Data> {
        self.main.get(field)
    }

    /// Returns the field, or `default` when it is absent or null.
    pub fn get_or<'a>(&'a self, field: &str, default: &'a Data) -> &'a Data {
        match self.main.get(field) {
            Some(Data::Null) | None => default,
            Some(value) => value,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Data::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Data::as_i64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Data::as_bool)
    }

    /// Sets a main-data field, returning the previous value.
    ///
    /// The wire-reserved names ([`TAG_FIELD`], [`AUX_FIELD`], [`ID_FIELD`])
    /// are rejected; use [`ModelObject::set_id`] for the id.
    pub fn set(&mut self, field: &str, value: impl Into<Data>) -> Result<Option<Data>, ModelError> {
        check_field(field)?;
        Ok(self.put(field, value))
    }

    /// Field write for names known not to be reserved.
    pub(crate) fn put(&mut self, field: &str, value: impl Into<Data>) -> Option<Data> {
        self.main.insert(field.to_string(), value.into())
    }

    pub(crate) fn main_mut(&mut self, field: &str) -> Option<&mut Data> {
        self.main.get_mut(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Data> {
        self.main.shift_remove(field)
    }

    // -----------------------------------------------------------------------
    // Aux data
    // -----------------------------------------------------------------------

    pub fn aux_fields(&self) -> Option<&Fields> {
        self.aux.as_ref()
    }

    pub fn aux(&self, label: &str) -> Option<&Data> {
        self.aux.as_ref().and_then(|aux| aux.get(label))
    }

    /// Returns the related object stored under `label`, if it is one.
    pub fn aux_object(&self, label: &str) -> Option<&ModelObject> {
        self.aux(label).and_then(Data::as_object)
    }

    pub fn set_aux(&mut self, label: &str, value: impl Into<Data>) -> Option<Data> {
        self.aux
            .get_or_insert_with(Fields::new)
            .insert(label.to_string(), value.into())
    }

    pub fn remove_aux(&mut self, label: &str) -> Option<Data> {
        self.aux.as_mut().and_then(|aux| aux.shift_remove(label))
    }

    // -----------------------------------------------------------------------
    // Word fields
    // -----------------------------------------------------------------------

    /// Adds `token` to the word field, keeping insertion order.
    ///
    /// Returns `false` if the token was already present or is blank. A field
    /// holding a single string is promoted to a one-word list first; any
    /// other non-list value is replaced.
    pub fn add_word(&mut self, field: &str, token: &str) -> Result<bool, ModelError> {
        check_field(field)?;
        Ok(self.push_word(field, token))
    }

    pub(crate) fn push_word(&mut self, field: &str, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }
        match self.main.get_mut(field) {
            Some(Data::List(words)) => {
                if words.iter().any(|w| w.as_str() == Some(token)) {
                    return false;
                }
                words.push(Data::from(token));
                true
            }
            Some(slot) => {
                let mut words = match std::mem::take(slot) {
                    Data::String(single) if !single.is_empty() => vec![Data::String(single)],
                    Data::Null => Vec::new(),
                    other => {
                        tracing::debug!(field, replaced = ?other, "word field held a non-list value");
                        Vec::new()
                    }
                };
                let added = !words.iter().any(|w| w.as_str() == Some(token));
                if added {
                    words.push(Data::from(token));
                }
                *slot = Data::List(words);
                added
            }
            None => {
                self.main
                    .insert(field.to_string(), Data::List(vec![Data::from(token)]));
                true
            }
        }
    }

    /// Removes `token`; returns `false` if it was not present.
    pub fn remove_word(&mut self, field: &str, token: &str) -> bool {
        match self.main.get_mut(field) {
            Some(Data::List(words)) => {
                let before = words.len();
                words.retain(|w| w.as_str() != Some(token));
                words.len() != before
            }
            Some(slot) if slot.as_str() == Some(token) => {
                *slot = Data::List(Vec::new());
                true
            }
            _ => false,
        }
    }

    pub fn has_word(&self, field: &str, token: &str) -> bool {
        match self.main.get(field) {
            Some(Data::List(words)) => words.iter().any(|w| w.as_str() == Some(token)),
            Some(Data::String(single)) => single.as_str() == token,
            _ => false,
        }
    }

    pub fn count_word(&self, field: &str) -> usize {
        match self.main.get(field) {
            Some(Data::List(words)) => words.len(),
            Some(Data::String(single)) if !single.is_empty() => 1,
            _ => 0,
        }
    }

    /// Returns the words of the field in insertion order.
    pub fn words(&self, field: &str) -> Vec<&str> {
        match self.main.get(field) {
            Some(Data::List(words)) => words.iter().filter_map(Data::as_str).collect(),
            Some(Data::String(single)) if !single.is_empty() => vec![single.as_str()],
            _ => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Wire form
    // -----------------------------------------------------------------------

    /// Emits `{"_t", "id"?, ...main, "_aux"?}`, recursing into nested objects.
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::with_capacity(self.main.len() + 3);
        out.insert(TAG_FIELD.to_string(), Value::String(self.kind.to_string()));
        if let Some(id) = &self.id {
            out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        }
        for (field, value) in &self.main {
            out.insert(field.clone(), value.to_json());
        }
        if let Some(aux) = &self.aux {
            out.insert(
                AUX_FIELD.to_string(),
                Value::Object(aux.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            );
        }
        Value::Object(out)
    }
}

impl Serialize for ModelObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// ModelType
// ---------------------------------------------------------------------------

/// A concrete model type with a wire tag.
///
/// Implementors are thin views over a [`ModelObject`]. Registering one with
/// [`ModelType::check_in`] lets the serializer rebuild it from tagged JSON.
pub trait ModelType: Sized + 'static {
    /// Short wire tag, unique across registered types.
    const TAG: &'static str;

    /// Wraps an object already known to carry [`ModelType::TAG`].
    fn from_object(object: ModelObject) -> Self;

    fn as_object(&self) -> &ModelObject;

    fn into_object(self) -> ModelObject;

    /// Builds the object from decoded wire parts. Types with derived state
    /// (e.g. cached sizes) override this to normalise it.
    fn construct(parts: ObjectParts) -> ModelObject {
        ModelObject::from_parts(Self::tag(), parts)
    }

    fn tag() -> TypeTag {
        TypeTag::from_static(Self::TAG)
    }

    /// Registers this type's factory. Idempotent.
    fn check_in(registry: &mut TypeRegistry) -> Result<(), ModelError> {
        registry.register(Self::tag(), Factory::of::<Self>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object() -> ModelObject {
        ModelObject::new(TypeTag::new("thing").unwrap())
    }

    #[test]
    fn add_word_twice_counts_once() {
        let mut obj = object();
        assert!(obj.add_word("tags", "rust").unwrap());
        assert!(!obj.add_word("tags", "rust").unwrap());
        assert_eq!(obj.count_word("tags"), 1);
        assert!(obj.has_word("tags", "rust"));
    }

    #[test]
    fn remove_absent_word_is_a_noop() {
        let mut obj = object();
        obj.add_word("tags", "a").unwrap();
        assert!(!obj.remove_word("tags", "b"));
        assert_eq!(obj.count_word("tags"), 1);
        assert!(!obj.remove_word("missing", "b"));
    }

    #[test]
    fn words_keep_insertion_order() {
        let mut obj = object();
        for token in ["c", "a", "b", "a"] {
            obj.add_word("tags", token).unwrap();
        }
        assert_eq!(obj.words("tags"), ["c", "a", "b"]);
        assert!(obj.remove_word("tags", "a"));
        assert_eq!(obj.words("tags"), ["c", "b"]);
    }

    #[test]
    fn single_string_word_field_is_promoted() {
        let mut obj = object();
        obj.set("tags", "solo").unwrap();
        assert_eq!(obj.count_word("tags"), 1);
        assert!(obj.add_word("tags", "duo").unwrap());
        assert_eq!(obj.words("tags"), ["solo", "duo"]);
    }

    #[test]
    fn blank_tokens_are_ignored() {
        let mut obj = object();
        assert!(!obj.add_word("tags", "  ").unwrap());
        assert_eq!(obj.count_word("tags"), 0);
    }

    #[test]
    fn reserved_fields_are_rejected() {
        let mut obj = object();
        assert!(obj.set(TAG_FIELD, "x").is_err());
        assert!(obj.set(ID_FIELD, "x").is_err());
        assert!(obj.add_word(AUX_FIELD, "x").is_err());
    }

    #[test]
    fn id_is_immutable_once_set() {
        let mut obj = object();
        obj.set_id(ObjectId::new("a").unwrap()).unwrap();
        obj.set_id(ObjectId::new("a").unwrap()).unwrap();
        assert_eq!(
            obj.set_id(ObjectId::new("b").unwrap()),
            Err(ModelError::IdAlreadySet {
                existing: "a".into()
            })
        );
    }

    #[test]
    fn get_or_falls_back_on_absent_and_null() {
        let mut obj = object();
        obj.set("n", Data::Null).unwrap();
        let default = Data::from("d");
        assert_eq!(obj.get_or("n", &default), &default);
        assert_eq!(obj.get_or("missing", &default), &default);
        obj.set("n", 3_i64).unwrap();
        assert_eq!(obj.get_or("n", &default).as_i64(), Some(3));
    }

    #[test]
    fn create_new_assigns_id_and_marks_new() {
        let obj = ModelObject::create_new(TypeTag::new("thing").unwrap(), None);
        assert!(obj.id().is_some());
        assert!(obj.is_new());
    }

    #[test]
    fn wire_form_injects_tag_id_and_aux() {
        let mut obj = ModelObject::from_parts(
            TypeTag::new("post").unwrap(),
            ObjectParts {
                id: ObjectId::new("p1"),
                ..ObjectParts::default()
            },
        );
        obj.set("txt", "hi").unwrap();
        obj.set_aux("stats", Data::plain(json!({ "likes": 2 })));
        assert_eq!(
            obj.to_json(),
            json!({ "_t": "post", "id": "p1", "txt": "hi", "_aux": { "stats": { "likes": 2 } } })
        );
    }

    #[test]
    fn parts_keep_non_string_ids_as_plain_fields() {
        let fields = match Data::plain(json!({ "_t": "x", "id": 5, "_aux": "odd" })) {
            Data::Map(fields) => fields,
            _ => unreachable!(),
        };
        let parts = ObjectParts::from_wire(fields);
        assert_eq!(parts.id, None);
        assert_eq!(parts.aux, None);
        assert_eq!(parts.main.get(ID_FIELD).and_then(Data::as_i64), Some(5));
        assert!(parts.main.contains_key(AUX_FIELD));
    }
}
