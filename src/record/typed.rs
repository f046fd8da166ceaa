//! The schema-typed persistent record.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::container::Container;
use crate::error::RecordError;
use crate::merge::Merger;
use crate::path;
use crate::persistent::{PersistentMap, PersistentMapIterator};
use crate::value::{PlainMap, Value};

use super::field::{Field, FieldValue};
use super::key_path::KeyPath;
use super::schema::Schema;
use super::session::{MutableRecord, RecordSession};

/// A persistent record whose field set is fixed by the schema `S`.
///
/// Every write returns a new record sharing untouched structure with the
/// original. Writes through a [`Field`] are statically known to be valid;
/// writes through a string key are checked against `S::FIELDS` before the
/// trie is touched and fail with [`RecordError::UnknownField`].
///
/// # Examples
///
/// ```rust
/// use typed_map::{RecordError, Schema, TypedMap, Value};
///
/// #[derive(Schema)]
/// struct Drink {
///     name: String,
///     price: i64,
/// }
///
/// let latte = TypedMap::<Drink>::create([("name", Value::from("Latte")), ("price", Value::from(10))])?;
/// let mocha = latte.set(Drink::NAME, "Mocha".to_string());
///
/// assert_eq!(latte.get(Drink::NAME).as_deref(), Some("Latte"));
/// assert_eq!(mocha.get(Drink::NAME).as_deref(), Some("Mocha"));
/// assert_ne!(latte, mocha);
/// assert_eq!(latte.get_value_or("missing", &Value::from("N/A")), &Value::from("N/A"));
///
/// assert!(matches!(
///     latte.set_key("color", Value::from("brown")),
///     Err(RecordError::UnknownField { .. })
/// ));
/// # Ok::<(), RecordError>(())
/// ```
pub struct TypedMap<S> {
    map: PersistentMap<String, Value>,
    _schema: PhantomData<fn() -> S>,
}

impl<S> TypedMap<S> {
    pub(crate) const fn wrap(map: PersistentMap<String, Value>) -> Self {
        Self {
            map,
            _schema: PhantomData,
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Returns the value stored under `key`, or `not_set` when absent.
    #[must_use]
    pub fn get_value_or<'a>(&'a self, key: &str, not_set: &'a Value) -> &'a Value {
        self.map.get_or(key, not_set)
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of stored fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no field is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the stored fields in stable trie order.
    #[must_use]
    pub fn iter(&self) -> PersistentMapIterator<'_, String, Value> {
        self.map.iter()
    }

    /// Iterates over the stored field names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }

    /// Returns `true` if both records share the same root node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.map.ptr_eq(&other.map)
    }

    /// Order-independent structural hash, cached per instance.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.map.hash_code()
    }

    /// The underlying persistent map.
    #[must_use]
    pub const fn as_map(&self) -> &PersistentMap<String, Value> {
        &self.map
    }

    /// Unwraps the underlying persistent map.
    #[must_use]
    pub fn into_map(self) -> PersistentMap<String, Value> {
        self.map
    }

    /// Converts the record and every nested mapping into [`PlainMap`]s.
    #[must_use]
    pub fn to_plain_deep(&self) -> PlainMap {
        self.map
            .iter()
            .map(|(key, value)| (key.clone(), value.to_plain_deep()))
            .collect()
    }

    /// Converts only the top level; nested values are kept as they are.
    #[must_use]
    pub fn to_plain_shallow(&self) -> PlainMap {
        self.map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl<S: Schema> TypedMap<S> {
    /// Creates a record from the schema defaults merged with `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] for the first name the schema
    /// does not declare.
    pub fn create<I, K>(fields: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut transient = Self::defaults_map().transient();
        for (key, value) in fields {
            let key = key.into();
            Self::check_field(&key)?;
            transient.insert(key, value);
        }
        Ok(Self::wrap(transient.persistent()))
    }

    /// Wraps an existing map after checking every key against the schema.
    ///
    /// Fields missing from `map` stay missing; use [`create`](Self::create)
    /// to start from the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] for the first undeclared key.
    pub fn from_map(map: PersistentMap<String, Value>) -> Result<Self, RecordError> {
        if let Some(key) = map.keys().find(|key| !S::has_field(key)) {
            return Err(Self::unknown_field(key));
        }
        Ok(Self::wrap(map))
    }

    /// Creates a record from a plain mapping, filling absent fields with the
    /// schema defaults.
    ///
    /// Nested plain mappings are stored as they are; they compare equal to
    /// persistent mappings with the same entries.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] for the first undeclared key.
    pub fn from_plain(plain: PlainMap) -> Result<Self, RecordError> {
        Self::create(plain)
    }

    pub(crate) fn from_fields(fields: Vec<(&'static str, Value)>) -> Self {
        Self::wrap(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        )
    }

    /// Reads the struct instance this record describes.
    #[must_use]
    pub fn to_struct(&self) -> Option<S> {
        S::from_record(self)
    }

    // -------------------------------------------------------------------------
    // Single-level access
    // -------------------------------------------------------------------------

    /// Returns the typed value of `field`, or `None` when it is missing or
    /// holds a value of another type.
    #[must_use]
    pub fn get<T: FieldValue>(&self, field: Field<S, T>) -> Option<T> {
        self.map.get(field.name()).and_then(T::from_value)
    }

    /// Returns the typed value of `field`, or `not_set`.
    #[must_use]
    pub fn get_or<T: FieldValue>(&self, field: Field<S, T>, not_set: T) -> T {
        self.get(field).unwrap_or(not_set)
    }

    /// Returns a record with `field` set to `value`.
    ///
    /// Setting the value already stored returns a record sharing this one's
    /// root.
    #[must_use]
    pub fn set<T: FieldValue>(&self, field: Field<S, T>, value: T) -> Self {
        Self::wrap(self.map.insert(field.name().to_owned(), value.into_value()))
    }

    /// Returns a record with `key` set to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when `key` is not declared.
    pub fn set_key(&self, key: &str, value: impl Into<Value>) -> Result<Self, RecordError> {
        Self::check_field(key)?;
        Ok(Self::wrap(self.map.insert(key.to_owned(), value.into())))
    }

    /// Returns a record with `field` replaced by `updater(current)`.
    #[must_use]
    pub fn update<T, F>(&self, field: Field<S, T>, updater: F) -> Self
    where
        T: FieldValue,
        F: FnOnce(Option<T>) -> T,
    {
        self.set(field, updater(self.get(field)))
    }

    /// Returns a record without `key`.
    ///
    /// Removing an absent key returns a record sharing this one's root.
    #[must_use]
    pub fn delete(&self, key: &str) -> Self {
        Self::wrap(self.map.remove(key))
    }

    /// Returns a record holding only the fields accepted by `predicate`.
    #[must_use]
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&str, &Value) -> bool,
    {
        Self::wrap(self.map.filter(|key, value| predicate(key, value)))
    }

    // -------------------------------------------------------------------------
    // Typed nested access
    // -------------------------------------------------------------------------

    /// Reads `inner` from the nested record stored in `outer`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::{Schema, TypedMap};
    ///
    /// #[derive(Schema)]
    /// struct Address {
    ///     #[field(default = "NY".to_string())]
    ///     city: String,
    /// }
    ///
    /// #[derive(Schema)]
    /// struct Profile {
    ///     address: TypedMap<Address>,
    /// }
    ///
    /// let profile = TypedMap::<Profile>::default();
    /// let moved = profile.set_nested(Profile::ADDRESS, Address::CITY, "LA".to_string());
    ///
    /// assert_eq!(profile.get_nested(Profile::ADDRESS, Address::CITY).as_deref(), Some("NY"));
    /// assert_eq!(moved.get_nested(Profile::ADDRESS, Address::CITY).as_deref(), Some("LA"));
    /// ```
    #[must_use]
    pub fn get_nested<I, T>(&self, outer: Field<S, TypedMap<I>>, inner: Field<I, T>) -> Option<T>
    where
        I: Schema,
        T: FieldValue,
    {
        self.map
            .get(outer.name())?
            .get(inner.name())
            .and_then(T::from_value)
    }

    /// Sets `inner` inside the nested record stored in `outer`, creating the
    /// nested record when it is missing.
    #[must_use]
    pub fn set_nested<I, T>(&self, outer: Field<S, TypedMap<I>>, inner: Field<I, T>, value: T) -> Self
    where
        I: Schema,
        T: FieldValue,
    {
        let path = [outer.name(), inner.name()];
        let Ok(updated) = path::update_in_container(&self.map, &path, |_| value.into_value());
        Self::wrap(updated)
    }

    // -------------------------------------------------------------------------
    // Path access
    // -------------------------------------------------------------------------

    /// Returns the value at `path`, or `None` if the path does not resolve.
    #[must_use]
    pub fn get_in(&self, path: &KeyPath) -> Option<&Value> {
        path::get_in_container(&self.map, path.keys())
    }

    /// Returns the value at `path`, or `not_set`.
    #[must_use]
    pub fn get_in_or<'a>(&'a self, path: &KeyPath, not_set: &'a Value) -> &'a Value {
        self.get_in(path).unwrap_or(not_set)
    }

    /// Returns the value at `path` converted to the caller-asserted type.
    #[must_use]
    pub fn get_in_as<T: FieldValue>(&self, path: &KeyPath) -> Option<T> {
        self.get_in(path).and_then(T::from_value)
    }

    /// Returns `true` when `path` resolves to a stored value.
    #[must_use]
    pub fn has_in(&self, path: &KeyPath) -> bool {
        self.get_in(path).is_some()
    }

    /// Returns a record with `value` stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when the first key is not a
    /// declared field.
    pub fn set_in(&self, path: &KeyPath, value: impl Into<Value>) -> Result<Self, RecordError> {
        let value = value.into();
        self.update_in(path, |_| value)
    }

    /// Returns a record with the value at `path` replaced by
    /// `updater(current)`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when the first key is not a
    /// declared field.
    pub fn update_in<F>(&self, path: &KeyPath, updater: F) -> Result<Self, RecordError>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        Self::check_path(path)?;
        path::update_in_container(self, path.keys(), updater)
    }

    /// Returns a record without the key at the end of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when the first key is not a
    /// declared field.
    pub fn delete_in(&self, path: &KeyPath) -> Result<Self, RecordError> {
        Self::check_path(path)?;
        path::delete_in_container(self, path.keys())
    }

    /// Shallow-merges mapping `sources` into the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when the first key is not a
    /// declared field.
    pub fn merge_in<'s, I>(&self, path: &KeyPath, sources: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = &'s Value>,
    {
        Self::check_path(path)?;
        path::merge_in_container(self, path.keys(), sources, false)
    }

    /// Deep-merges mapping `sources` into the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when the first key is not a
    /// declared field.
    pub fn merge_deep_in<'s, I>(&self, path: &KeyPath, sources: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = &'s Value>,
    {
        Self::check_path(path)?;
        path::merge_in_container(self, path.keys(), sources, true)
    }

    // -------------------------------------------------------------------------
    // Merging
    // -------------------------------------------------------------------------

    /// Merges `sources` left to right; later sources win.
    #[must_use]
    pub fn merge<'a, I>(&self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        Self::wrap(self.map.merge(sources.into_iter().map(Self::as_map)))
    }

    /// Merges `sources`, resolving conflicts with
    /// `combiner(existing, incoming, key)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::{Schema, TypedMap, Value};
    ///
    /// #[derive(Schema)]
    /// struct Tally {
    ///     a: i64,
    ///     b: i64,
    ///     c: i64,
    /// }
    ///
    /// let left = TypedMap::<Tally>::create([("a", Value::from(1)), ("b", Value::from(2))])?;
    /// let right = TypedMap::<Tally>::create([("b", Value::from(10)), ("c", Value::from(3))])?;
    /// let merged = left.merge_with(
    ///     |existing, incoming, _key| Value::from(existing.as_int().unwrap_or(0) + incoming.as_int().unwrap_or(0)),
    ///     [&right],
    /// );
    ///
    /// assert_eq!(merged.get(Tally::A), Some(1));
    /// assert_eq!(merged.get(Tally::B), Some(12));
    /// assert_eq!(merged.get(Tally::C), Some(3));
    /// # Ok::<(), typed_map::RecordError>(())
    /// ```
    #[must_use]
    pub fn merge_with<'a, F, I>(&self, mut combiner: F, sources: I) -> Self
    where
        F: FnMut(&Value, &Value, &str) -> Value,
        I: IntoIterator<Item = &'a Self>,
    {
        Self::wrap(self.map.merge_with(
            |existing, incoming, key| combiner(existing, incoming, key),
            sources.into_iter().map(Self::as_map),
        ))
    }

    /// Merges `sources` recursively; see
    /// [`PersistentMap::merge_deep`](crate::persistent::PersistentMap::merge_deep).
    #[must_use]
    pub fn merge_deep<'a, I>(&self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        Self::wrap(self.map.merge_deep(sources.into_iter().map(Self::as_map)))
    }

    /// Deep merge with a combiner for non-mapping conflicts.
    #[must_use]
    pub fn merge_deep_with<'a, F, I>(&self, combiner: F, sources: I) -> Self
    where
        F: FnMut(&Value, &Value, &str) -> Value,
        I: IntoIterator<Item = &'a Self>,
    {
        Self::wrap(
            self.map
                .merge_deep_with(combiner, sources.into_iter().map(Self::as_map)),
        )
    }

    /// Merges untyped mapping values, checking every key against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] for the first undeclared key;
    /// `self` is left as it was.
    pub fn merge_values<'s, I>(&self, sources: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = &'s Value>,
    {
        let sources: Vec<&Value> = sources.into_iter().collect();
        if let Some(key) = sources
            .iter()
            .flat_map(|source| source.entries())
            .map(|(key, _)| key)
            .find(|key| !S::has_field(key))
        {
            return Err(Self::unknown_field(key));
        }
        let mut merger = Merger::shallow();
        Ok(Self::wrap(merger.merge_persistent(
            &self.map,
            sources.into_iter().map(Value::entries),
        )))
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Opens a batched mutation session over this record.
    #[must_use]
    pub fn begin(&self) -> RecordSession<S> {
        RecordSession::new(self)
    }

    /// Runs `mutations` inside a session and freezes the result.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `mutations`; the record is
    /// left as it was.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::{RecordError, Schema, TypedMap};
    ///
    /// #[derive(Schema)]
    /// struct Counter {
    ///     hits: i64,
    ///     misses: i64,
    /// }
    ///
    /// let counter = TypedMap::<Counter>::default();
    /// let updated = counter.with_mutations(|session| {
    ///     session.set(Counter::HITS, 3).set(Counter::MISSES, 1);
    ///     Ok(())
    /// })?;
    /// assert_eq!(updated.get(Counter::HITS), Some(3));
    /// # Ok::<(), RecordError>(())
    /// ```
    pub fn with_mutations<F>(&self, mutations: F) -> Result<Self, RecordError>
    where
        F: FnOnce(&mut RecordSession<S>) -> Result<(), RecordError>,
    {
        let mut session = self.begin();
        mutations(&mut session)?;
        Ok(session.end())
    }

    /// Opens a long-lived mutable handle; see [`MutableRecord`].
    #[must_use]
    pub fn as_mutable(&self) -> MutableRecord<S> {
        MutableRecord::new(self.begin())
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn defaults_map() -> PersistentMap<String, Value> {
        S::defaults()
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect()
    }

    pub(crate) fn check_field(key: &str) -> Result<(), RecordError> {
        if S::has_field(key) {
            Ok(())
        } else {
            Err(Self::unknown_field(key))
        }
    }

    fn check_path(path: &KeyPath) -> Result<(), RecordError> {
        path.keys()
            .first()
            .map_or(Ok(()), |first| Self::check_field(first))
    }

    fn unknown_field(key: &str) -> RecordError {
        tracing::warn!(schema = S::TYPE_NAME, field = key, "rejected write to undeclared field");
        RecordError::UnknownField {
            schema: S::TYPE_NAME,
            field: key.to_owned(),
        }
    }
}

// =============================================================================
// Container
// =============================================================================

impl<S: Schema> Container for TypedMap<S> {
    type Error = RecordError;

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    fn set_value(&self, key: &str, value: Value) -> Result<Self, RecordError> {
        self.set_key(key, value)
    }

    fn delete_value(&self, key: &str) -> Self {
        self.delete(key)
    }

    fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.map.iter()
    }

    fn size(&self) -> usize {
        self.map.len()
    }

    fn hash_code(&self) -> u64 {
        self.map.hash_code()
    }

    fn into_value(self) -> Value {
        Value::Map(self.map)
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<S> Clone for TypedMap<S> {
    fn clone(&self) -> Self {
        Self::wrap(self.map.clone())
    }
}

impl<S: Schema> Default for TypedMap<S> {
    /// A record holding the schema defaults.
    fn default() -> Self {
        Self::wrap(Self::defaults_map())
    }
}

impl<S> PartialEq for TypedMap<S> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<S> Eq for TypedMap<S> {}

impl<S> Hash for TypedMap<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.map.hash(state);
    }
}

impl<'a, S> IntoIterator for &'a TypedMap<S> {
    type Item = (&'a String, &'a Value);
    type IntoIter = PersistentMapIterator<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<S: Schema> fmt::Debug for TypedMap<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(S::TYPE_NAME)?;
        formatter.debug_map().entries(self.map.iter()).finish()
    }
}

impl<S: Schema> fmt::Display for TypedMap<S> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", S::TYPE_NAME, self.map)
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<S> serde::Serialize for TypedMap<S> {
    fn serialize<Z>(&self, serializer: Z) -> Result<Z::Ok, Z::Error>
    where
        Z: serde::Serializer,
    {
        serde::Serialize::serialize(&self.map, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, S: Schema> serde::Deserialize<'de> for TypedMap<S> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = <PersistentMap<String, Value> as serde::Deserialize>::deserialize(deserializer)?;
        Self::create(map).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
