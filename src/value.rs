//! Dynamic values stored in record fields.
//!
//! A [`Value`] is either a scalar, a list, or one of two *mapping*
//! representations:
//!
//! - [`Value::Map`]: a nested [`PersistentMap`], shared structurally
//! - [`Value::Plain`]: an ordinary ordered mapping ([`PlainMap`]), the shape
//!   produced by [`Value::to_plain_deep`] and handed to serializers
//!
//! Equality is structural. Two mappings with the same entries are equal
//! whichever representation holds them, and they hash identically.

use std::collections::{BTreeMap, btree_map};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::persistent::{PersistentMap, PersistentMapIterator, hash_entries};

/// Plain ordered key→value mapping.
pub type PlainMap = BTreeMap<String, Value>;

/// A dynamically typed record value.
///
/// # Examples
///
/// ```rust
/// use typed_map::{PlainMap, Value};
/// use typed_map::persistent::PersistentMap;
///
/// let persistent = Value::Map(PersistentMap::singleton("city".to_string(), Value::from("NY")));
/// let plain = Value::Plain(PlainMap::from([("city".to_string(), Value::from("NY"))]));
///
/// assert_eq!(persistent, plain);
/// assert_eq!(persistent.to_plain_deep(), plain);
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number. Compared and hashed by bit pattern, with `-0.0`
    /// treated as `0.0` and every NaN treated as one value.
    Float(f64),
    /// Text.
    Text(String),
    /// Sequence of values.
    List(Vec<Value>),
    /// Nested persistent mapping.
    Map(PersistentMap<String, Value>),
    /// Nested plain mapping.
    Plain(PlainMap),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for either mapping representation.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Plain(_))
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the number, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the elements, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the persistent mapping, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&PersistentMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the plain mapping, if this is one.
    #[must_use]
    pub const fn as_plain(&self) -> Option<&PlainMap> {
        match self {
            Self::Plain(plain) => Some(plain),
            _ => None,
        }
    }

    /// Looks up `key` in a mapping, or the element at index `key` in a list.
    ///
    /// List indices are canonical decimal strings (`"0"`, `"12"`); any other
    /// key misses.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::Value;
    ///
    /// let tags = Value::List(vec![Value::from("a"), Value::from("b")]);
    /// assert_eq!(tags.get("1"), Some(&Value::from("b")));
    /// assert_eq!(tags.get("01"), None);
    /// assert_eq!(tags.get("first"), None);
    /// ```
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(key),
            Self::Plain(plain) => plain.get(key),
            Self::List(values) => values.get(list_index(key)?),
            _ => None,
        }
    }

    /// Iterates over the entries of a mapping; yields nothing for any other
    /// value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::{PlainMap, Value};
    ///
    /// let plain = Value::Plain(PlainMap::from([("a".to_string(), Value::from(1))]));
    /// assert_eq!(plain.entries().count(), 1);
    /// assert_eq!(Value::from(1).entries().count(), 0);
    /// ```
    #[must_use]
    pub fn entries(&self) -> Entries<'_> {
        let inner = match self {
            Self::Map(map) => EntriesInner::Map(map.iter()),
            Self::Plain(plain) => EntriesInner::Plain(plain.iter()),
            _ => EntriesInner::Empty,
        };
        Entries { inner }
    }

    /// Number of entries of a mapping, elements of a list, `None` otherwise.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Map(map) => Some(map.len()),
            Self::Plain(plain) => Some(plain.len()),
            Self::List(values) => Some(values.len()),
            _ => None,
        }
    }

    /// Recursively converts every nested persistent mapping into a
    /// [`PlainMap`], including mappings inside lists.
    #[must_use]
    pub fn to_plain_deep(&self) -> Self {
        match self {
            Self::Map(map) => Self::Plain(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_plain_deep()))
                    .collect(),
            ),
            Self::Plain(plain) => Self::Plain(
                plain
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_plain_deep()))
                    .collect(),
            ),
            Self::List(values) => Self::List(values.iter().map(Self::to_plain_deep).collect()),
            scalar => scalar.clone(),
        }
    }

    /// Entry-wise comparison of two mappings in different representations.
    fn mapping_eq(map: &PersistentMap<String, Self>, plain: &PlainMap) -> bool {
        map.len() == plain.len()
            && plain
                .iter()
                .all(|(key, value)| map.get(key.as_str()).is_some_and(|other| other == value))
    }
}

/// Iterator over the entries of a mapping [`Value`], see [`Value::entries`].
#[derive(Clone)]
pub struct Entries<'a> {
    inner: EntriesInner<'a>,
}

#[derive(Clone)]
enum EntriesInner<'a> {
    Map(PersistentMapIterator<'a, String, Value>),
    Plain(btree_map::Iter<'a, String, Value>),
    Empty,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a String, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            EntriesInner::Map(iterator) => iterator.next(),
            EntriesInner::Plain(iterator) => iterator.next(),
            EntriesInner::Empty => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            EntriesInner::Map(iterator) => iterator.size_hint(),
            EntriesInner::Plain(iterator) => iterator.size_hint(),
            EntriesInner::Empty => (0, Some(0)),
        }
    }
}

/// Parses a list index written as a canonical decimal string.
pub(crate) fn list_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|byte| byte.is_ascii_digit())
        && (key.len() == 1 || !key.starts_with('0'));
    if canonical { key.parse().ok() } else { None }
}

const fn normalized_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

// =============================================================================
// Equality and Hashing
// =============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Int(left), Self::Int(right)) => left == right,
            (Self::Float(left), Self::Float(right)) => {
                normalized_bits(*left) == normalized_bits(*right)
            }
            (Self::Text(left), Self::Text(right)) => left == right,
            (Self::List(left), Self::List(right)) => left == right,
            (Self::Map(left), Self::Map(right)) => left == right,
            (Self::Plain(left), Self::Plain(right)) => left == right,
            (Self::Map(map), Self::Plain(plain)) | (Self::Plain(plain), Self::Map(map)) => {
                Self::mapping_eq(map, plain)
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => state.write_u8(0),
            Self::Bool(value) => {
                state.write_u8(1);
                value.hash(state);
            }
            Self::Int(value) => {
                state.write_u8(2);
                value.hash(state);
            }
            Self::Float(value) => {
                state.write_u8(3);
                state.write_u64(normalized_bits(*value));
            }
            Self::Text(value) => {
                state.write_u8(4);
                value.hash(state);
            }
            Self::List(values) => {
                state.write_u8(5);
                values.hash(state);
            }
            // Both mapping representations share one tag and one entry hash.
            Self::Map(map) => {
                state.write_u8(6);
                state.write_u64(map.hash_code());
            }
            Self::Plain(plain) => {
                state.write_u8(6);
                state.write_u64(hash_entries(plain));
            }
        }
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(formatter, "null"),
            Self::Bool(value) => write!(formatter, "{value}"),
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Float(value) => write!(formatter, "{value}"),
            Self::Text(value) => write!(formatter, "{value:?}"),
            Self::List(values) => {
                write!(formatter, "[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(formatter, ", ")?;
                    }
                    write!(formatter, "{value}")?;
                }
                write!(formatter, "]")
            }
            Self::Map(map) => write!(formatter, "{map}"),
            Self::Plain(plain) => {
                write!(formatter, "{{")?;
                for (index, (key, value)) in plain.iter().enumerate() {
                    if index > 0 {
                        write!(formatter, ", ")?;
                    }
                    write!(formatter, "{key}: {value}")?;
                }
                write!(formatter, "}}")
            }
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(values: Vec<Self>) -> Self {
        Self::List(values)
    }
}

impl From<PersistentMap<String, Self>> for Value {
    fn from(map: PersistentMap<String, Self>) -> Self {
        Self::Map(map)
    }
}

impl From<PlainMap> for Value {
    fn from(plain: PlainMap) -> Self {
        Self::Plain(plain)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Text(value) => serializer.serialize_str(value),
            Self::List(values) => serde::Serialize::serialize(values, serializer),
            Self::Map(map) => serde::Serialize::serialize(map, serializer),
            Self::Plain(plain) => serde::Serialize::serialize(plain, serializer),
        }
    }
}

#[cfg(feature = "serde")]
struct ValueVisitor;

#[cfg(feature = "serde")]
impl<'de> serde::de::Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a record value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde::Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E>(self, value: bool) -> Result<Value, E> {
        Ok(Value::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Value, E> {
        Ok(Value::Int(value))
    }

    fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Value, E> {
        i64::try_from(value)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {value} does not fit in i64")))
    }

    fn visit_f64<E>(self, value: f64) -> Result<Value, E> {
        Ok(Value::Float(value))
    }

    fn visit_str<E>(self, value: &str) -> Result<Value, E> {
        Ok(Value::Text(value.to_owned()))
    }

    fn visit_string<E>(self, value: String) -> Result<Value, E> {
        Ok(Value::Text(value))
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut values = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(value) = access.next_element()? {
            values.push(value);
        }
        Ok(Value::List(values))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut transient = crate::persistent::TransientMap::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            transient.insert(key, value);
        }
        Ok(Value::Map(transient.persistent()))
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

// =============================================================================
// Tests
// =============================================================================
