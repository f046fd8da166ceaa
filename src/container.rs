//! The capability interface shared by every keyed container.
//!
//! Path navigation and merging are written once against [`Container`] and
//! work unchanged for persistent maps, plain maps and typed records.
//! Collaborators that only need to read or write keyed values depend on this
//! trait rather than on a concrete container.

use std::convert::Infallible;

use crate::persistent::{PersistentMap, hash_entries};
use crate::value::{PlainMap, Value};

/// A keyed container of [`Value`]s with value semantics.
///
/// Writes return a new container and never modify `self`. Containers that
/// validate keys (typed records) report rejections through
/// [`Container::Error`]; the others use [`Infallible`].
///
/// # Examples
///
/// ```rust
/// use typed_map::{Container, PlainMap, Value};
/// use typed_map::persistent::PersistentMap;
///
/// fn describe<C: Container>(container: &C) -> usize {
///     container.entries().filter(|(_, value)| !value.is_null()).count()
/// }
///
/// let map = PersistentMap::singleton("a".to_string(), Value::from(1));
/// let plain = PlainMap::from([("a".to_string(), Value::Null)]);
/// assert_eq!(describe(&map), 1);
/// assert_eq!(describe(&plain), 0);
/// ```
pub trait Container: Clone + PartialEq {
    /// Error returned by rejected writes.
    type Error;

    /// Returns the value stored for `key`.
    fn get_value(&self, key: &str) -> Option<&Value>;

    /// Returns `true` if `key` is present.
    fn has_key(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Returns a container with `key` set to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Container::Error`] when the container rejects `key`.
    fn set_value(&self, key: &str, value: Value) -> Result<Self, Self::Error>;

    /// Returns a container without `key`.
    fn delete_value(&self, key: &str) -> Self;

    /// Iterates over the entries in the container's own stable order.
    fn entries(&self) -> impl Iterator<Item = (&String, &Value)>;

    /// Number of entries.
    fn size(&self) -> usize;

    /// Order-independent structural hash, consistent with `PartialEq`.
    fn hash_code(&self) -> u64;

    /// Wraps the container as a nested [`Value`].
    fn into_value(self) -> Value;
}

impl Container for PersistentMap<String, Value> {
    type Error = Infallible;

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }

    fn set_value(&self, key: &str, value: Value) -> Result<Self, Infallible> {
        Ok(self.insert(key.to_owned(), value))
    }

    fn delete_value(&self, key: &str) -> Self {
        self.remove(key)
    }

    fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.iter()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn hash_code(&self) -> u64 {
        Self::hash_code(self)
    }

    fn into_value(self) -> Value {
        Value::Map(self)
    }
}

impl Container for PlainMap {
    type Error = Infallible;

    fn get_value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }

    fn set_value(&self, key: &str, value: Value) -> Result<Self, Infallible> {
        let mut plain = self.clone();
        plain.insert(key.to_owned(), value);
        Ok(plain)
    }

    fn delete_value(&self, key: &str) -> Self {
        let mut plain = self.clone();
        plain.remove(key);
        plain
    }

    fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.iter()
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn hash_code(&self) -> u64 {
        hash_entries(self)
    }

    fn into_value(self) -> Value {
        Value::Plain(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn roundtrip<C: Container<Error = Infallible>>(container: &C) -> C {
        let Ok(written) = container.set_value("extra", Value::from(true));
        written.delete_value("extra")
    }

    #[rstest]
    fn test_persistent_and_plain_agree_on_hash() {
        let map = PersistentMap::new()
            .insert("a".to_string(), Value::from(1))
            .insert("b".to_string(), Value::from("two"));
        let plain: PlainMap = map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        assert_eq!(Container::hash_code(&map), Container::hash_code(&plain));
        assert_eq!(map.clone().into_value(), plain.clone().into_value());
    }

    #[rstest]
    fn test_set_then_delete_restores_content() {
        let map = PersistentMap::singleton("a".to_string(), Value::from(1));
        let plain = PlainMap::from([("a".to_string(), Value::from(1))]);

        assert_eq!(roundtrip(&map), map);
        assert_eq!(roundtrip(&plain), plain);
    }

    #[rstest]
    fn test_has_key_default() {
        let plain = PlainMap::from([("a".to_string(), Value::Null)]);
        assert!(plain.has_key("a"));
        assert!(!plain.has_key("b"));
    }
}
