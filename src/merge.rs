//! Shallow and deep merging of mapping values.
//!
//! A shallow merge overwrites (or combines) the value stored at each key. A
//! deep merge recurses whenever both the stored and the incoming value are
//! mappings, keeping the representation of the stored one, and falls back to
//! overwrite (or the combiner) for everything else.
//!
//! # Examples
//!
//! ```rust
//! use typed_map::Value;
//! use typed_map::persistent::PersistentMap;
//!
//! let address = |city: &str| {
//!     Value::Map(PersistentMap::singleton("city".to_string(), Value::from(city)))
//! };
//! let base = PersistentMap::new()
//!     .insert("address".to_string(), address("NY"))
//!     .insert("name".to_string(), Value::from("Ada"));
//! let patch = PersistentMap::singleton(
//!     "address".to_string(),
//!     Value::Map(PersistentMap::singleton("zip".to_string(), Value::from(10001))),
//! );
//!
//! let merged = base.merge_deep([&patch]);
//! let merged_address = merged.get("address").unwrap();
//! assert_eq!(merged_address.get("city"), Some(&Value::from("NY")));
//! assert_eq!(merged_address.get("zip"), Some(&Value::from(10001)));
//! ```

use crate::persistent::PersistentMap;
use crate::value::{PlainMap, Value};

/// Conflict resolver: `(existing, incoming, key) -> merged`.
pub type Combiner<'f> = &'f mut dyn FnMut(&Value, &Value, &str) -> Value;

/// Merge strategy shared by maps, plain maps, paths and typed records.
pub(crate) struct Merger<'f> {
    deep: bool,
    combiner: Option<Combiner<'f>>,
}

impl<'f> Merger<'f> {
    pub(crate) const fn shallow() -> Self {
        Self {
            deep: false,
            combiner: None,
        }
    }

    pub(crate) const fn deep() -> Self {
        Self {
            deep: true,
            combiner: None,
        }
    }

    pub(crate) fn with_combiner(self, combiner: Combiner<'f>) -> Self {
        Self {
            combiner: Some(combiner),
            ..self
        }
    }

    /// Computes the value to store for `key` given what is already there.
    pub(crate) fn resolve(&mut self, key: &str, existing: Option<&Value>, incoming: &Value) -> Value {
        match existing {
            None => incoming.clone(),
            Some(existing) if self.deep && existing.is_mapping() && incoming.is_mapping() => {
                self.merge_value(Some(existing), [incoming])
            }
            Some(existing) => match self.combiner.as_mut() {
                Some(combiner) => combiner(existing, incoming, key),
                None => incoming.clone(),
            },
        }
    }

    /// Merges mapping `sources` into `target`.
    ///
    /// A `Plain` target stays `Plain`; any other target (missing, `Null` or a
    /// scalar) starts over as an empty `Map`. Non-mapping sources contribute
    /// nothing.
    pub(crate) fn merge_value<'v, I>(&mut self, target: Option<&Value>, sources: I) -> Value
    where
        I: IntoIterator<Item = &'v Value>,
    {
        let sources = sources.into_iter().map(Value::entries);
        match target {
            Some(Value::Plain(plain)) => Value::Plain(self.merge_plain(plain, sources)),
            Some(Value::Map(map)) => Value::Map(self.merge_persistent(map, sources)),
            _ => Value::Map(self.merge_persistent(&PersistentMap::new(), sources)),
        }
    }

    pub(crate) fn merge_persistent<'v, I, E>(
        &mut self,
        target: &PersistentMap<String, Value>,
        sources: I,
    ) -> PersistentMap<String, Value>
    where
        I: IntoIterator<Item = E>,
        E: IntoIterator<Item = (&'v String, &'v Value)>,
    {
        let mut transient = target.transient();
        for source in sources {
            for (key, incoming) in source {
                let merged = self.resolve(key, transient.get(key.as_str()), incoming);
                transient.insert(key.clone(), merged);
            }
        }
        transient.persistent()
    }

    fn merge_plain<'v, I, E>(&mut self, target: &PlainMap, sources: I) -> PlainMap
    where
        I: IntoIterator<Item = E>,
        E: IntoIterator<Item = (&'v String, &'v Value)>,
    {
        let mut plain = target.clone();
        for source in sources {
            for (key, incoming) in source {
                let merged = self.resolve(key, plain.get(key.as_str()), incoming);
                plain.insert(key.clone(), merged);
            }
        }
        plain
    }
}

impl PersistentMap<String, Value> {
    /// Merges `sources` recursively, left to right.
    ///
    /// Where both the stored and the incoming value are mappings they are
    /// merged in turn; any other incoming value overwrites.
    #[must_use]
    pub fn merge_deep<'a, I>(&self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        Merger::deep().merge_persistent(self, sources)
    }

    /// Like [`merge_deep`](Self::merge_deep), but non-mapping conflicts are
    /// resolved with `combiner(existing, incoming, key)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::Value;
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let totals = |count: i64| {
    ///     let inner = PersistentMap::singleton("count".to_string(), Value::from(count));
    ///     PersistentMap::singleton("stats".to_string(), Value::Map(inner))
    /// };
    ///
    /// let merged = totals(1).merge_deep_with(
    ///     |existing, incoming, _key| match (existing, incoming) {
    ///         (Value::Int(left), Value::Int(right)) => Value::Int(left + right),
    ///         (_, incoming) => incoming.clone(),
    ///     },
    ///     [&totals(2)],
    /// );
    /// assert_eq!(merged, totals(3));
    /// ```
    #[must_use]
    pub fn merge_deep_with<'a, F, I>(&self, mut combiner: F, sources: I) -> Self
    where
        F: FnMut(&Value, &Value, &str) -> Value,
        I: IntoIterator<Item = &'a Self>,
    {
        Merger::deep()
            .with_combiner(&mut combiner)
            .merge_persistent(self, sources)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn nested(outer: &str, inner: &str, value: Value) -> PersistentMap<String, Value> {
        PersistentMap::singleton(
            outer.to_string(),
            Value::Map(PersistentMap::singleton(inner.to_string(), value)),
        )
    }

    #[rstest]
    fn test_shallow_merge_replaces_nested_mapping() {
        let base = nested("profile", "name", Value::from("Ada"));
        let patch = nested("profile", "age", Value::from(36));

        let merged = base.merge([&patch]);
        assert_eq!(merged, patch);
    }

    #[rstest]
    fn test_deep_merge_combines_nested_mappings() {
        let base = nested("profile", "name", Value::from("Ada"));
        let patch = nested("profile", "age", Value::from(36));

        let merged = base.merge_deep([&patch]);
        let profile = merged.get("profile");
        assert_eq!(profile.and_then(|value| value.get("name")), Some(&Value::from("Ada")));
        assert_eq!(profile.and_then(|value| value.get("age")), Some(&Value::from(36)));
    }

    #[rstest]
    fn test_deep_merge_keeps_plain_representation() {
        let base = PersistentMap::singleton(
            "profile".to_string(),
            Value::Plain(PlainMap::from([("name".to_string(), Value::from("Ada"))])),
        );
        let patch = nested("profile", "age", Value::from(36));

        let merged = base.merge_deep([&patch]);
        let profile = merged.get("profile").and_then(Value::as_plain);
        assert_eq!(profile.map(PlainMap::len), Some(2));
    }

    #[rstest]
    fn test_deep_merge_scalar_overwrites_mapping() {
        let base = nested("profile", "name", Value::from("Ada"));
        let patch = PersistentMap::singleton("profile".to_string(), Value::Null);
        assert_eq!(base.merge_deep([&patch]), patch);
    }

    #[rstest]
    fn test_deep_merge_without_changes_returns_identical_map() {
        let base = nested("profile", "name", Value::from("Ada"));
        let same = base.clone();
        assert!(base.merge_deep([&same]).ptr_eq(&base));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(Value::Null))]
    #[case(Some(Value::from(3)))]
    fn test_merge_value_starts_non_mappings_as_empty_map(#[case] target: Option<Value>) {
        let source = Value::Plain(PlainMap::from([("a".to_string(), Value::from(1))]));
        let merged = Merger::shallow().merge_value(target.as_ref(), [&source, &Value::from("ignored")]);

        assert!(merged.as_map().is_some());
        assert_eq!(merged, source);
    }
}
