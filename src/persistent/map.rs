//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentMap`], an immutable hash map that uses
//! structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentMap` is a Hash Array Mapped Trie: 32-way branching nodes route
//! lookups by successive 5-bit slices of a key's hash until a leaf is found.
//!
//! - O(log32 N) get (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//! - O(N) `hash_code` on first call, O(1) afterwards (cached per instance)
//!
//! All operations return new maps without modifying the original. Only the
//! nodes on the path to the edited key are copied; every sibling subtree is
//! shared with the original.
//!
//! # Examples
//!
//! ```rust
//! use typed_map::persistent::PersistentMap;
//!
//! let map = PersistentMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//!
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//!
//! // Writing the value that is already stored is a no-op.
//! let same = map.insert("two".to_string(), 2);
//! assert!(same.ptr_eq(&map));
//! ```

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::sync::OnceLock;

use smallvec::SmallVec;

use super::ReferenceCounter;
use super::node::{self, Node};
use super::transient::TransientMap;

// =============================================================================
// Hash computation
// =============================================================================

/// Computes the hash of a key using `DefaultHasher`.
pub(crate) fn compute_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Finalizer from `SplitMix64`; spreads per-entry hashes before summing.
const fn mix(mut hash: u64) -> u64 {
    hash ^= hash >> 30;
    hash = hash.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    hash ^= hash >> 27;
    hash = hash.wrapping_mul(0x94d0_49bb_1331_11eb);
    hash ^ (hash >> 31)
}

/// Order-independent hash over a set of entries.
///
/// Shared by every mapping representation so that structurally equal
/// mappings hash identically.
pub(crate) fn hash_entries<'a, K, V, I>(entries: I) -> u64
where
    K: Hash + 'a,
    V: Hash + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let (sum, count) = entries
        .into_iter()
        .fold((0u64, 0u64), |(sum, count), (key, value)| {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            value.hash(&mut hasher);
            (sum.wrapping_add(mix(hasher.finish())), count + 1)
        });
    mix(sum ^ count)
}

// =============================================================================
// PersistentMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `hash_code`    | O(N), then O(1)   |
///
/// # Examples
///
/// ```rust
/// use typed_map::persistent::PersistentMap;
///
/// let map = PersistentMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct PersistentMap<K, V> {
    /// Root node of the trie; `None` for the empty map.
    root: Option<ReferenceCounter<Node<K, V>>>,
    /// Number of entries
    length: usize,
    /// Lazily computed `hash_code`; valid for the lifetime of this instance.
    cached_hash: OnceLock<u64>,
}

impl<K, V> PersistentMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map: PersistentMap<String, i32> = PersistentMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
            cached_hash: OnceLock::new(),
        }
    }

    pub(crate) const fn from_parts(root: Option<ReferenceCounter<Node<K, V>>>, length: usize) -> Self {
        Self {
            root,
            length,
            cached_hash: OnceLock::new(),
        }
    }

    pub(crate) fn root(&self) -> Option<&ReferenceCounter<Node<K, V>>> {
        self.root.as_ref()
    }

    /// Returns the number of entries in the map.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` if both maps share the same root node.
    ///
    /// This is reference identity, not structural equality: it is how callers
    /// observe that a write was a no-op.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::singleton("a".to_string(), 1);
    /// assert!(map.remove("missing").ptr_eq(&map));
    /// assert!(!map.insert("b".to_string(), 2).ptr_eq(&map));
    /// ```
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (None, None) => true,
            (Some(left), Some(right)) => ReferenceCounter::ptr_eq(left, right),
            _ => false,
        }
    }

    /// Returns an iterator over key-value pairs.
    ///
    /// The order is the trie's depth-first order: stable for a given instance,
    /// unrelated to insertion order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    ///
    /// let total: i32 = map.iter().map(|(_, value)| value).sum();
    /// assert_eq!(total, 3);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentMapIterator<'_, K, V> {
        PersistentMapIterator::new(self.root.as_deref(), self.length)
    }

    /// Returns an iterator over keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Begins a transient session over this map.
    ///
    /// The session shares every node with `self` until an edit touches it.
    /// See [`TransientMap`].
    #[must_use]
    pub fn transient(&self) -> TransientMap<K, V> {
        TransientMap::from_persistent(self.clone())
    }
}

impl<K: Hash + Eq, V> PersistentMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash` and
    /// `Eq` on the borrowed form must match those for the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().insert("hello".to_string(), 42);
    ///
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and value for `key`.
    #[must_use]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root.as_ref()?.get_entry(compute_hash(key), key)
    }

    /// Returns the value for `key`, or `not_set` when the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::singleton("a".to_string(), 1);
    /// assert_eq!(*map.get_or("missing", &0), 0);
    /// ```
    #[must_use]
    pub fn get_or<'a, Q>(&'a self, key: &Q, not_set: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).unwrap_or(not_set)
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> PersistentMap<K, V> {
    /// Creates a map containing a single key-value pair.
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already holds an equal value for `key`, the original map is
    /// returned (sharing its root, see [`ptr_eq`](Self::ptr_eq)).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map1 = PersistentMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let hash = compute_hash(&key);
        let Some(mut root) = self.root.clone() else {
            return Self::from_parts(Some(ReferenceCounter::new(Node::leaf(hash, key, value))), 1);
        };

        if root
            .get_entry(hash, &key)
            .is_some_and(|(_, existing)| *existing == value)
        {
            return self.clone();
        }

        let added = node::insert(&mut root, hash, 0, key, value).is_none();
        Self::from_parts(Some(root), self.length + usize::from(added))
    }

    /// Removes a key from the map.
    ///
    /// If the key is absent the original map is returned unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let removed = map.remove("a");
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get("a"), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = compute_hash(key);
        let Some(current) = &self.root else {
            return self.clone();
        };
        if current.get_entry(hash, key).is_none() {
            return self.clone();
        }

        let mut root = current.clone();
        node::remove(&mut root, hash, 0, key);
        let root = (!root.is_empty()).then_some(root);
        Self::from_parts(root, self.length - 1)
    }

    /// Applies `function` to the value stored for `key`.
    ///
    /// Returns the original map when the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().insert("count".to_string(), 10);
    /// let updated = map.update("count", |value| value + 1);
    ///
    /// assert_eq!(updated.get("count"), Some(&11));
    /// assert!(map.update("missing", |value| value + 1).ptr_eq(&map));
    /// ```
    #[must_use]
    pub fn update<Q, F>(&self, key: &Q, function: F) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> V,
    {
        match self.get_key_value(key) {
            Some((stored_key, value)) => self.insert(stored_key.clone(), function(value)),
            None => self.clone(),
        }
    }

    /// Inserts, updates or removes the value for `key` using `updater`.
    ///
    /// The updater receives `Some(&V)` if the key exists. Returning `None`
    /// removes the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map = PersistentMap::new().insert("count".to_string(), 10);
    ///
    /// let inserted = map.update_with("new".to_string(), |current| Some(current.copied().unwrap_or(100)));
    /// assert_eq!(inserted.get("new"), Some(&100));
    ///
    /// let removed = map.update_with("count".to_string(), |_| None);
    /// assert_eq!(removed.get("count"), None);
    /// ```
    #[must_use]
    pub fn update_with<F>(&self, key: K, updater: F) -> Self
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        match updater(self.get(&key)) {
            Some(value) => self.insert(key, value),
            None => self.remove(&key),
        }
    }

    /// Merges `sources` into this map, left to right.
    ///
    /// On a key conflict the later source wins. Merging entries that are all
    /// already present with equal values returns the original map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map1 = PersistentMap::new()
    ///     .insert("a".to_string(), 1)
    ///     .insert("b".to_string(), 2);
    /// let map2 = PersistentMap::new()
    ///     .insert("b".to_string(), 20)
    ///     .insert("c".to_string(), 3);
    ///
    /// let merged = map1.merge([&map2]);
    ///
    /// assert_eq!(merged.get("a"), Some(&1));
    /// assert_eq!(merged.get("b"), Some(&20)); // From map2
    /// assert_eq!(merged.get("c"), Some(&3));
    /// ```
    #[must_use]
    pub fn merge<'a, I>(&self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
        K: 'a,
        V: 'a,
    {
        let mut transient = self.transient();
        for source in sources {
            for (key, value) in source {
                transient.insert(key.clone(), value.clone());
            }
        }
        transient.persistent()
    }

    /// Merges `sources` into this map, resolving conflicts with `combiner`.
    ///
    /// `combiner(old, new, key)` is called when a key from a source is already
    /// present in the accumulated result.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let base: PersistentMap<String, i32> =
    ///     [("a".to_string(), 1), ("b".to_string(), 2)].into_iter().collect();
    /// let other: PersistentMap<String, i32> =
    ///     [("b".to_string(), 10), ("c".to_string(), 3)].into_iter().collect();
    ///
    /// let merged = base.merge_with(|old, new, _key| old + new, [&other]);
    /// assert_eq!(merged.get("b"), Some(&12));
    /// ```
    #[must_use]
    pub fn merge_with<'a, F, I>(&self, mut combiner: F, sources: I) -> Self
    where
        F: FnMut(&V, &V, &K) -> V,
        I: IntoIterator<Item = &'a Self>,
        K: 'a,
        V: 'a,
    {
        let mut transient = self.transient();
        for source in sources {
            for (key, incoming) in source {
                let merged = match transient.get(key) {
                    Some(existing) => combiner(existing, incoming, key),
                    None => incoming.clone(),
                };
                transient.insert(key.clone(), merged);
            }
        }
        transient.persistent()
    }

    /// Returns a map containing only the entries accepted by `predicate`.
    ///
    /// Returns the original map when every entry is kept.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::PersistentMap;
    ///
    /// let map: PersistentMap<String, i32> = (1..=4).map(|n| (n.to_string(), n)).collect();
    /// let even = map.filter(|_, value| value % 2 == 0);
    /// assert_eq!(even.len(), 2);
    /// ```
    #[must_use]
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&K, &V) -> bool,
    {
        let rejected: SmallVec<[&K; 8]> = self
            .iter()
            .filter(|(key, value)| !predicate(key, value))
            .map(|(key, _)| key)
            .collect();

        let mut transient = self.transient();
        for key in rejected {
            transient.remove(key);
        }
        transient.persistent()
    }
}

impl<K: Hash, V: Hash> PersistentMap<K, V> {
    /// Returns an order-independent hash over all entries.
    ///
    /// Computed once per instance and cached; `a == b` implies
    /// `a.hash_code() == b.hash_code()`.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        *self.cached_hash.get_or_init(|| hash_entries(self.iter()))
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentMap`].
///
/// Walks the trie lazily with an explicit stack of branch cursors.
pub struct PersistentMapIterator<'a, K, V> {
    stack: SmallVec<[std::slice::Iter<'a, ReferenceCounter<Node<K, V>>>; 8]>,
    entries: std::slice::Iter<'a, (K, V)>,
    remaining: usize,
}

impl<'a, K, V> PersistentMapIterator<'a, K, V> {
    fn new(root: Option<&'a Node<K, V>>, remaining: usize) -> Self {
        let mut iterator = Self {
            stack: SmallVec::new(),
            entries: <&[(K, V)]>::default().iter(),
            remaining,
        };
        if let Some(node) = root {
            iterator.descend(node);
        }
        iterator
    }

    fn descend(&mut self, node: &'a Node<K, V>) {
        match node {
            Node::Leaf { entries, .. } => self.entries = entries.iter(),
            Node::Branch { children, .. } => self.stack.push(children.iter()),
        }
    }
}

impl<'a, K, V> Iterator for PersistentMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((key, value)) = self.entries.next() {
                self.remaining -= 1;
                return Some((key, value));
            }
            let cursor = self.stack.last_mut()?;
            match cursor.next() {
                Some(child) => self.descend(child),
                None => {
                    self.stack.pop();
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentMapIterator<'_, K, V> {}

impl<K, V> Clone for PersistentMapIterator<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            entries: self.entries.clone(),
            remaining: self.remaining,
        }
    }
}

/// An owning iterator over key-value pairs of a [`PersistentMap`].
pub struct PersistentMapIntoIterator<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentMapIntoIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            cached_hash: self.cached_hash.clone(),
        }
    }
}

impl<K, V> Default for PersistentMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = TransientMap::new();
        transient.extend(iter);
        transient.persistent()
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        PersistentMapIntoIterator {
            entries: entries.into_iter(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }
        if let (Some(left), Some(right)) = (self.cached_hash.get(), other.cached_hash.get())
            && left != right
        {
            return false;
        }

        self.iter()
            .all(|(key, value)| other.get(key).is_some_and(|other_value| other_value == value))
    }
}

impl<K: Hash + Eq, V: Eq> Eq for PersistentMap<K, V> {}

impl<K: Hash, V: Hash> Hash for PersistentMap<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for PersistentMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<K, V> PersistentMapVisitor<K, V> {
    const fn new() -> Self {
        Self {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone + PartialEq,
{
    type Value = PersistentMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut transient = TransientMap::new();
        while let Some((key, value)) = access.next_entry()? {
            transient.insert(key, value);
        }
        Ok(transient.persistent())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone + PartialEq,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentMapVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn numbered(count: i32) -> PersistentMap<String, i32> {
        (0..count).map(|index| (format!("key{index}"), index)).collect()
    }

    #[rstest]
    fn test_new_creates_empty() {
        let map: PersistentMap<String, i32> = PersistentMap::new();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
        assert_eq!(map.iter().count(), 0);
    }

    #[rstest]
    fn test_insert_and_get() {
        let map = PersistentMap::new()
            .insert("one".to_string(), 1)
            .insert("two".to_string(), 2);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("one"), Some(&1));
        assert_eq!(map.get("two"), Some(&2));
        assert_eq!(map.get("three"), None);
    }

    #[rstest]
    fn test_insert_same_value_returns_identical_map() {
        let map = numbered(100);
        let same = map.insert("key42".to_string(), 42);
        assert!(same.ptr_eq(&map));
    }

    #[rstest]
    fn test_insert_shares_untouched_subtrees() {
        let map = numbered(1000);
        let updated = map.insert("key7".to_string(), -7);

        let (Some(Node::Branch { children: old, .. }), Some(Node::Branch { children: new, .. })) =
            (map.root().map(|root| &**root), updated.root().map(|root| &**root))
        else {
            panic!("a map with 1000 entries has a branch root");
        };
        let shared = old
            .iter()
            .zip(new.iter())
            .filter(|(left, right)| ReferenceCounter::ptr_eq(left, right))
            .count();
        assert_eq!(shared, old.len() - 1);
    }

    #[rstest]
    fn test_remove_missing_returns_identical_map() {
        let map = numbered(10);
        assert!(map.remove("absent").ptr_eq(&map));
    }

    #[rstest]
    fn test_remove_everything_yields_empty_root() {
        let map = numbered(64);
        let emptied = map.keys().fold(map.clone(), |accumulator, key| accumulator.remove(key));
        assert!(emptied.is_empty());
        assert!(emptied.root().is_none());
        assert_eq!(map.len(), 64);
    }

    #[rstest]
    fn test_iter_is_exact_and_restartable() {
        let map = numbered(300);
        let iterator = map.iter();
        assert_eq!(iterator.len(), 300);

        let first: Vec<_> = map.iter().collect();
        let second: Vec<_> = map.iter().collect();
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_eq_ignores_insertion_order() {
        let forward = numbered(50);
        let backward: PersistentMap<String, i32> =
            (0..50).rev().map(|index| (format!("key{index}"), index)).collect();

        assert_eq!(forward, backward);
        assert_eq!(forward.hash_code(), backward.hash_code());
    }

    #[rstest]
    fn test_hash_code_differs_for_different_values() {
        let left = PersistentMap::singleton("a".to_string(), 1);
        let right = PersistentMap::singleton("a".to_string(), 2);
        assert_ne!(left.hash_code(), right.hash_code());
        assert_ne!(left, right);
    }

    #[rstest]
    fn test_merge_with_combines_conflicts() {
        let base: PersistentMap<String, i32> =
            [("a".to_string(), 1), ("b".to_string(), 2)].into_iter().collect();
        let other: PersistentMap<String, i32> =
            [("b".to_string(), 10), ("c".to_string(), 3)].into_iter().collect();

        let merged = base.merge_with(|old, new, _| old + new, [&other]);
        let expected: PersistentMap<String, i32> = [
            ("a".to_string(), 1),
            ("b".to_string(), 12),
            ("c".to_string(), 3),
        ]
        .into_iter()
        .collect();
        assert_eq!(merged, expected);
    }

    #[rstest]
    fn test_merge_later_source_wins() {
        let base = PersistentMap::singleton("a".to_string(), 1);
        let first = PersistentMap::singleton("a".to_string(), 2);
        let second = PersistentMap::singleton("a".to_string(), 3);
        assert_eq!(base.merge([&first, &second]).get("a"), Some(&3));
    }

    #[rstest]
    fn test_filter_keeping_all_returns_identical_map() {
        let map = numbered(20);
        assert!(map.filter(|_, _| true).ptr_eq(&map));
        assert_eq!(map.filter(|_, value| *value < 5).len(), 5);
    }

    #[rstest]
    fn test_display() {
        let map = PersistentMap::singleton(1, "one".to_string());
        assert_eq!(format!("{map}"), "{1: one}");
    }
}
