//! Transient (temporarily mutable) view of a [`PersistentMap`].
//!
//! A sequence of `k` persistent inserts copies `k` root-to-leaf paths. A
//! transient copies each node at most once: the first edit that reaches a
//! shared node clones it, and every later edit through that node mutates the
//! private copy in place. [`TransientMap::persistent`] then freezes the result
//! into a new immutable map.

use std::borrow::Borrow;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

use super::ReferenceCounter;
use super::map::{PersistentMap, compute_hash};
use super::node::{self, Node};

/// A transient (temporarily mutable) hash map for efficient batch updates.
///
/// After batch updates, convert to [`PersistentMap`] using
/// [`persistent()`](Self::persistent).
///
/// # Design
///
/// - Starts from the root of the map it was created from; nodes are copied
///   lazily, only when an edit reaches them while still shared
/// - `PhantomData<Rc<()>>` ensures `!Send` and `!Sync`
/// - Clone/Copy traits are intentionally not implemented (linear type semantics)
///
/// # Examples
///
/// ```rust
/// use typed_map::persistent::PersistentMap;
///
/// let persistent: PersistentMap<String, i32> =
///     [("a".to_string(), 1), ("b".to_string(), 2)].into_iter().collect();
///
/// let mut transient = persistent.transient();
/// transient.insert("c".to_string(), 3);
/// transient.remove("a");
///
/// let updated = transient.persistent();
/// assert_eq!(updated.len(), 2);
/// assert_eq!(persistent.len(), 2);
/// assert_eq!(persistent.get("a"), Some(&1));
/// ```
pub struct TransientMap<K, V> {
    base: PersistentMap<K, V>,
    root: Option<ReferenceCounter<Node<K, V>>>,
    length: usize,
    altered: bool,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientMap<String, i32>: Send, Sync, Clone);

impl<K, V> TransientMap<K, V> {
    /// Creates a new empty `TransientMap`.
    #[must_use]
    pub fn new() -> Self {
        Self::from_persistent(PersistentMap::new())
    }

    pub(crate) fn from_persistent(base: PersistentMap<K, V>) -> Self {
        Self {
            root: base.root().cloned(),
            length: base.len(),
            base,
            altered: false,
            _marker: PhantomData,
        }
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

    /// Reports whether any edit changed the map since the session began.
    #[inline]
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.altered
    }

    /// Converts this transient map into a persistent map.
    ///
    /// When nothing was altered this returns the map the session started
    /// from, root and cached hash included.
    ///
    /// # Complexity
    ///
    /// O(1) - only moves fields
    #[must_use]
    pub fn persistent(self) -> PersistentMap<K, V> {
        if self.altered {
            PersistentMap::from_parts(self.root, self.length)
        } else {
            self.base
        }
    }
}

impl<K: Hash + Eq, V> TransientMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.root
            .as_ref()?
            .get_entry(compute_hash(key), key)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> TransientMap<K, V> {
    /// Inserts a key-value pair, returning the previous value.
    ///
    /// Inserting a value equal to the stored one does not touch the trie and
    /// does not mark the session as altered.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use typed_map::persistent::TransientMap;
    ///
    /// let mut transient = TransientMap::new();
    /// assert_eq!(transient.insert("a".to_string(), 1), None);
    /// assert_eq!(transient.insert("a".to_string(), 2), Some(1));
    /// assert_eq!(transient.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = compute_hash(&key);
        if self.root.is_none() {
            self.root = Some(ReferenceCounter::new(Node::leaf(hash, key, value)));
            self.length = 1;
            self.altered = true;
            return None;
        }
        let root = self.root.as_mut()?;

        if let Some((_, existing)) = root.get_entry(hash, &key)
            && *existing == value
        {
            return Some(value);
        }

        let previous = node::insert(root, hash, 0, key, value);
        if previous.is_none() {
            self.length += 1;
        }
        self.altered = true;
        previous
    }

    /// Removes a key, returning its value if it was present.
    ///
    /// Removing an absent key leaves the session untouched.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = compute_hash(key);
        let root = self.root.as_mut()?;
        if root.get_entry(hash, key).is_none() {
            return None;
        }

        let removed = node::remove(root, hash, 0, key);
        if root.is_empty() {
            self.root = None;
        }
        self.length -= 1;
        self.altered = true;
        removed
    }

    /// Extends the map with key-value pairs from an iterator.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> Default for TransientMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_unaltered_session_returns_original() {
        let map: PersistentMap<String, i32> = (0..10).map(|n| (n.to_string(), n)).collect();
        let mut transient = map.transient();
        transient.insert("3".to_string(), 3);
        transient.remove("absent");

        assert!(!transient.was_altered());
        assert!(transient.persistent().ptr_eq(&map));
    }

    #[rstest]
    fn test_edits_do_not_leak_into_source() {
        let map: PersistentMap<String, i32> = (0..100).map(|n| (n.to_string(), n)).collect();
        let mut transient = map.transient();
        for n in 0..100 {
            transient.insert(n.to_string(), n * 2);
        }
        transient.remove("0");
        let updated = transient.persistent();

        assert_eq!(map.get("50"), Some(&50));
        assert_eq!(map.len(), 100);
        assert_eq!(updated.get("50"), Some(&100));
        assert_eq!(updated.len(), 99);
    }

    #[rstest]
    fn test_second_edit_reuses_owned_root() {
        let map: PersistentMap<String, i32> = (0..100).map(|n| (n.to_string(), n)).collect();
        let mut transient = map.transient();
        transient.insert("1".to_string(), -1);
        let owned_root = transient.root.as_ref().map(ReferenceCounter::as_ptr);

        transient.insert("2".to_string(), -2);
        assert_eq!(transient.root.as_ref().map(ReferenceCounter::as_ptr), owned_root);
    }

    #[rstest]
    fn test_remove_last_entry_empties_root() {
        let mut transient = TransientMap::new();
        transient.insert(1, "one");
        assert_eq!(transient.remove(&1), Some("one"));
        assert!(transient.is_empty());
        assert!(transient.persistent().is_empty());
    }
}
