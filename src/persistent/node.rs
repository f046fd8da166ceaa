//! Trie nodes backing [`PersistentMap`](super::PersistentMap).
//!
//! A node is either a `Leaf`, holding every entry that shares one full 64-bit
//! hash, or a `Branch`, routing by successive 5-bit slices of the hash through
//! a 32-slot bitmap.
//!
//! All writes go through [`ReferenceCounter::make_mut`]: a node that is shared
//! with any other map is cloned before it is touched, a node that is uniquely
//! owned (the common case inside a transient session) is edited in place.
//! This is the whole copy-on-write discipline of the map.

use std::borrow::Borrow;
use std::mem;

use smallvec::{SmallVec, smallvec};

use super::ReferenceCounter;

// =============================================================================
// Constants
// =============================================================================

/// Bits of the hash consumed per trie level.
pub(crate) const BITS_PER_LEVEL: u32 = 5;

/// Bit mask for extracting a slot index within a branch.
const MASK: u64 = (1 << BITS_PER_LEVEL) - 1;

/// Entries stored inline in a leaf before spilling to the heap.
///
/// A leaf holds more than one entry only on a full 64-bit hash collision.
type LeafEntries<K, V> = SmallVec<[(K, V); 1]>;

#[inline]
const fn fragment(hash: u64, shift: u32) -> u32 {
    ((hash >> shift) & MASK) as u32
}

#[inline]
const fn position(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

// =============================================================================
// Node Definition
// =============================================================================

#[derive(Clone)]
pub(crate) enum Node<K, V> {
    /// Terminal entries that all share `hash`.
    Leaf {
        hash: u64,
        entries: LeafEntries<K, V>,
    },
    /// Routing node; `children.len() == bitmap.count_ones()`.
    Branch {
        bitmap: u32,
        children: Vec<ReferenceCounter<Node<K, V>>>,
    },
}

impl<K, V> Node<K, V> {
    pub(crate) fn leaf(hash: u64, key: K, value: V) -> Self {
        Self::Leaf {
            hash,
            entries: smallvec![(key, value)],
        }
    }

    /// Placeholder used while a node is being rebuilt in place. Never published.
    const fn vacant() -> Self {
        Self::Branch {
            bitmap: 0,
            children: Vec::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::Leaf { entries, .. } => entries.is_empty(),
            Self::Branch { children, .. } => children.is_empty(),
        }
    }

    /// Looks up `key` by walking branches with successive slices of `hash`.
    pub(crate) fn get_entry<Q>(&self, hash: u64, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        let mut shift = 0;
        loop {
            match node {
                Self::Leaf {
                    hash: leaf_hash,
                    entries,
                } => {
                    if *leaf_hash != hash {
                        return None;
                    }
                    return entries
                        .iter()
                        .find(|(entry_key, _)| entry_key.borrow() == key)
                        .map(|(entry_key, value)| (entry_key, value));
                }
                Self::Branch { bitmap, children } => {
                    let bit = 1u32 << fragment(hash, shift);
                    if bitmap & bit == 0 {
                        return None;
                    }
                    node = &children[position(*bitmap, bit)];
                    shift += BITS_PER_LEVEL;
                }
            }
        }
    }

    /// Builds the smallest branch that separates two leaves with distinct hashes.
    fn split(
        existing: ReferenceCounter<Self>,
        existing_hash: u64,
        incoming: ReferenceCounter<Self>,
        incoming_hash: u64,
        shift: u32,
    ) -> Self {
        let existing_fragment = fragment(existing_hash, shift);
        let incoming_fragment = fragment(incoming_hash, shift);

        if existing_fragment == incoming_fragment {
            let child = Self::split(
                existing,
                existing_hash,
                incoming,
                incoming_hash,
                shift + BITS_PER_LEVEL,
            );
            return Self::Branch {
                bitmap: 1 << existing_fragment,
                children: vec![ReferenceCounter::new(child)],
            };
        }

        let bitmap = (1 << existing_fragment) | (1 << incoming_fragment);
        let children = if existing_fragment < incoming_fragment {
            vec![existing, incoming]
        } else {
            vec![incoming, existing]
        };
        Self::Branch { bitmap, children }
    }
}

// =============================================================================
// Copy-on-write edits
// =============================================================================

/// Inserts `key` under the node held in `slot`, returning the replaced value.
pub(crate) fn insert<K, V>(
    slot: &mut ReferenceCounter<Node<K, V>>,
    hash: u64,
    shift: u32,
    key: K,
    value: V,
) -> Option<V>
where
    K: Clone + Eq,
    V: Clone,
{
    let node = ReferenceCounter::make_mut(slot);
    match node {
        Node::Leaf {
            hash: leaf_hash,
            entries,
        } => {
            if *leaf_hash == hash {
                if let Some(entry) = entries.iter_mut().find(|(entry_key, _)| *entry_key == key) {
                    return Some(mem::replace(&mut entry.1, value));
                }
                entries.push((key, value));
                return None;
            }
            let leaf_hash = *leaf_hash;
            let existing = mem::replace(node, Node::vacant());
            *node = Node::split(
                ReferenceCounter::new(existing),
                leaf_hash,
                ReferenceCounter::new(Node::leaf(hash, key, value)),
                hash,
                shift,
            );
            None
        }
        Node::Branch { bitmap, children } => {
            let bit = 1u32 << fragment(hash, shift);
            let index = position(*bitmap, bit);
            if *bitmap & bit == 0 {
                children.insert(index, ReferenceCounter::new(Node::leaf(hash, key, value)));
                *bitmap |= bit;
                None
            } else {
                insert(&mut children[index], hash, shift + BITS_PER_LEVEL, key, value)
            }
        }
    }
}

/// Removes `key` under the node held in `slot`, returning the removed value.
///
/// Callers check presence first so that a miss never copies shared nodes.
/// After removal an emptied child is dropped from its branch, and a branch
/// left with a single leaf collapses into that leaf.
pub(crate) fn remove<K, V, Q>(
    slot: &mut ReferenceCounter<Node<K, V>>,
    hash: u64,
    shift: u32,
    key: &Q,
) -> Option<V>
where
    K: Clone + Borrow<Q>,
    V: Clone,
    Q: Eq + ?Sized,
{
    let node = ReferenceCounter::make_mut(slot);
    let (removed, collapse) = match node {
        Node::Leaf { entries, .. } => {
            let index = entries
                .iter()
                .position(|(entry_key, _)| entry_key.borrow() == key)?;
            return Some(entries.remove(index).1);
        }
        Node::Branch { bitmap, children } => {
            let bit = 1u32 << fragment(hash, shift);
            if *bitmap & bit == 0 {
                return None;
            }
            let index = position(*bitmap, bit);
            let removed = remove(&mut children[index], hash, shift + BITS_PER_LEVEL, key)?;

            if children[index].is_empty() {
                children.remove(index);
                *bitmap &= !bit;
            }

            let collapse = match children.as_slice() {
                [only] if matches!(**only, Node::Leaf { .. }) => Some(only.clone()),
                _ => None,
            };
            (removed, collapse)
        }
    };

    if let Some(leaf) = collapse {
        *slot = leaf;
    }
    Some(removed)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn count_leaves<K, V>(node: &Node<K, V>) -> usize {
        match node {
            Node::Leaf { entries, .. } => entries.len(),
            Node::Branch { children, .. } => children.iter().map(|child| count_leaves(child)).sum(),
        }
    }

    fn branch_invariant_holds<K, V>(node: &Node<K, V>) -> bool {
        match node {
            Node::Leaf { entries, .. } => !entries.is_empty(),
            Node::Branch { bitmap, children } => {
                bitmap.count_ones() as usize == children.len()
                    && !children.is_empty()
                    && children.iter().all(|child| branch_invariant_holds(child))
            }
        }
    }

    #[rstest]
    fn test_split_on_shared_prefix_nests_branches() {
        // Both hashes share the lowest fragment (0b00001) and differ in the next one.
        let low = 0b00010_00001u64;
        let high = 0b00011_00001u64;
        let mut root = ReferenceCounter::new(Node::leaf(low, "a", 1));
        insert(&mut root, high, 0, "b", 2);

        match &*root {
            Node::Branch { bitmap, children } => {
                assert_eq!(*bitmap, 1 << 1);
                assert_eq!(children.len(), 1);
                assert!(matches!(*children[0], Node::Branch { .. }));
            }
            Node::Leaf { .. } => panic!("expected a branch"),
        }
        assert_eq!(root.get_entry(low, "a"), Some((&"a", &1)));
        assert_eq!(root.get_entry(high, "b"), Some((&"b", &2)));
        assert!(branch_invariant_holds(&root));
    }

    #[rstest]
    fn test_full_hash_collision_shares_one_leaf() {
        let mut root = ReferenceCounter::new(Node::leaf(7, "a", 1));
        insert(&mut root, 7, 0, "b", 2);

        assert!(matches!(&*root, Node::Leaf { entries, .. } if entries.len() == 2));
        assert_eq!(remove(&mut root, 7, 0, "a"), Some(1));
        assert_eq!(root.get_entry(7, "b"), Some((&"b", &2)));
        assert_eq!(root.get_entry(7, "a"), None);
    }

    #[rstest]
    fn test_remove_collapses_single_leaf_branch() {
        let mut root = ReferenceCounter::new(Node::leaf(0b00001, "a", 1));
        insert(&mut root, 0b00010, 0, "b", 2);
        assert!(matches!(&*root, Node::Branch { .. }));

        assert_eq!(remove(&mut root, 0b00010, 0, "b"), Some(2));
        assert!(matches!(&*root, Node::Leaf { .. }));
        assert_eq!(count_leaves(&root), 1);
    }

    #[rstest]
    fn test_shared_node_is_copied_before_write() {
        let original = ReferenceCounter::new(Node::leaf(1, "a", 1));
        let mut copy = original.clone();
        insert(&mut copy, 1, 0, "a", 10);

        assert_eq!(original.get_entry(1, "a"), Some((&"a", &1)));
        assert_eq!(copy.get_entry(1, "a"), Some((&"a", &10)));
        assert!(!ReferenceCounter::ptr_eq(&original, &copy));
    }

    #[rstest]
    fn test_unique_node_is_edited_in_place() {
        let mut root = ReferenceCounter::new(Node::leaf(1, "a", 1));
        let before = ReferenceCounter::as_ptr(&root);
        insert(&mut root, 1, 0, "a", 2);
        assert_eq!(ReferenceCounter::as_ptr(&root), before);
    }
}
