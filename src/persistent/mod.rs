//! Persistent (immutable) hash map and its transient companion.
//!
//! - [`PersistentMap`]: persistent hash map (HAMT) with cached structural hash
//! - [`TransientMap`]: exclusively owned, batch-mutable view of a map
//!
//! # Structural Sharing
//!
//! Every write returns a new map that shares all untouched subtrees with the
//! original. Published nodes are never mutated: a node is only edited in
//! place when its reference count proves nothing else can observe it.
//!
//! # Examples
//!
//! ```rust
//! use typed_map::persistent::PersistentMap;
//!
//! let map = PersistentMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! // Batch edits through a transient session
//! let mut transient = map.transient();
//! for index in 3..=10 {
//!     transient.insert(index.to_string(), index);
//! }
//! let bigger = transient.persistent();
//!
//! assert_eq!(map.len(), 2);     // Original unchanged
//! assert_eq!(bigger.len(), 10); // New version
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled (the default), this is
/// `std::sync::Arc`, so published maps can be shared across threads.
///
/// When the `arc` feature is disabled, this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod map;
mod node;
mod transient;

pub(crate) use map::hash_entries;
pub use map::PersistentMap;
pub use map::PersistentMapIntoIterator;
pub use map::PersistentMapIterator;
pub use transient::TransientMap;

#[cfg(feature = "arc")]
static_assertions::assert_impl_all!(PersistentMap<String, i32>: Send, Sync);

// =============================================================================
// Tests
// =============================================================================
