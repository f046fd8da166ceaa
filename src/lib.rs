//! # typed-map
//!
//! Persistent, schema-typed records for Rust.
//!
//! ## Overview
//!
//! A record is an immutable keyed map whose field set is fixed by a schema.
//! Every update returns a new record that shares all untouched structure with
//! the original, so old versions stay valid and cheap to keep around.
//!
//! - **Persistent map**: a hash array mapped trie with copy-on-write updates,
//!   a cached order-independent hash and a transient mode for batch edits
//! - **Values**: [`Value`] holds scalars, lists and nested mappings, either
//!   persistent or plain
//! - **Paths**: multi-level `get_in`/`set_in`/`update_in`/`delete_in`/
//!   `merge_in` across nested mappings
//! - **Records**: [`TypedMap`] over a [`Schema`], with typed [`Field`]
//!   handles and batched [`RecordSession`]s
//!
//! ## Feature Flags
//!
//! - `arc` (default): thread-safe reference counting; published maps and
//!   records are `Send + Sync`
//! - `derive` (default): `#[derive(Schema)]`
//! - `serde`: `Serialize`/`Deserialize` for maps, values and records
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust
//! use typed_map::prelude::*;
//!
//! #[derive(Schema)]
//! struct Customer {
//!     name: String,
//!     profile: PersistentMap<String, Value>,
//! }
//!
//! let customer = TypedMap::<Customer>::default().set(Customer::NAME, "Ada".to_string());
//! let city = KeyPath::new(["profile", "address", "city"])?;
//!
//! let moved = customer.set_in(&city, "LA")?;
//! assert_eq!(moved.get_in_as::<String>(&city).as_deref(), Some("LA"));
//! assert!(!customer.has_in(&city));
//! # Ok::<(), RecordError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

extern crate self as typed_map;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use typed_map::prelude::*;
/// ```
pub mod prelude {
    pub use crate::container::Container;
    pub use crate::error::RecordError;
    pub use crate::persistent::{PersistentMap, TransientMap};
    pub use crate::record::{Field, FieldValue, KeyPath, MutableRecord, RecordSession, Schema, TypedMap};
    pub use crate::value::{PlainMap, Value};

    #[cfg(feature = "derive")]
    pub use typed_map_derive::Schema;
}

pub mod container;
pub mod error;
pub mod merge;
pub mod path;
pub mod persistent;
pub mod record;
pub mod value;

pub use container::Container;
pub use error::RecordError;
pub use record::{Field, FieldValue, KeyPath, MAX_PATH_DEPTH, MutableRecord, RecordSession, Schema, TypedMap};
pub use value::{PlainMap, Value};

/// Derives [`Schema`] for a struct with named fields.
///
/// Each field becomes a record field; its type must implement
/// [`FieldValue`]. The derive generates:
///
/// - `TYPE_NAME`, `FIELDS` and `defaults()`
/// - one `Field` constant per field, named after it in upper case
/// - `into_fields` / `from_record` for converting struct instances
///
/// A field's default is `Default::default()` unless given with
/// `#[field(default = expr)]`.
#[cfg(feature = "derive")]
pub use typed_map_derive::Schema;
