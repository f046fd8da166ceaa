//! Schema-typed records on top of [`PersistentMap`](crate::persistent::PersistentMap).
//!
//! - [`Schema`]: the declared field set of a record shape, usually derived
//! - [`Field`]: a typed handle naming one field of a schema
//! - [`TypedMap`]: the persistent record itself
//! - [`KeyPath`]: a validated path of one to [`MAX_PATH_DEPTH`] keys
//! - [`RecordSession`] / [`MutableRecord`]: batched `set`-only mutation
//!
//! # Examples
//!
//! ```rust
//! use typed_map::{Schema, TypedMap};
//!
//! #[derive(Schema)]
//! struct Drink {
//!     name: String,
//!     #[field(default = 10)]
//!     price: i64,
//! }
//!
//! let latte = TypedMap::<Drink>::default().set(Drink::NAME, "Latte".to_string());
//! let mocha = latte.set(Drink::NAME, "Mocha".to_string());
//!
//! assert_eq!(latte.get(Drink::NAME).as_deref(), Some("Latte"));
//! assert_eq!(mocha.get(Drink::NAME).as_deref(), Some("Mocha"));
//! assert_eq!(mocha.get(Drink::PRICE), Some(10));
//! assert_ne!(latte, mocha);
//! ```

mod field;
mod key_path;
mod schema;
mod session;
mod typed;

pub use field::{Field, FieldValue};
pub use key_path::KeyPath;
pub use schema::Schema;
pub use session::{MutableRecord, RecordSession};
pub use typed::TypedMap;

/// Deepest path accepted by the typed path API.
///
/// Deeper locations are reachable through the untyped functions in
/// [`crate::path`], which accept paths of any length.
pub const MAX_PATH_DEPTH: usize = 4;
