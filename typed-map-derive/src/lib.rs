//! Derive macro for typed-map record schemas.
//!
//! # Available Derive Macros
//!
//! - [`Schema`]: Declares a record shape from a struct with named fields
//!
//! # Example
//!
//! ```rust,ignore
//! use typed_map::{Schema, TypedMap};
//!
//! #[derive(Schema)]
//! struct Drink {
//!     name: String,
//!     #[field(default = 10)]
//!     price: i64,
//! }
//!
//! // Generated constants:
//! // - Drink::NAME: Field<Drink, String>
//! // - Drink::PRICE: Field<Drink, i64>
//!
//! let drink = TypedMap::<Drink>::default().set(Drink::NAME, "Latte".to_string());
//! assert_eq!(drink.get(Drink::PRICE), Some(10));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod schema;

use proc_macro::TokenStream;

/// Derive macro implementing `typed_map::Schema` for a struct.
///
/// # Requirements
///
/// - The struct must have named fields
/// - Every field type must implement `typed_map::FieldValue`
/// - Fields without `#[field(default = ...)]` must implement `Default`
///
/// # Generated Code
///
/// For a field `price` of type `T`, generates:
///
/// ```rust,ignore
/// impl StructName {
///     pub const PRICE: ::typed_map::Field<Self, T> = ::typed_map::Field::new("price");
/// }
/// ```
///
/// plus the `Schema` implementation listing every field with its default,
/// and the conversions between struct instances and records.
///
/// # Field Attributes
///
/// - `#[field(default = expr)]`: initial value used by `TypedMap::default`
///   and `TypedMap::create`; `expr` must have the field's type
#[proc_macro_derive(Schema, attributes(field))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    schema::derive_schema_impl(input)
}
