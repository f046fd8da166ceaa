use crate::value::Value;

use super::typed::TypedMap;

/// The declared shape of a record: its name, its fields and their defaults.
///
/// A schema type is usually a plain struct deriving `Schema`: the struct's
/// fields become the record's fields, each field's type becomes its value
/// type, and an uppercase [`Field`](super::Field) constant is generated per
/// field.
///
/// # Examples
///
/// ```rust
/// use typed_map::{Schema, Value};
///
/// #[derive(Schema)]
/// struct Point {
///     x: i64,
///     #[field(default = 5)]
///     y: i64,
/// }
///
/// assert_eq!(Point::TYPE_NAME, "Point");
/// assert_eq!(Point::FIELDS, &["x", "y"]);
/// assert!(Point::has_field("y"));
/// assert_eq!(Point::defaults(), vec![("x", Value::from(0)), ("y", Value::from(5))]);
///
/// let record = Point { x: 1, y: 2 }.into_record();
/// assert_eq!(record.get(Point::X), Some(1));
/// ```
pub trait Schema: Sized + 'static {
    /// Name used in error messages and logs.
    const TYPE_NAME: &'static str;

    /// Every field the record may hold, in declaration order.
    const FIELDS: &'static [&'static str];

    /// Initial value of every field.
    fn defaults() -> Vec<(&'static str, Value)>;

    /// Converts a struct instance into its field values.
    fn into_fields(self) -> Vec<(&'static str, Value)>;

    /// Reads a struct instance back out of a record.
    ///
    /// Returns `None` when a field is missing or holds a value of another
    /// type.
    fn from_record(record: &TypedMap<Self>) -> Option<Self>;

    /// Returns `true` if `name` is a declared field.
    fn has_field(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }

    /// Builds a record holding this instance's field values.
    fn into_record(self) -> TypedMap<Self> {
        TypedMap::from_fields(self.into_fields())
    }
}
